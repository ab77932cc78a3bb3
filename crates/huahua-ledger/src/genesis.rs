// GENESIS BUILDER
// Seeds an in-memory chain with balances, validators, delegations and signing infos.
// Every seeded token is also added to total supply, so a built chain always
// satisfies the supply invariant.

use crate::address::{AccAddress, ValAddress};
use crate::coin::BOND_DENOM;
use crate::slashing::ValidatorSigningInfo;
use crate::staking::{BondStatus, Delegation, Validator};
use crate::store::{ChainState, MemoryChain, BONDED_POOL, DISTRIBUTION_MODULE, NOT_BONDED_POOL};
use log::warn;

#[derive(Debug, Default)]
pub struct GenesisBuilder {
    state: ChainState,
}

impl GenesisBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self, address: &AccAddress, denom: &str, amount: u128) {
        let balance = self
            .state
            .balances
            .entry(address.clone())
            .or_default()
            .entry(denom.to_string())
            .or_insert(0);
        *balance = balance.saturating_add(amount);
        let supply = self.state.supply.entry(denom.to_string()).or_insert(0);
        *supply = supply.saturating_add(amount);
    }

    pub fn with_balance(mut self, address: &AccAddress, denom: &str, amount: u128) -> Self {
        self.issue(address, denom, amount);
        self
    }

    pub fn with_module_balance(mut self, module: &str, denom: &str, amount: u128) -> Self {
        self.issue(&AccAddress::module(module), denom, amount);
        self
    }

    /// Register a validator; its `tokens` are placed in the matching staking pool.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        let pool = match validator.status {
            BondStatus::Bonded => BONDED_POOL,
            BondStatus::Unbonded | BondStatus::Unbonding => NOT_BONDED_POOL,
        };
        self.issue(&AccAddress::module(pool), BOND_DENOM, validator.tokens);
        self.state.validators.insert(validator.operator.clone(), validator);
        self
    }

    pub fn with_signing_info(mut self, info: ValidatorSigningInfo) -> Self {
        self.state.signing_infos.insert(info.address.clone(), info);
        self
    }

    /// Add `tokens` of existing stake from `delegator` to an already registered validator,
    /// with `pending_rewards` waiting in the distribution module.
    pub fn with_delegation(
        mut self,
        delegator: &AccAddress,
        operator: &ValAddress,
        tokens: u128,
        pending_rewards: u128,
    ) -> Self {
        let Some(validator) = self.state.validators.get_mut(operator) else {
            warn!("Genesis delegation to unknown validator {} skipped", operator);
            return self;
        };
        let shares = match validator.shares_from_tokens(tokens) {
            Ok(shares) => shares,
            Err(e) => {
                warn!("Genesis delegation to {} skipped: {}", operator, e);
                return self;
            }
        };
        validator.tokens = validator.tokens.saturating_add(tokens);
        validator.delegator_shares = validator.delegator_shares.saturating_add(shares);
        let pool = match validator.status {
            BondStatus::Bonded => BONDED_POOL,
            BondStatus::Unbonded | BondStatus::Unbonding => NOT_BONDED_POOL,
        };

        self.issue(&AccAddress::module(pool), BOND_DENOM, tokens);
        self.issue(&AccAddress::module(DISTRIBUTION_MODULE), BOND_DENOM, pending_rewards);

        let delegation = self
            .state
            .delegations
            .entry((delegator.clone(), operator.clone()))
            .or_insert_with(|| Delegation {
                delegator: delegator.clone(),
                validator: operator.clone(),
                shares: 0,
                pending_rewards: 0,
            });
        delegation.shares = delegation.shares.saturating_add(shares);
        delegation.pending_rewards = delegation.pending_rewards.saturating_add(pending_rewards);
        self
    }

    pub fn build(self) -> MemoryChain {
        MemoryChain::new(self.state)
    }
}
