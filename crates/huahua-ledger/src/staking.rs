// STAKING LEDGER
// Validators, delegations and the share exchange rate.
//
// SAFETY INVARIANTS:
// 1. A delegation moves exactly `amount` from the delegator into the validator's pool
// 2. Validator tokens and shares grow together at the current exchange rate
// 3. Shares carry SHARE_PRECISION decimals so a delegation reads back as the amount delegated
// 4. Pending rewards are settled before new stake is added, or the call is rejected
// 5. A rejected delegation leaves balances, validator and delegation untouched

use crate::address::{AccAddress, ConsAddress, ValAddress};
use crate::bank::BankError;
use crate::coin::{Coin, Coins, BOND_DENOM};
use crate::store::{LedgerEvent, SharedState, BONDED_POOL, DISTRIBUTION_MODULE, NOT_BONDED_POOL};
use log::debug;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decimal places carried by delegator shares (SDK `Dec` precision).
/// A fresh validator issues `amount * SHARE_PRECISION` shares per token.
pub const SHARE_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Validator bonding state (SDK numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondStatus {
    Unbonded = 1,
    Unbonding = 2,
    Bonded = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Operator address (`chihuahuavaloper1…`)
    pub operator: ValAddress,

    /// Consensus address derived from the validator's consensus key
    pub consensus: ConsAddress,

    pub status: BondStatus,

    /// Jailed validators keep their stake but are excluded from the active set
    pub jailed: bool,

    /// Tokens backing all delegations, in `BOND_DENOM`
    pub tokens: u128,

    /// Total shares issued to delegators
    pub delegator_shares: u128,
}

impl Validator {
    pub fn new(operator: ValAddress, consensus: ConsAddress, status: BondStatus) -> Self {
        Validator {
            operator,
            consensus,
            status,
            jailed: false,
            tokens: 0,
            delegator_shares: 0,
        }
    }

    /// Shares issued for `amount` new tokens at the current exchange rate.
    pub fn shares_from_tokens(&self, amount: u128) -> Result<u128, StakingError> {
        let overflow = || StakingError::SharesOverflow(self.operator.to_string());
        if self.tokens == 0 {
            if self.delegator_shares > 0 {
                return Err(StakingError::InvalidExchangeRate(self.operator.to_string()));
            }
            return amount.checked_mul(SHARE_PRECISION).ok_or_else(overflow);
        }
        mul_div(amount, self.delegator_shares, self.tokens, Rounding::Down).ok_or_else(overflow)
    }

    /// Tokens currently backing `shares`, rounded to the nearest base unit.
    pub fn tokens_from_shares(&self, shares: u128) -> Option<u128> {
        if self.delegator_shares == 0 {
            return Some(0);
        }
        mul_div(shares, self.tokens, self.delegator_shares, Rounding::Nearest)
    }

    fn pool(&self) -> &'static str {
        match self.status {
            BondStatus::Bonded => BONDED_POOL,
            BondStatus::Unbonded | BondStatus::Unbonding => NOT_BONDED_POOL,
        }
    }
}

#[derive(Clone, Copy)]
enum Rounding {
    Down,
    Nearest,
}

/// `a * b / c` in 256-bit space; `None` when the quotient does not fit in `u128`.
fn mul_div(a: u128, b: u128, c: u128, rounding: Rounding) -> Option<u128> {
    let divisor = U256::from(c);
    let mut product = U256::from(a).checked_mul(U256::from(b))?;
    if let Rounding::Nearest = rounding {
        product = product.checked_add(divisor / 2)?;
    }
    let quotient = product.checked_div(divisor)?;
    if quotient > U256::from(u128::MAX) {
        return None;
    }
    Some(quotient.low_u128())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: AccAddress,
    pub validator: ValAddress,
    pub shares: u128,

    /// Rewards accrued but not yet withdrawn, paid from the distribution module
    pub pending_rewards: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    #[error("validator {0} not found")]
    ValidatorNotFound(String),

    #[error("delegation token source must be unbonded, got {0:?}")]
    InvalidTokenSource(BondStatus),

    #[error("validator {0} has no tokens but outstanding shares")]
    InvalidExchangeRate(String),

    #[error("share arithmetic overflow on validator {0}")]
    SharesOverflow(String),

    #[error("{delegator} has {pending} unsettled rewards on {validator}")]
    UnsettledRewards {
        delegator: String,
        validator: String,
        pending: u128,
    },

    #[error(transparent)]
    Bank(#[from] BankError),
}

/// Staking/delegation ledger.
pub trait StakingKeeper {
    fn validator(&self, operator: &ValAddress) -> Option<Validator>;

    fn delegation(&self, delegator: &AccAddress, operator: &ValAddress) -> Option<Delegation>;

    /// Delegate `amount` from `delegator`'s spendable balance to `validator`.
    /// Returns the shares issued.
    fn delegate(
        &mut self,
        delegator: &AccAddress,
        amount: u128,
        token_source: BondStatus,
        validator: &Validator,
        settle_rewards_first: bool,
    ) -> Result<u128, StakingError>;

    /// Tokens currently backing the delegation, 0 if there is none.
    fn delegated_tokens(&self, delegator: &AccAddress, operator: &ValAddress) -> u128 {
        match (self.delegation(delegator, operator), self.validator(operator)) {
            (Some(delegation), Some(validator)) => validator.tokens_from_shares(delegation.shares).unwrap_or(0),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStaking {
    state: SharedState,
}

impl MemoryStaking {
    pub(crate) fn new(state: SharedState) -> Self {
        MemoryStaking { state }
    }
}

fn bond_coins(amount: u128) -> Coins {
    Coins::from_coin(Coin {
        denom: BOND_DENOM.to_string(),
        amount,
    })
}

impl StakingKeeper for MemoryStaking {
    fn validator(&self, operator: &ValAddress) -> Option<Validator> {
        self.state.read().validators.get(operator).cloned()
    }

    fn delegation(&self, delegator: &AccAddress, operator: &ValAddress) -> Option<Delegation> {
        self.state
            .read()
            .delegations
            .get(&(delegator.clone(), operator.clone()))
            .cloned()
    }

    fn delegate(
        &mut self,
        delegator: &AccAddress,
        amount: u128,
        token_source: BondStatus,
        validator: &Validator,
        settle_rewards_first: bool,
    ) -> Result<u128, StakingError> {
        if token_source != BondStatus::Unbonded {
            return Err(StakingError::InvalidTokenSource(token_source));
        }

        let mut state = self.state.write();
        let mut current = state
            .validators
            .get(&validator.operator)
            .cloned()
            .ok_or_else(|| StakingError::ValidatorNotFound(validator.operator.to_string()))?;

        let key = (delegator.clone(), current.operator.clone());
        let pending = state.delegations.get(&key).map(|d| d.pending_rewards).unwrap_or(0);
        if pending > 0 && !settle_rewards_first {
            return Err(StakingError::UnsettledRewards {
                delegator: delegator.to_string(),
                validator: current.operator.to_string(),
                pending,
            });
        }

        // Everything that can fail is checked before the first mutation.
        let new_shares = current.shares_from_tokens(amount)?;
        let overflow = || StakingError::SharesOverflow(current.operator.to_string());
        let tokens_after = current.tokens.checked_add(amount).ok_or_else(overflow)?;
        let shares_after = current.delegator_shares.checked_add(new_shares).ok_or_else(overflow)?;

        let distribution = AccAddress::module(DISTRIBUTION_MODULE);
        let reward_funds = state.balance(&distribution, BOND_DENOM);
        if reward_funds < pending {
            return Err(BankError::InsufficientFunds {
                address: distribution.to_string(),
                denom: BOND_DENOM.to_string(),
                needed: pending,
                available: reward_funds,
            }
            .into());
        }
        let spendable = state.balance(delegator, BOND_DENOM).saturating_add(pending);
        if spendable < amount {
            return Err(BankError::InsufficientFunds {
                address: delegator.to_string(),
                denom: BOND_DENOM.to_string(),
                needed: amount,
                available: spendable,
            }
            .into());
        }

        if pending > 0 {
            state.transfer(&distribution, delegator, &bond_coins(pending))?;
            if let Some(existing) = state.delegations.get_mut(&key) {
                existing.pending_rewards = 0;
            }
            state.record(LedgerEvent::RewardsSettled {
                delegator: delegator.clone(),
                validator: current.operator.clone(),
                amount: pending,
            });
            debug!("Settled {} rewards for {} on {}", pending, delegator, current.operator);
        }

        let pool = AccAddress::module(current.pool());
        state.transfer(delegator, &pool, &bond_coins(amount))?;

        current.tokens = tokens_after;
        current.delegator_shares = shares_after;
        let operator = current.operator.clone();
        state.validators.insert(operator.clone(), current);

        let delegation = state.delegations.entry(key).or_insert_with(|| Delegation {
            delegator: delegator.clone(),
            validator: operator.clone(),
            shares: 0,
            pending_rewards: 0,
        });
        delegation.shares = delegation.shares.saturating_add(new_shares);

        state.record(LedgerEvent::Delegate {
            delegator: delegator.clone(),
            validator: operator.clone(),
            amount,
            shares: new_shares,
        });
        debug!("Delegated {}{} from {} to {}", amount, BOND_DENOM, delegator, operator);

        Ok(new_shares)
    }
}
