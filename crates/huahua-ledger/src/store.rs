// IN-MEMORY CHAIN STATE
// One shared state backing the reference mint, bank, staking and slashing keepers.
//
// SAFETY INVARIANTS:
// 1. Total supply of every denom equals the sum of all balances of that denom
// 2. Every mutation appends exactly one journal event
// 3. A cache branch never touches its parent until `write` is called
// 4. `state_hash` is independent of map insertion order and of the journal

use crate::address::{AccAddress, ConsAddress, ValAddress};
use crate::bank::BankError;
use crate::coin::Coins;
use crate::slashing::{MemorySlashing, ValidatorSigningInfo};
use crate::staking::{Delegation, MemoryStaking, Validator};
use crate::{bank::MemoryBank, mint::MemoryMint};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

pub const MINT_MODULE: &str = "mint";
pub const DISTRIBUTION_MODULE: &str = "distribution";
pub const BONDED_POOL: &str = "bonded_tokens_pool";
pub const NOT_BONDED_POOL: &str = "not_bonded_tokens_pool";

/// Module accounts known to the bank. None of them may receive user sends.
pub const MODULE_ACCOUNTS: [&str; 4] = [MINT_MODULE, DISTRIBUTION_MODULE, BONDED_POOL, NOT_BONDED_POOL];

pub fn is_module_account(address: &AccAddress) -> bool {
    MODULE_ACCOUNTS
        .iter()
        .any(|name| AccAddress::module(name) == *address)
}

/// Journal entry for every ledger mutation, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Mint {
        coins: Coins,
    },
    Transfer {
        from: AccAddress,
        to: AccAddress,
        coins: Coins,
    },
    RewardsSettled {
        delegator: AccAddress,
        validator: ValAddress,
        amount: u128,
    },
    Delegate {
        delegator: AccAddress,
        validator: ValAddress,
        amount: u128,
        shares: u128,
    },
    TombstoneReverted {
        consensus: ConsAddress,
        was_tombstoned: bool,
    },
    JailedUntil {
        consensus: ConsAddress,
        until: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    #[error("supply of {denom} is {supply} but balances sum to {balances}")]
    SupplyMismatch {
        denom: String,
        supply: u128,
        balances: u128,
    },
}

/// Complete ledger state. Ordered maps keep iteration deterministic.
#[derive(Debug, Clone, Default)]
pub struct ChainState {
    /// account → denom → amount
    pub balances: BTreeMap<AccAddress, BTreeMap<String, u128>>,

    /// denom → total supply
    pub supply: BTreeMap<String, u128>,

    pub validators: BTreeMap<ValAddress, Validator>,

    /// (delegator, validator) → delegation
    pub delegations: BTreeMap<(AccAddress, ValAddress), Delegation>,

    pub signing_infos: BTreeMap<ConsAddress, ValidatorSigningInfo>,

    /// Mutation journal (not part of the state hash)
    pub events: Vec<LedgerEvent>,
}

impl ChainState {
    pub fn balance(&self, address: &AccAddress, denom: &str) -> u128 {
        self.balances
            .get(address)
            .and_then(|b| b.get(denom))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_supply(&self, denom: &str) -> u128 {
        self.supply.get(denom).copied().unwrap_or(0)
    }

    pub(crate) fn credit(&mut self, address: &AccAddress, denom: &str, amount: u128) -> Result<(), BankError> {
        let entry = self
            .balances
            .entry(address.clone())
            .or_default()
            .entry(denom.to_string())
            .or_insert(0);
        *entry = entry.checked_add(amount).ok_or_else(|| BankError::BalanceOverflow {
            address: address.to_string(),
            denom: denom.to_string(),
        })?;
        Ok(())
    }

    pub(crate) fn debit(&mut self, address: &AccAddress, denom: &str, amount: u128) -> Result<(), BankError> {
        let available = self.balance(address, denom);
        if available < amount {
            return Err(BankError::InsufficientFunds {
                address: address.to_string(),
                denom: denom.to_string(),
                needed: amount,
                available,
            });
        }
        if amount == 0 {
            return Ok(());
        }
        if let Some(balances) = self.balances.get_mut(address) {
            let remaining = available - amount;
            if remaining == 0 {
                balances.remove(denom);
            } else {
                balances.insert(denom.to_string(), remaining);
            }
            if balances.is_empty() {
                self.balances.remove(address);
            }
        }
        Ok(())
    }

    /// Move `coins` between two accounts. All debits are checked before anything moves.
    pub(crate) fn transfer(&mut self, from: &AccAddress, to: &AccAddress, coins: &Coins) -> Result<(), BankError> {
        for coin in coins.iter() {
            let available = self.balance(from, &coin.denom);
            if available < coin.amount {
                return Err(BankError::InsufficientFunds {
                    address: from.to_string(),
                    denom: coin.denom.clone(),
                    needed: coin.amount,
                    available,
                });
            }
            if self.balance(to, &coin.denom).checked_add(coin.amount).is_none() {
                return Err(BankError::BalanceOverflow {
                    address: to.to_string(),
                    denom: coin.denom.clone(),
                });
            }
        }
        for coin in coins.iter() {
            self.debit(from, &coin.denom, coin.amount)?;
            self.credit(to, &coin.denom, coin.amount)?;
        }
        Ok(())
    }

    pub(crate) fn record(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Verify invariant 1 for every denom that has supply or balances.
    pub fn check_supply_invariant(&self) -> Result<(), InvariantError> {
        let mut sums: BTreeMap<&str, u128> = BTreeMap::new();
        for balances in self.balances.values() {
            for (denom, amount) in balances {
                let sum = sums.entry(denom.as_str()).or_insert(0);
                *sum = sum.saturating_add(*amount);
            }
        }
        for denom in self.supply.keys() {
            sums.entry(denom.as_str()).or_insert(0);
        }
        for (denom, balances) in sums {
            let supply = self.total_supply(denom);
            if supply != balances {
                return Err(InvariantError::SupplyMismatch {
                    denom: denom.to_string(),
                    supply,
                    balances,
                });
            }
        }
        Ok(())
    }

    /// SHA-256 commitment over balances, supply, validators, delegations and signing infos.
    pub fn state_hash(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(b"balances");
        for (address, balances) in &self.balances {
            for (denom, amount) in balances {
                hash_bytes(&mut hasher, address.as_bytes());
                hash_bytes(&mut hasher, denom.as_bytes());
                hasher.update(amount.to_le_bytes());
            }
        }

        hasher.update(b"supply");
        for (denom, amount) in &self.supply {
            hash_bytes(&mut hasher, denom.as_bytes());
            hasher.update(amount.to_le_bytes());
        }

        hasher.update(b"validators");
        for validator in self.validators.values() {
            hash_bytes(&mut hasher, validator.operator.as_bytes());
            hash_bytes(&mut hasher, validator.consensus.as_bytes());
            hasher.update([validator.status as u8, u8::from(validator.jailed)]);
            hasher.update(validator.tokens.to_le_bytes());
            hasher.update(validator.delegator_shares.to_le_bytes());
        }

        hasher.update(b"delegations");
        for delegation in self.delegations.values() {
            hash_bytes(&mut hasher, delegation.delegator.as_bytes());
            hash_bytes(&mut hasher, delegation.validator.as_bytes());
            hasher.update(delegation.shares.to_le_bytes());
            hasher.update(delegation.pending_rewards.to_le_bytes());
        }

        hasher.update(b"signing_infos");
        for info in self.signing_infos.values() {
            hash_bytes(&mut hasher, info.address.as_bytes());
            hasher.update(info.start_height.to_le_bytes());
            hasher.update(info.index_offset.to_le_bytes());
            hasher.update(info.jailed_until.timestamp().to_le_bytes());
            hasher.update(info.jailed_until.timestamp_subsec_nanos().to_le_bytes());
            hasher.update([u8::from(info.tombstoned)]);
            hasher.update(info.missed_blocks_counter.to_le_bytes());
        }

        hex::encode(hasher.finalize())
    }
}

/// Length-prefixed so adjacent variable-length fields cannot collide.
fn hash_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

pub(crate) type SharedState = Arc<RwLock<ChainState>>;

/// The four reference keepers, all viewing the same state.
pub struct MemoryKeepers {
    pub mint: MemoryMint,
    pub bank: MemoryBank,
    pub staking: MemoryStaking,
    pub slashing: MemorySlashing,
}

/// In-memory chain used by simulations and tests.
#[derive(Debug, Default)]
pub struct MemoryChain {
    state: SharedState,
}

impl MemoryChain {
    pub fn new(state: ChainState) -> Self {
        MemoryChain {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn keepers(&self) -> MemoryKeepers {
        MemoryKeepers {
            mint: MemoryMint::new(Arc::clone(&self.state)),
            bank: MemoryBank::new(Arc::clone(&self.state)),
            staking: MemoryStaking::new(Arc::clone(&self.state)),
            slashing: MemorySlashing::new(Arc::clone(&self.state)),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ChainState {
        self.state.read().clone()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.state.read().events.clone()
    }

    pub fn balance(&self, address: &AccAddress, denom: &str) -> u128 {
        self.state.read().balance(address, denom)
    }

    pub fn total_supply(&self, denom: &str) -> u128 {
        self.state.read().total_supply(denom)
    }

    pub fn state_hash(&self) -> String {
        self.state.read().state_hash()
    }

    pub fn check_supply_invariant(&self) -> Result<(), InvariantError> {
        self.state.read().check_supply_invariant()
    }

    /// Branch the state. Mutations made through the branch reach this chain only via `write`.
    pub fn cache_context(&self) -> CacheContext {
        CacheContext {
            parent: Arc::clone(&self.state),
            branch: MemoryChain::new(self.snapshot()),
        }
    }
}

/// Uncommitted branch of a `MemoryChain`. Dropping it discards every mutation.
#[derive(Debug)]
pub struct CacheContext {
    parent: SharedState,
    branch: MemoryChain,
}

impl CacheContext {
    pub fn chain(&self) -> &MemoryChain {
        &self.branch
    }

    /// Commit the branch into its parent.
    pub fn write(self) {
        let committed = self.branch.snapshot();
        *self.parent.write() = committed;
    }
}
