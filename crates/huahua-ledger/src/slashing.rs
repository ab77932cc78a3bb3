// SLASHING LEDGER
// Per-validator signing info: tombstone flag and jail deadline.
//
// SAFETY INVARIANTS:
// 1. Clearing the tombstone flag is idempotent
// 2. Unknown consensus addresses are rejected, never created on the fly
// 3. `jail_until` stores exactly the timestamp it is given

use crate::address::ConsAddress;
use crate::store::{LedgerEvent, SharedState};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSigningInfo {
    pub address: ConsAddress,

    /// Height at which the validator was first a candidate or was unjailed
    pub start_height: u64,

    /// Index into the missed-blocks bit array
    pub index_offset: u64,

    /// Earliest time the validator may unjail itself
    pub jailed_until: DateTime<Utc>,

    /// Permanent ban from the validator set
    pub tombstoned: bool,

    pub missed_blocks_counter: u64,
}

impl ValidatorSigningInfo {
    pub fn new(address: ConsAddress, start_height: u64) -> Self {
        ValidatorSigningInfo {
            address,
            start_height,
            index_offset: 0,
            jailed_until: DateTime::<Utc>::default(),
            tombstoned: false,
            missed_blocks_counter: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlashingError {
    #[error("no signing info for consensus address {0}")]
    SigningInfoNotFound(String),
}

/// Misbehaviour-penalty ledger.
pub trait SlashingKeeper {
    fn signing_info(&self, consensus: &ConsAddress) -> Option<ValidatorSigningInfo>;

    /// Clear the tombstone flag. Clearing a flag that is already clear succeeds.
    fn revert_tombstone(&mut self, consensus: &ConsAddress) -> Result<(), SlashingError>;

    /// Set the earliest unjail time.
    fn jail_until(&mut self, consensus: &ConsAddress, until: DateTime<Utc>) -> Result<(), SlashingError>;
}

#[derive(Debug, Clone)]
pub struct MemorySlashing {
    state: SharedState,
}

impl MemorySlashing {
    pub(crate) fn new(state: SharedState) -> Self {
        MemorySlashing { state }
    }
}

impl SlashingKeeper for MemorySlashing {
    fn signing_info(&self, consensus: &ConsAddress) -> Option<ValidatorSigningInfo> {
        self.state.read().signing_infos.get(consensus).cloned()
    }

    fn revert_tombstone(&mut self, consensus: &ConsAddress) -> Result<(), SlashingError> {
        let mut state = self.state.write();
        let info = state
            .signing_infos
            .get_mut(consensus)
            .ok_or_else(|| SlashingError::SigningInfoNotFound(consensus.to_string()))?;
        let was_tombstoned = info.tombstoned;
        info.tombstoned = false;
        state.record(LedgerEvent::TombstoneReverted {
            consensus: consensus.clone(),
            was_tombstoned,
        });
        debug!("Tombstone cleared for {} (was set: {})", consensus, was_tombstoned);
        Ok(())
    }

    fn jail_until(&mut self, consensus: &ConsAddress, until: DateTime<Utc>) -> Result<(), SlashingError> {
        let mut state = self.state.write();
        let info = state
            .signing_infos
            .get_mut(consensus)
            .ok_or_else(|| SlashingError::SigningInfoNotFound(consensus.to_string()))?;
        info.jailed_until = until;
        state.record(LedgerEvent::JailedUntil {
            consensus: consensus.clone(),
            until,
        });
        debug!("{} jailed until {}", consensus, until);
        Ok(())
    }
}
