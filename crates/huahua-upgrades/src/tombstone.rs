// PENALTY REVERSAL
// Lifts a tombstone and replaces it with an ordinary jail that ends at the upgrade block time.
//
// SAFETY INVARIANTS:
// 1. The tombstone flag is cleared before the jail time is written
// 2. The jail time is exactly the block time of the upgrade
// 3. A `ReversalReceipt` exists only after both steps succeeded

use crate::error::RemediationError;
use chrono::{DateTime, Utc};
use huahua_ledger::{ConsAddress, SlashingKeeper, ValidatorSigningInfo};
use log::info;
use serde::Serialize;

/// Observed penalty state of a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PenaltyState {
    /// Permanently banned
    Tombstoned,

    /// Jailed, may unjail from `until` on
    Suspended { until: DateTime<Utc> },

    /// Never jailed
    Active,
}

impl PenaltyState {
    pub fn of(info: &ValidatorSigningInfo) -> Self {
        if info.tombstoned {
            PenaltyState::Tombstoned
        } else if info.jailed_until > DateTime::<Utc>::default() {
            PenaltyState::Suspended {
                until: info.jailed_until,
            }
        } else {
            PenaltyState::Active
        }
    }
}

/// Proof that a tombstone was reverted. Compensation cannot start without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReversalReceipt {
    consensus: ConsAddress,
    jailed_until: DateTime<Utc>,
}

impl ReversalReceipt {
    pub fn consensus(&self) -> &ConsAddress {
        &self.consensus
    }

    pub fn jailed_until(&self) -> DateTime<Utc> {
        self.jailed_until
    }
}

/// Clear the tombstone on `consensus`, then jail it until `block_time`.
pub fn revert_tombstone(
    slashing: &mut dyn SlashingKeeper,
    consensus: &ConsAddress,
    block_time: DateTime<Utc>,
) -> Result<ReversalReceipt, RemediationError> {
    let rejected = |source| RemediationError::PenaltyRejected {
        consensus: consensus.to_string(),
        source,
    };

    slashing.revert_tombstone(consensus).map_err(rejected)?;
    slashing.jail_until(consensus, block_time).map_err(rejected)?;

    info!("Tombstone reverted for {}, jailed until {}", consensus, block_time);
    Ok(ReversalReceipt {
        consensus: consensus.clone(),
        jailed_until: block_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use huahua_ledger::{GenesisBuilder, LedgerEvent, SlashingError};

    fn cons() -> ConsAddress {
        ConsAddress::from_bech32(crate::records::COS_CONSENSUS_ADDRESS).unwrap()
    }

    fn tombstoned() -> ValidatorSigningInfo {
        let mut info = ValidatorSigningInfo::new(cons(), 4_000_000);
        info.tombstoned = true;
        info.jailed_until = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        info
    }

    #[test]
    fn test_state_transitions_to_suspended() {
        let chain = GenesisBuilder::new().with_signing_info(tombstoned()).build();
        let mut slashing = chain.keepers().slashing;
        let now = Utc.with_ymd_and_hms(2022, 9, 6, 10, 0, 0).unwrap();

        assert_eq!(
            PenaltyState::of(&slashing.signing_info(&cons()).unwrap()),
            PenaltyState::Tombstoned
        );

        let receipt = revert_tombstone(&mut slashing, &cons(), now).unwrap();
        assert_eq!(receipt.jailed_until(), now);
        assert_eq!(receipt.consensus(), &cons());
        assert_eq!(
            PenaltyState::of(&slashing.signing_info(&cons()).unwrap()),
            PenaltyState::Suspended { until: now }
        );

        // tombstone cleared first, jail second
        let events = chain.events();
        assert!(matches!(events[0], LedgerEvent::TombstoneReverted { was_tombstoned: true, .. }));
        assert!(matches!(events[1], LedgerEvent::JailedUntil { until, .. } if until == now));
    }

    #[test]
    fn test_reversal_of_cleared_tombstone_succeeds() {
        let mut info = tombstoned();
        info.tombstoned = false;
        let chain = GenesisBuilder::new().with_signing_info(info).build();
        let mut slashing = chain.keepers().slashing;

        assert!(revert_tombstone(&mut slashing, &cons(), Utc::now()).is_ok());
    }

    #[test]
    fn test_missing_signing_info_is_rejected() {
        let chain = GenesisBuilder::new().build();
        let mut slashing = chain.keepers().slashing;

        let err = revert_tombstone(&mut slashing, &cons(), Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            RemediationError::PenaltyRejected { source: SlashingError::SigningInfoNotFound(_), .. }
        ));
    }

    #[test]
    fn test_fresh_signing_info_is_active() {
        assert_eq!(
            PenaltyState::of(&ValidatorSigningInfo::new(cons(), 1)),
            PenaltyState::Active
        );
    }
}
