// COS REMEDIATION INPUTS
// Embedded compensation dataset and the validator identity it applies to.
// Everything here is compiled into the binary so every node runs the same inputs.

use huahua_ledger::{AccAddress, Coin, ConsAddress, ValAddress};
use serde::{Deserialize, Serialize};

/// Operator address of the tombstoned COS validator
pub const COS_OPERATOR_ADDRESS: &str = "chihuahuavaloper17h628d2wtlw6844nzv0ktnq9qtm5qm3pym0k44";

/// Consensus address of the tombstoned COS validator
pub const COS_CONSENSUS_ADDRESS: &str = "chihuahuavalcons1f0prvv39clgtp8zgng89kc2qyxknquv4mpcpk3";

/// Accounts compensated for tokens lost to the COS tombstone, amounts in `uhuahua`.
pub const COS_MINTS_JSON: &str = include_str!("../data/cos_mints.json");

/// One dataset row exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub address: String,
    pub amount: String,
}

/// A decoded, validated dataset row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationRecord {
    pub recipient: AccAddress,
    pub amount: Coin,
}

/// Unvalidated validator identity, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityConfig<'a> {
    pub operator: &'a str,
    pub consensus: &'a str,
}

impl IdentityConfig<'static> {
    pub const fn cos() -> Self {
        IdentityConfig {
            operator: COS_OPERATOR_ADDRESS,
            consensus: COS_CONSENSUS_ADDRESS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorIdentity {
    pub operator: ValAddress,
    pub consensus: ConsAddress,
}
