/// CHIHUAHUA v3.1.0 UPGRADE: COS PATCH
///
/// One-time state remediation for the COS validator:
/// - Decode and resolve the embedded compensation dataset and validator identity
/// - Lift the tombstone, leaving an ordinary jail that ends at the upgrade block time
/// - Mint, transfer and re-delegate every lost amount to the validator
///
/// The registry runs the whole procedure in a cache branch and commits it only on success.

pub mod compensation;
pub mod cos_patch;
pub mod error;
pub mod records;
pub mod tombstone;
pub mod upgrades;
pub mod validation;

pub use compensation::{compensate, CompensatedRecord, CompensationReport};
pub use cos_patch::{apply, apply_cos_patch, Keepers, RemediationOutcome, UpgradeContext};
pub use error::{ErrorClass, RemediationError};
pub use records::{
    CompensationRecord, IdentityConfig, RawRecord, ValidatorIdentity, COS_CONSENSUS_ADDRESS,
    COS_MINTS_JSON, COS_OPERATOR_ADDRESS,
};
pub use tombstone::{revert_tombstone, PenaltyState, ReversalReceipt};
pub use upgrades::{
    v3_1_0, ProtocolVersion, Upgrade, UpgradeError, UpgradeExecution, UpgradeHandler, UpgradeRegistry,
    VersionError, UPGRADE_NAME,
};
pub use validation::{
    build_plan, decode_identity, decode_records, plan_digest, records_total, resolve, RemediationPlan,
};
