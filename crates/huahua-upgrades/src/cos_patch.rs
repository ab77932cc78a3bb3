// COS PATCH
// Validate, reverse the tombstone, then compensate. In that order and only that order.
//
// SAFETY INVARIANTS:
// 1. No ledger is written until every input has been decoded and resolved
// 2. Compensation requires the receipt of a completed reversal
// 3. Failures propagate as `Err`; the caller discards every mutation made so far

use crate::compensation::{compensate, CompensationReport};
use crate::error::RemediationError;
use crate::records::{IdentityConfig, COS_MINTS_JSON};
use crate::tombstone::{revert_tombstone, PenaltyState, ReversalReceipt};
use crate::validation::build_plan;
use chrono::{DateTime, Utc};
use huahua_ledger::{BankKeeper, MintKeeper, SlashingKeeper, StakingKeeper};
use log::info;
use serde::{Deserialize, Serialize};

/// Block context the upgrade runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeContext {
    pub height: u64,
    pub block_time: DateTime<Utc>,
}

/// The four ledgers the remediation touches.
pub struct Keepers<'a> {
    pub mint: &'a mut dyn MintKeeper,
    pub bank: &'a mut dyn BankKeeper,
    pub staking: &'a mut dyn StakingKeeper,
    pub slashing: &'a mut dyn SlashingKeeper,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationOutcome {
    pub plan_digest: String,
    pub penalty_before: PenaltyState,
    pub receipt: ReversalReceipt,
    pub report: CompensationReport,
}

/// Run the remediation over explicit inputs.
pub fn apply(
    ctx: &UpgradeContext,
    keepers: Keepers<'_>,
    records_json: &str,
    identity: IdentityConfig<'_>,
) -> Result<RemediationOutcome, RemediationError> {
    let Keepers {
        mint,
        bank,
        staking,
        slashing,
    } = keepers;

    let plan = build_plan(records_json, identity, &*staking, &*slashing)?;
    let penalty_before = PenaltyState::of(&plan.signing_info);
    info!(
        "Applying COS patch at height {}: validator {} is {:?}",
        ctx.height, plan.identity.operator, penalty_before
    );

    let receipt = revert_tombstone(slashing, &plan.identity.consensus, ctx.block_time)?;
    let report = compensate(&receipt, &plan, mint, bank, staking)?;

    Ok(RemediationOutcome {
        plan_digest: plan.digest(),
        penalty_before,
        receipt,
        report,
    })
}

/// Run the remediation over the compiled-in dataset and COS validator.
pub fn apply_cos_patch(ctx: &UpgradeContext, keepers: Keepers<'_>) -> Result<RemediationOutcome, RemediationError> {
    apply(ctx, keepers, COS_MINTS_JSON, IdentityConfig::cos())
}
