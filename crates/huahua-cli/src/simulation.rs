//! Dry run of the v3.1.0 upgrade against an in-memory chain holding the tombstoned COS validator.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use huahua_ledger::{
    AccAddress, BondStatus, ConsAddress, GenesisBuilder, MemoryChain, SlashingKeeper, StakingKeeper, ValAddress,
    Validator, ValidatorSigningInfo, BOND_DENOM, SHARE_PRECISION,
};
use huahua_upgrades::{
    PenaltyState, UpgradeContext, UpgradeRegistry, COS_CONSENSUS_ADDRESS, COS_OPERATOR_ADDRESS, UPGRADE_NAME,
};
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Stake bonded to the COS validator before its double-sign slash
pub const SEED_VALIDATOR_TOKENS: u128 = 250_000_000_000;

/// Percentage of the bonded stake burned by the double-sign slash
pub const SEED_SLASH_PERCENT: u128 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientDelegation {
    pub recipient: AccAddress,
    pub compensated: u128,
    pub delegated: u128,
    pub spendable: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub chain_id: String,
    pub upgrade: String,
    pub context: UpgradeContext,
    pub plan_digest: String,
    pub supply_before: u128,
    pub supply_after: u128,
    pub penalty_before: PenaltyState,
    pub penalty_after: PenaltyState,
    pub pre_state_hash: String,
    pub post_state_hash: String,
    pub delegations: Vec<RecipientDelegation>,
}

impl SimulationReport {
    pub fn minted(&self) -> u128 {
        self.supply_after.saturating_sub(self.supply_before)
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "chain:        {}", self.chain_id)?;
        writeln!(f, "upgrade:      {} at height {}", self.upgrade, self.context.height)?;
        writeln!(f, "block time:   {}", self.context.block_time.to_rfc3339())?;
        writeln!(f, "plan digest:  {}", self.plan_digest)?;
        writeln!(
            f,
            "supply:       {} -> {} (+{}{})",
            self.supply_before,
            self.supply_after,
            self.minted(),
            BOND_DENOM
        )?;
        writeln!(f, "penalty:      {:?} -> {:?}", self.penalty_before, self.penalty_after)?;
        writeln!(f, "state hash:   {} -> {}", self.pre_state_hash, self.post_state_hash)?;
        writeln!(f, "delegations:")?;
        for d in &self.delegations {
            writeln!(
                f,
                "  {}  compensated {:>14}  delegated {:>14}  spendable {}",
                d.recipient, d.compensated, d.delegated, d.spendable
            )?;
        }
        Ok(())
    }
}

/// Chain holding the COS validator as it stood before the upgrade: slashed, jailed, unbonded, tombstoned.
/// Shares were issued 1:1 before the slash, so tokens now sit below shares.
pub fn seed_chain() -> Result<MemoryChain> {
    let operator = ValAddress::from_bech32(COS_OPERATOR_ADDRESS).context("COS operator address")?;
    let consensus = ConsAddress::from_bech32(COS_CONSENSUS_ADDRESS).context("COS consensus address")?;

    let mut validator = Validator::new(operator, consensus.clone(), BondStatus::Unbonded);
    validator.jailed = true;
    validator.tokens = SEED_VALIDATOR_TOKENS * (100 - SEED_SLASH_PERCENT) / 100;
    validator.delegator_shares = SEED_VALIDATOR_TOKENS * SHARE_PRECISION;

    let mut signing_info = ValidatorSigningInfo::new(consensus, 1);
    signing_info.tombstoned = true;
    signing_info.jailed_until = Utc
        .with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .context("double-sign jail end time")?;

    Ok(GenesisBuilder::new()
        .with_validator(validator)
        .with_signing_info(signing_info)
        .build())
}

pub fn parse_block_time(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw).with_context(|| format!("invalid RFC 3339 time {raw:?}"))?;
    Ok(parsed.with_timezone(&Utc))
}

fn penalty_state(chain: &MemoryChain, consensus: &ConsAddress) -> Result<PenaltyState> {
    let info = chain
        .keepers()
        .slashing
        .signing_info(consensus)
        .context("COS signing info missing from simulated chain")?;
    Ok(PenaltyState::of(&info))
}

/// Apply the registered upgrade to a freshly seeded chain.
pub fn simulate(chain_id: &str, ctx: UpgradeContext) -> Result<SimulationReport> {
    let chain = seed_chain()?;
    let consensus = ConsAddress::from_bech32(COS_CONSENSUS_ADDRESS)?;
    let operator = ValAddress::from_bech32(COS_OPERATOR_ADDRESS)?;
    let supply_before = chain.total_supply(BOND_DENOM);
    let penalty_before = penalty_state(&chain, &consensus)?;

    info!(chain_id, height = ctx.height, "Simulating upgrade {}", UPGRADE_NAME);
    let mut registry = UpgradeRegistry::with_default_upgrades();
    let execution = registry
        .apply(UPGRADE_NAME, &ctx, &chain)
        .with_context(|| format!("upgrade {UPGRADE_NAME} failed"))?;

    chain
        .check_supply_invariant()
        .context("supply invariant after upgrade")?;

    let staking = chain.keepers().staking;
    let delegations = execution
        .outcome
        .report
        .records
        .iter()
        .map(|record| RecipientDelegation {
            recipient: record.recipient.clone(),
            compensated: record.amount,
            delegated: staking.delegated_tokens(&record.recipient, &operator),
            spendable: chain.balance(&record.recipient, BOND_DENOM),
        })
        .collect();

    Ok(SimulationReport {
        chain_id: chain_id.to_string(),
        upgrade: execution.name.clone(),
        context: ctx,
        plan_digest: execution.outcome.plan_digest.clone(),
        supply_before,
        supply_after: chain.total_supply(BOND_DENOM),
        penalty_before,
        penalty_after: penalty_state(&chain, &consensus)?,
        pre_state_hash: execution.pre_state_hash.clone(),
        post_state_hash: execution.post_state_hash.clone(),
        delegations,
    })
}
