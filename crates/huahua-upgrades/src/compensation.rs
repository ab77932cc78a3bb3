// COMPENSATION ENGINE
// Mints, transfers and re-delegates each record's amount to the reverted validator.
//
// SAFETY INVARIANTS:
// 1. Records are processed strictly in dataset order, one at a time
// 2. Per record: mint, then send from the mint module, then delegate
// 3. The first failing step aborts the run; nothing is retried or skipped
// 4. Total minted equals the sum of record amounts

use crate::error::RemediationError;
use crate::records::CompensationRecord;
use crate::tombstone::ReversalReceipt;
use crate::validation::RemediationPlan;
use huahua_ledger::{
    AccAddress, BankKeeper, BondStatus, Coins, MintKeeper, StakingKeeper, Validator, MINT_MODULE,
};
use log::{debug, info};
use serde::Serialize;

/// Result of one fully processed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompensatedRecord {
    pub recipient: AccAddress,
    pub amount: u128,

    /// Delegation shares issued by the validator
    pub shares: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompensationReport {
    pub records: Vec<CompensatedRecord>,
    pub total_minted: u128,
}

// Stage tokens. Each step consumes the previous stage, so steps cannot be reordered.

struct Pending<'r> {
    index: usize,
    record: &'r CompensationRecord,
    coins: Coins,
}

struct Minted<'r>(Pending<'r>);

struct Transferred<'r>(Pending<'r>);

impl<'r> Pending<'r> {
    fn new(index: usize, record: &'r CompensationRecord) -> Self {
        Pending {
            index,
            record,
            coins: Coins::from_coin(record.amount.clone()),
        }
    }

    fn address(&self) -> String {
        self.record.recipient.to_string()
    }

    fn amount(&self) -> u128 {
        self.record.amount.amount
    }

    fn mint(self, mint: &mut dyn MintKeeper) -> Result<Minted<'r>, RemediationError> {
        mint.mint_coins(&self.coins)
            .map_err(|source| RemediationError::MintRejected {
                index: self.index,
                address: self.address(),
                amount: self.amount(),
                source,
            })?;
        Ok(Minted(self))
    }
}

impl<'r> Minted<'r> {
    fn transfer(self, bank: &mut dyn BankKeeper) -> Result<Transferred<'r>, RemediationError> {
        let stage = self.0;
        bank.send_coins_from_module_to_account(MINT_MODULE, &stage.record.recipient, &stage.coins)
            .map_err(|source| RemediationError::TransferRejected {
                index: stage.index,
                address: stage.address(),
                amount: stage.amount(),
                source,
            })?;
        Ok(Transferred(stage))
    }
}

impl<'r> Transferred<'r> {
    fn delegate(
        self,
        staking: &mut dyn StakingKeeper,
        validator: &Validator,
    ) -> Result<CompensatedRecord, RemediationError> {
        let stage = self.0;
        let shares = staking
            .delegate(
                &stage.record.recipient,
                stage.amount(),
                BondStatus::Unbonded,
                validator,
                true,
            )
            .map_err(|source| RemediationError::DelegationRejected {
                index: stage.index,
                address: stage.address(),
                amount: stage.amount(),
                source,
            })?;
        Ok(CompensatedRecord {
            recipient: stage.record.recipient.clone(),
            amount: stage.amount(),
            shares,
        })
    }
}

/// Run every record of `plan` through mint, transfer and delegate.
/// The receipt ties compensation to a completed tombstone reversal.
pub fn compensate(
    receipt: &ReversalReceipt,
    plan: &RemediationPlan,
    mint: &mut dyn MintKeeper,
    bank: &mut dyn BankKeeper,
    staking: &mut dyn StakingKeeper,
) -> Result<CompensationReport, RemediationError> {
    let mut records = Vec::with_capacity(plan.records.len());
    let mut total_minted: u128 = 0;

    for (index, record) in plan.records.iter().enumerate() {
        let done = Pending::new(index, record)
            .mint(&mut *mint)?
            .transfer(&mut *bank)?
            .delegate(&mut *staking, &plan.validator)?;

        total_minted = total_minted
            .checked_add(done.amount)
            .ok_or(RemediationError::TotalOverflow)?;
        debug!(
            "Record {}: {} delegated {} to {} for {} shares",
            index, done.recipient, done.amount, plan.identity.operator, done.shares
        );
        records.push(done);
    }

    info!(
        "Compensated {} accounts, {} minted and delegated to {} (jailed until {})",
        records.len(),
        total_minted,
        plan.identity.operator,
        receipt.jailed_until()
    );
    Ok(CompensationReport {
        records,
        total_minted,
    })
}
