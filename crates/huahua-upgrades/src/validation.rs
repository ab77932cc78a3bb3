// REMEDIATION INPUT VALIDATION
// Decodes the dataset and the validator identity, then resolves both against the ledgers.
//
// SAFETY INVARIANTS:
// 1. Validation never mutates any ledger
// 2. Every row is decoded before the first ledger read
// 3. The identity is decoded and resolved as a whole: operator, consensus and signing info
// 4. A plan is only produced when every input is valid and resolvable

use crate::error::RemediationError;
use crate::records::{CompensationRecord, IdentityConfig, RawRecord, ValidatorIdentity};
use huahua_ledger::{
    AccAddress, Coin, ConsAddress, SlashingKeeper, StakingKeeper, ValAddress, Validator,
    ValidatorSigningInfo, BOND_DENOM,
};
use log::{debug, info};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Parse the dataset JSON into validated records, preserving order.
pub fn decode_records(json: &str) -> Result<Vec<CompensationRecord>, RemediationError> {
    let rows: Vec<RawRecord> = serde_json::from_str(json).map_err(RemediationError::MalformedDataset)?;

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            let recipient =
                AccAddress::from_bech32(&row.address).map_err(|source| RemediationError::InvalidRecipient {
                    index,
                    address: row.address.clone(),
                    source,
                })?;
            let amount =
                Coin::parse(BOND_DENOM, &row.amount).map_err(|source| RemediationError::InvalidAmount {
                    index,
                    address: row.address.clone(),
                    amount: row.amount.clone(),
                    source,
                })?;
            Ok(CompensationRecord { recipient, amount })
        })
        .collect()
}

pub fn decode_identity(config: IdentityConfig<'_>) -> Result<ValidatorIdentity, RemediationError> {
    let operator =
        ValAddress::from_bech32(config.operator).map_err(|source| RemediationError::InvalidOperator {
            address: config.operator.to_string(),
            source,
        })?;
    let consensus =
        ConsAddress::from_bech32(config.consensus).map_err(|source| RemediationError::InvalidConsensus {
            address: config.consensus.to_string(),
            source,
        })?;
    Ok(ValidatorIdentity { operator, consensus })
}

/// Everything the remediation needs, validated and resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationPlan {
    pub identity: ValidatorIdentity,

    /// Staking record of the validator at plan time
    pub validator: Validator,

    /// Signing info of the validator at plan time
    pub signing_info: ValidatorSigningInfo,

    pub records: Vec<CompensationRecord>,
}

impl RemediationPlan {
    /// Sum of all record amounts.
    pub fn total(&self) -> Result<u128, RemediationError> {
        records_total(&self.records)
    }

    /// Hex SHA-256 over the identity and every record in order.
    pub fn digest(&self) -> String {
        plan_digest(&self.identity, &self.records)
    }
}

/// Overflow-checked sum of record amounts.
pub fn records_total(records: &[CompensationRecord]) -> Result<u128, RemediationError> {
    records.iter().try_fold(0u128, |sum, record| {
        sum.checked_add(record.amount.amount)
            .ok_or(RemediationError::TotalOverflow)
    })
}

/// Fingerprint of the inputs alone, usable before any ledger is available.
pub fn plan_digest(identity: &ValidatorIdentity, records: &[CompensationRecord]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.operator.as_bytes());
    hasher.update(identity.consensus.as_bytes());
    hasher.update((records.len() as u64).to_le_bytes());
    for record in records {
        hasher.update((record.recipient.as_bytes().len() as u64).to_le_bytes());
        hasher.update(record.recipient.as_bytes());
        hasher.update(record.amount.denom.as_bytes());
        hasher.update(record.amount.amount.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Look up the validator and its signing info; no ledger is written.
pub fn resolve(
    identity: ValidatorIdentity,
    records: Vec<CompensationRecord>,
    staking: &dyn StakingKeeper,
    slashing: &dyn SlashingKeeper,
) -> Result<RemediationPlan, RemediationError> {
    let validator = staking
        .validator(&identity.operator)
        .ok_or_else(|| RemediationError::ValidatorNotFound(identity.operator.to_string()))?;

    if validator.consensus != identity.consensus {
        return Err(RemediationError::IdentityMismatch {
            operator: identity.operator.to_string(),
            expected: identity.consensus.to_string(),
            actual: validator.consensus.to_string(),
        });
    }

    let signing_info = slashing
        .signing_info(&identity.consensus)
        .ok_or_else(|| RemediationError::SigningInfoNotFound(identity.consensus.to_string()))?;

    let plan = RemediationPlan {
        identity,
        validator,
        signing_info,
        records,
    };
    let total = plan.total()?;
    debug!("Resolved validator {} ({:?})", plan.identity.operator, plan.validator.status);
    info!(
        "Remediation plan: {} records, {}{} total, digest {}",
        plan.records.len(),
        total,
        BOND_DENOM,
        plan.digest()
    );
    Ok(plan)
}

/// Decode then resolve. Both inputs are fully decoded before either ledger is read.
pub fn build_plan(
    records_json: &str,
    identity: IdentityConfig<'_>,
    staking: &dyn StakingKeeper,
    slashing: &dyn SlashingKeeper,
) -> Result<RemediationPlan, RemediationError> {
    let identity = decode_identity(identity)?;
    let records = decode_records(records_json)?;
    resolve(identity, records, staking, slashing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::records::COS_MINTS_JSON;
    use huahua_ledger::{AddressError, BondStatus, CoinError, GenesisBuilder};

    const ALICE: &str = "chihuahua190vqdjtlpcq27xslcveglfmr4ynfwg7grw4e33";

    #[test]
    fn test_embedded_dataset_decodes() {
        let records = decode_records(COS_MINTS_JSON).unwrap();
        assert_eq!(records.len(), 18);
        assert_eq!(
            records[0].recipient.to_bech32(),
            "chihuahua1vukakjfa9rz9fuac2ensgzs9v2nztwq95a7hrv"
        );
        assert_eq!(records[0].amount.amount, 1_000_070_705);
        assert_eq!(records_total(&records).unwrap(), 19_321_295_660);
    }

    #[test]
    fn test_records_total_rejects_overflow() {
        let record = |amount| CompensationRecord {
            recipient: AccAddress::from_bech32(ALICE).unwrap(),
            amount: Coin::new(BOND_DENOM, amount).unwrap(),
        };
        assert_eq!(records_total(&[]).unwrap(), 0);
        assert_eq!(records_total(&[record(u128::MAX), record(0)]).unwrap(), u128::MAX);
        assert!(matches!(
            records_total(&[record(u128::MAX), record(1)]),
            Err(RemediationError::TotalOverflow)
        ));
    }

    #[test]
    fn test_embedded_identity_decodes() {
        let identity = decode_identity(IdentityConfig::cos()).unwrap();
        assert_eq!(identity.operator.to_bech32(), crate::records::COS_OPERATOR_ADDRESS);
        assert_eq!(identity.consensus.to_bech32(), crate::records::COS_CONSENSUS_ADDRESS);
    }

    #[test]
    fn test_amount_errors_carry_record_context() {
        let json = format!(r#"[{{"address":"{ALICE}","amount":"10"}},{{"address":"{ALICE}","amount":"-5"}}]"#);
        let err = decode_records(&json).unwrap_err();
        assert_eq!(err.class(), ErrorClass::MalformedData);
        assert!(matches!(
            err,
            RemediationError::InvalidAmount { index: 1, source: CoinError::NegativeAmount(_), .. }
        ));

        let json = format!(r#"[{{"address":"{ALICE}","amount":"ten"}}]"#);
        assert!(matches!(
            decode_records(&json),
            Err(RemediationError::InvalidAmount { source: CoinError::NotNumeric(_), .. })
        ));

        let json = format!(r#"[{{"address":"{ALICE}","amount":"340282366920938463463374607431768211456"}}]"#);
        assert!(matches!(
            decode_records(&json),
            Err(RemediationError::InvalidAmount { source: CoinError::Overflow(_), .. })
        ));
    }

    #[test]
    fn test_zero_amount_is_valid() {
        let json = format!(r#"[{{"address":"{ALICE}","amount":"0"}}]"#);
        let records = decode_records(&json).unwrap();
        assert_eq!(records[0].amount.amount, 0);
    }

    #[test]
    fn test_wrong_prefix_and_bad_json_rejected() {
        let json = r#"[{"address":"chihuahuavaloper17h628d2wtlw6844nzv0ktnq9qtm5qm3pym0k44","amount":"1"}]"#;
        assert!(matches!(
            decode_records(json),
            Err(RemediationError::InvalidRecipient { index: 0, source: AddressError::InvalidPrefix { .. }, .. })
        ));

        assert!(matches!(
            decode_records(r#"[{"address":"x","amount":5}]"#),
            Err(RemediationError::MalformedDataset(_))
        ));
        assert!(matches!(decode_records("not json"), Err(RemediationError::MalformedDataset(_))));
        assert!(decode_records("[]").unwrap().is_empty());
    }

    #[test]
    fn test_identity_with_swapped_prefixes_rejected() {
        let swapped = IdentityConfig {
            operator: crate::records::COS_CONSENSUS_ADDRESS,
            consensus: crate::records::COS_OPERATOR_ADDRESS,
        };
        assert!(matches!(
            decode_identity(swapped),
            Err(RemediationError::InvalidOperator { .. })
        ));
    }

    #[test]
    fn test_resolve_requires_matching_consensus_address() {
        let identity = decode_identity(IdentityConfig::cos()).unwrap();
        let other_cons =
            ConsAddress::from_bech32("chihuahuavalcons1grsj06zp5dncts68drtdpxes2rrjfrrx7lex0v").unwrap();
        let chain = GenesisBuilder::new()
            .with_validator(Validator::new(identity.operator.clone(), other_cons, BondStatus::Bonded))
            .with_signing_info(ValidatorSigningInfo::new(identity.consensus.clone(), 1))
            .build();
        let keepers = chain.keepers();

        let err = resolve(identity, Vec::new(), &keepers.staking, &keepers.slashing).unwrap_err();
        assert!(matches!(err, RemediationError::IdentityMismatch { .. }));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[test]
    fn test_resolve_requires_signing_info() {
        let identity = decode_identity(IdentityConfig::cos()).unwrap();
        let chain = GenesisBuilder::new()
            .with_validator(Validator::new(
                identity.operator.clone(),
                identity.consensus.clone(),
                BondStatus::Bonded,
            ))
            .build();
        let keepers = chain.keepers();

        assert!(matches!(
            resolve(identity, Vec::new(), &keepers.staking, &keepers.slashing),
            Err(RemediationError::SigningInfoNotFound(_))
        ));
    }

    #[test]
    fn test_digest_depends_on_record_order() {
        let identity = decode_identity(IdentityConfig::cos()).unwrap();
        let mut records = decode_records(COS_MINTS_JSON).unwrap();
        let forward = plan_digest(&identity, &records);
        assert_eq!(forward, plan_digest(&identity, &records));
        records.swap(0, 1);
        assert_ne!(forward, plan_digest(&identity, &records));
    }
}
