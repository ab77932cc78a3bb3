//! COS PATCH INTEGRATION TESTS
//!
//! These tests verify:
//! - Supply grows by exactly the compensated total
//! - Every recipient ends up delegated to the COS validator, nothing left spendable
//! - The tombstone is lifted and the jail ends at the upgrade block time
//! - Malformed or unresolvable inputs abort before any ledger write
//! - A failed upgrade leaves the state hash untouched and a successful one cannot rerun

use chrono::{DateTime, TimeZone, Utc};
use huahua_ledger::*;
use huahua_upgrades::*;
use proptest::prelude::*;

fn operator() -> ValAddress {
    ValAddress::from_bech32(COS_OPERATOR_ADDRESS).unwrap()
}

fn consensus() -> ConsAddress {
    ConsAddress::from_bech32(COS_CONSENSUS_ADDRESS).unwrap()
}

/// COS after the double-sign slash: 5% of the bonded tokens burned, shares unchanged.
fn cos_validator() -> Validator {
    slashed_validator(4_750_000, 5_000_000)
}

fn slashed_validator(tokens: u128, shares: u128) -> Validator {
    let mut validator = Validator::new(operator(), consensus(), BondStatus::Bonded);
    validator.jailed = true;
    validator.tokens = tokens;
    validator.delegator_shares = shares * SHARE_PRECISION;
    validator
}

fn tombstoned_info() -> ValidatorSigningInfo {
    let mut info = ValidatorSigningInfo::new(consensus(), 3_900_000);
    info.tombstoned = true;
    info.jailed_until = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
    info
}

fn upgrade_ctx() -> UpgradeContext {
    UpgradeContext {
        height: 4_130_000,
        block_time: Utc.with_ymd_and_hms(2022, 9, 6, 14, 30, 0).unwrap(),
    }
}

fn genesis() -> GenesisBuilder {
    GenesisBuilder::new()
        .with_validator(cos_validator())
        .with_signing_info(tombstoned_info())
}

fn account(byte: u8) -> AccAddress {
    AccAddress::from_bytes(vec![byte; 20]).unwrap()
}

fn dataset(rows: &[(&AccAddress, &str)]) -> String {
    let rows: Vec<RawRecord> = rows
        .iter()
        .map(|(address, amount)| RawRecord {
            address: address.to_bech32(),
            amount: amount.to_string(),
        })
        .collect();
    serde_json::to_string(&rows).unwrap()
}

fn run(chain: &MemoryChain, json: &str, identity: IdentityConfig<'_>) -> Result<RemediationOutcome, RemediationError> {
    let MemoryKeepers {
        mut mint,
        mut bank,
        mut staking,
        mut slashing,
    } = chain.keepers();
    apply(
        &upgrade_ctx(),
        Keepers {
            mint: &mut mint,
            bank: &mut bank,
            staking: &mut staking,
            slashing: &mut slashing,
        },
        json,
        identity,
    )
}

fn jailed_until(chain: &MemoryChain) -> DateTime<Utc> {
    chain.snapshot().signing_infos[&consensus()].jailed_until
}

#[test_log::test]
fn test_two_record_scenario() {
    let (a, b) = (account(1), account(2));
    let chain = genesis().build();
    let supply_before = chain.total_supply(BOND_DENOM);

    let outcome = run(&chain, &dataset(&[(&a, "100"), (&b, "50")]), IdentityConfig::cos()).unwrap();

    assert_eq!(outcome.report.total_minted, 150);
    assert_eq!(chain.total_supply(BOND_DENOM), supply_before + 150);
    assert_eq!(chain.balance(&a, BOND_DENOM), 0);
    assert_eq!(chain.balance(&b, BOND_DENOM), 0);

    let staking = chain.keepers().staking;
    assert_eq!(staking.delegated_tokens(&a, &operator()), 100);
    assert_eq!(staking.delegated_tokens(&b, &operator()), 50);
    assert_eq!(staking.validator(&operator()).unwrap().tokens, 4_750_150);

    let info = chain.keepers().slashing.signing_info(&consensus()).unwrap();
    assert!(!info.tombstoned);
    assert_eq!(info.jailed_until, upgrade_ctx().block_time);
    assert_eq!(outcome.penalty_before, PenaltyState::Tombstoned);
    assert_eq!(
        PenaltyState::of(&info),
        PenaltyState::Suspended {
            until: upgrade_ctx().block_time
        }
    );
    assert!(chain.check_supply_invariant().is_ok());
}

#[test_log::test]
fn test_journal_order_is_reversal_then_mint_send_delegate() {
    let (a, b) = (account(1), account(2));
    let chain = genesis().build();
    run(&chain, &dataset(&[(&a, "100"), (&b, "50")]), IdentityConfig::cos()).unwrap();

    let kinds: Vec<&str> = chain
        .events()
        .iter()
        .map(|event| match event {
            LedgerEvent::TombstoneReverted { .. } => "tombstone",
            LedgerEvent::JailedUntil { .. } => "jail",
            LedgerEvent::Mint { .. } => "mint",
            LedgerEvent::Transfer { .. } => "send",
            LedgerEvent::RewardsSettled { .. } => "rewards",
            LedgerEvent::Delegate { .. } => "delegate",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["tombstone", "jail", "mint", "send", "delegate", "mint", "send", "delegate"]
    );
}

#[test_log::test]
fn test_negative_amount_aborts_before_any_write() {
    let a = account(1);
    let chain = genesis().build();
    let before = chain.state_hash();

    let err = run(&chain, &dataset(&[(&a, "-5")]), IdentityConfig::cos()).unwrap_err();

    assert_eq!(err.class(), ErrorClass::MalformedData);
    assert_eq!(chain.state_hash(), before);
    assert!(chain.events().is_empty());
    assert!(chain.keepers().slashing.signing_info(&consensus()).unwrap().tombstoned);
}

#[test_log::test]
fn test_bad_row_after_good_rows_still_aborts_up_front() {
    let (a, b) = (account(1), account(2));
    let chain = genesis().build();

    let err = run(&chain, &dataset(&[(&a, "100"), (&b, "1e6")]), IdentityConfig::cos()).unwrap_err();

    assert!(matches!(err, RemediationError::InvalidAmount { index: 1, .. }));
    assert!(chain.events().is_empty());
}

#[test_log::test]
fn test_malformed_validator_address_aborts_before_records() {
    let chain = genesis().build();
    let identity = IdentityConfig {
        operator: "chihuahuavaloper17h628d2wtlw6844nzv0ktnq9qtm5qm3pym0k45",
        consensus: COS_CONSENSUS_ADDRESS,
    };

    // dataset is also broken; the identity is reported first
    let err = run(&chain, "not json", identity).unwrap_err();

    assert!(matches!(
        err,
        RemediationError::InvalidOperator {
            source: AddressError::InvalidChecksum,
            ..
        }
    ));
    assert!(chain.events().is_empty());
}

#[test_log::test]
fn test_unknown_validator_aborts_before_mint() {
    let a = account(1);
    let chain = GenesisBuilder::new().with_signing_info(tombstoned_info()).build();
    let supply_before = chain.total_supply(BOND_DENOM);

    let err = run(&chain, &dataset(&[(&a, "100")]), IdentityConfig::cos()).unwrap_err();

    assert!(matches!(err, RemediationError::ValidatorNotFound(_)));
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert_eq!(chain.total_supply(BOND_DENOM), supply_before);
    assert!(chain.events().is_empty());
}

#[test_log::test]
fn test_already_cleared_tombstone_is_fine() {
    let mut info = tombstoned_info();
    info.tombstoned = false;
    let chain = GenesisBuilder::new()
        .with_validator(cos_validator())
        .with_signing_info(info)
        .build();

    run(&chain, &dataset(&[(&account(1), "10")]), IdentityConfig::cos()).unwrap();
    assert_eq!(jailed_until(&chain), upgrade_ctx().block_time);
}

#[test_log::test]
fn test_existing_rewards_are_settled_before_new_stake() {
    let a = account(1);
    let chain = genesis().with_delegation(&a, &operator(), 40, 9).build();

    run(&chain, &dataset(&[(&a, "100")]), IdentityConfig::cos()).unwrap();

    let staking = chain.keepers().staking;
    assert_eq!(staking.delegated_tokens(&a, &operator()), 140);
    assert_eq!(staking.delegation(&a, &operator()).unwrap().pending_rewards, 0);
    assert_eq!(chain.balance(&a, BOND_DENOM), 9);
    assert!(chain.check_supply_invariant().is_ok());
}

#[test_log::test]
fn test_zero_amount_record_delegates_nothing() {
    let a = account(1);
    let chain = genesis().build();
    let supply_before = chain.total_supply(BOND_DENOM);

    let outcome = run(&chain, &dataset(&[(&a, "0")]), IdentityConfig::cos()).unwrap();

    assert_eq!(outcome.report.total_minted, 0);
    assert_eq!(outcome.report.records[0].shares, 0);
    assert_eq!(chain.total_supply(BOND_DENOM), supply_before);
}

#[test_log::test]
fn test_registry_applies_embedded_patch_exactly_once() {
    let chain = genesis().build();
    let supply_before = chain.total_supply(BOND_DENOM);
    let records = decode_records(COS_MINTS_JSON).unwrap();
    let mut registry = UpgradeRegistry::with_default_upgrades();

    let execution = registry.apply(UPGRADE_NAME, &upgrade_ctx(), &chain).unwrap();
    assert_eq!(execution.version, ProtocolVersion::new(3, 1, 0));
    assert_eq!(execution.outcome.report.total_minted, 19_321_295_660);
    assert_ne!(execution.pre_state_hash, execution.post_state_hash);
    assert_eq!(execution.post_state_hash, chain.state_hash());

    assert_eq!(chain.total_supply(BOND_DENOM), supply_before + 19_321_295_660);
    let staking = chain.keepers().staking;
    for record in &records {
        assert_eq!(
            staking.delegated_tokens(&record.recipient, &operator()),
            record.amount.amount
        );
        assert_eq!(chain.balance(&record.recipient, BOND_DENOM), 0);
    }
    assert!(!chain.keepers().slashing.signing_info(&consensus()).unwrap().tombstoned);

    let hash = chain.state_hash();
    assert!(matches!(
        registry.apply(UPGRADE_NAME, &upgrade_ctx(), &chain),
        Err(UpgradeError::AlreadyApplied(_))
    ));
    assert_eq!(chain.state_hash(), hash);
    assert_eq!(registry.executions().len(), 1);
}

#[test_log::test]
fn test_failed_upgrade_leaves_state_untouched() {
    // validator present, signing info missing: fails during resolution
    let chain = GenesisBuilder::new().with_validator(cos_validator()).build();
    let before = chain.state_hash();
    let mut registry = UpgradeRegistry::with_default_upgrades();

    let err = registry.apply(UPGRADE_NAME, &upgrade_ctx(), &chain).unwrap_err();

    assert!(matches!(
        err,
        UpgradeError::HandlerFailed(RemediationError::SigningInfoNotFound(_))
    ));
    assert_eq!(chain.state_hash(), before);
    assert!(!registry.is_applied(UPGRADE_NAME));
}

fn blocked_recipient_patch(
    ctx: &UpgradeContext,
    keepers: Keepers<'_>,
) -> Result<RemediationOutcome, RemediationError> {
    let pool = AccAddress::module(BONDED_POOL);
    apply(
        ctx,
        keepers,
        &dataset(&[(&account(1), "100"), (&pool, "50")]),
        IdentityConfig::cos(),
    )
}

#[test_log::test]
fn test_failure_mid_compensation_discards_earlier_records() {
    let chain = genesis().build();
    let before = chain.state_hash();
    let mut registry = UpgradeRegistry::new();
    registry
        .register(Upgrade {
            name: "blocked".to_string(),
            version: ProtocolVersion::new(3, 1, 0),
            handler: blocked_recipient_patch,
        })
        .unwrap();

    let err = registry.apply("blocked", &upgrade_ctx(), &chain).unwrap_err();

    match err {
        UpgradeError::HandlerFailed(inner) => {
            assert!(matches!(
                inner,
                RemediationError::TransferRejected {
                    index: 1,
                    source: BankError::BlockedRecipient(_),
                    ..
                }
            ));
            assert_eq!(inner.class(), ErrorClass::LedgerRejection);
        }
        other => panic!("unexpected error {other}"),
    }
    // first record and the tombstone reversal were rolled back too
    assert_eq!(chain.state_hash(), before);
    assert_eq!(chain.keepers().staking.delegated_tokens(&account(1), &operator()), 0);
    assert!(chain.keepers().slashing.signing_info(&consensus()).unwrap().tombstoned);
}

proptest! {
    #[test]
    fn supply_grows_by_exactly_the_compensated_total(
        amounts in prop::collection::vec(0u128..1_000_000_000_000, 1..8)
    ) {
        let recipients: Vec<AccAddress> = (0..amounts.len()).map(|i| account(i as u8 + 1)).collect();
        let amount_strings: Vec<String> = amounts.iter().map(u128::to_string).collect();
        let rows: Vec<(&AccAddress, &str)> = recipients
            .iter()
            .zip(amount_strings.iter())
            .map(|(r, a)| (r, a.as_str()))
            .collect();
        let chain = genesis().build();
        let supply_before = chain.total_supply(BOND_DENOM);

        let outcome = run(&chain, &dataset(&rows), IdentityConfig::cos()).unwrap();

        let total: u128 = amounts.iter().sum();
        prop_assert_eq!(outcome.report.total_minted, total);
        prop_assert_eq!(chain.total_supply(BOND_DENOM), supply_before + total);
        let staking = chain.keepers().staking;
        for (recipient, amount) in recipients.iter().zip(amounts.iter()) {
            prop_assert_eq!(staking.delegated_tokens(recipient, &operator()), *amount);
            prop_assert_eq!(chain.balance(recipient, BOND_DENOM), 0);
        }
        prop_assert!(chain.check_supply_invariant().is_ok());
        prop_assert_eq!(jailed_until(&chain), upgrade_ctx().block_time);
    }

    #[test]
    fn delegations_match_amounts_at_any_exchange_rate(
        shares in 1u128..10_000_000_000,
        kept_percent in 1u128..=100,
        amounts in prop::collection::vec(0u128..1_000_000_000_000, 1..6)
    ) {
        let recipients: Vec<AccAddress> = (0..amounts.len()).map(|i| account(i as u8 + 1)).collect();
        let amount_strings: Vec<String> = amounts.iter().map(u128::to_string).collect();
        let rows: Vec<(&AccAddress, &str)> = recipients
            .iter()
            .zip(amount_strings.iter())
            .map(|(r, a)| (r, a.as_str()))
            .collect();
        let tokens = (shares * kept_percent / 100).max(1);
        let chain = GenesisBuilder::new()
            .with_validator(slashed_validator(tokens, shares))
            .with_signing_info(tombstoned_info())
            .build();

        run(&chain, &dataset(&rows), IdentityConfig::cos()).unwrap();

        let staking = chain.keepers().staking;
        for (recipient, amount) in recipients.iter().zip(amounts.iter()) {
            prop_assert_eq!(staking.delegated_tokens(recipient, &operator()), *amount);
        }
        let total: u128 = amounts.iter().sum();
        prop_assert_eq!(staking.validator(&operator()).unwrap().tokens, tokens + total);
        prop_assert!(chain.check_supply_invariant().is_ok());
    }

    #[test]
    fn signed_amounts_never_touch_the_ledgers(amount in 1u64..u64::MAX) {
        let chain = genesis().build();
        let before = chain.state_hash();
        let negative = format!("-{amount}");

        let err = run(&chain, &dataset(&[(&account(1), negative.as_str())]), IdentityConfig::cos()).unwrap_err();

        prop_assert_eq!(err.class(), ErrorClass::MalformedData);
        prop_assert_eq!(chain.state_hash(), before);
    }
}
