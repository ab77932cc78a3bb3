use huahua_ledger::{AddressError, BankError, CoinError, MintError, SlashingError, StakingError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse failure class. Every class is fatal to the remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Embedded dataset or identity failed to decode
    MalformedData,
    /// A referenced validator or signing info does not exist
    NotFound,
    /// A ledger refused an operation
    LedgerRejection,
}

#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("Compensation dataset is not valid JSON: {0}")]
    MalformedDataset(#[source] serde_json::Error),

    #[error("Record {index}: invalid recipient {address}: {source}")]
    InvalidRecipient {
        index: usize,
        address: String,
        source: AddressError,
    },

    #[error("Record {index}: invalid amount {amount:?} for {address}: {source}")]
    InvalidAmount {
        index: usize,
        address: String,
        amount: String,
        source: CoinError,
    },

    #[error("Invalid validator operator address {address}: {source}")]
    InvalidOperator { address: String, source: AddressError },

    #[error("Invalid validator consensus address {address}: {source}")]
    InvalidConsensus { address: String, source: AddressError },

    #[error("Compensation total overflows")]
    TotalOverflow,

    #[error("Validator {0} not found")]
    ValidatorNotFound(String),

    #[error("No signing info for consensus address {0}")]
    SigningInfoNotFound(String),

    #[error("Validator {operator} has consensus address {actual}, expected {expected}")]
    IdentityMismatch {
        operator: String,
        expected: String,
        actual: String,
    },

    #[error("Tombstone reversal for {consensus} rejected: {source}")]
    PenaltyRejected {
        consensus: String,
        source: SlashingError,
    },

    #[error("Record {index}: minting {amount} for {address} failed: {source}")]
    MintRejected {
        index: usize,
        address: String,
        amount: u128,
        source: MintError,
    },

    #[error("Record {index}: sending {amount} to {address} failed: {source}")]
    TransferRejected {
        index: usize,
        address: String,
        amount: u128,
        source: BankError,
    },

    #[error("Record {index}: delegating {amount} from {address} failed: {source}")]
    DelegationRejected {
        index: usize,
        address: String,
        amount: u128,
        source: StakingError,
    },
}

impl RemediationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RemediationError::MalformedDataset(_)
            | RemediationError::InvalidRecipient { .. }
            | RemediationError::InvalidAmount { .. }
            | RemediationError::InvalidOperator { .. }
            | RemediationError::InvalidConsensus { .. }
            | RemediationError::TotalOverflow => ErrorClass::MalformedData,
            RemediationError::ValidatorNotFound(_)
            | RemediationError::SigningInfoNotFound(_)
            | RemediationError::IdentityMismatch { .. } => ErrorClass::NotFound,
            RemediationError::PenaltyRejected { .. }
            | RemediationError::MintRejected { .. }
            | RemediationError::TransferRejected { .. }
            | RemediationError::DelegationRejected { .. } => ErrorClass::LedgerRejection,
        }
    }
}
