// COIN AMOUNTS
// Integer token quantities in a named denomination.
//
// SAFETY INVARIANTS:
// 1. Amounts are unsigned; a leading sign is never accepted
// 2. Parsing is exact: ASCII digits only, overflow is an error
// 3. `Coins` never holds a zero coin or two coins of the same denom

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Base denomination of the chihuahua network (1 HUAHUA = 10^6 uhuahua)
pub const BOND_DENOM: &str = "uhuahua";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoinError {
    #[error("empty amount")]
    EmptyAmount,

    #[error("negative amount {0:?}")]
    NegativeAmount(String),

    #[error("non-numeric amount {0:?}")]
    NotNumeric(String),

    #[error("amount {0:?} does not fit in 128 bits")]
    Overflow(String),

    #[error("invalid denom {0:?}")]
    InvalidDenom(String),

    #[error("duplicate denom {0}")]
    DuplicateDenom(String),
}

/// Parse a decimal integer amount such as `"1500000"`.
pub fn parse_amount(raw: &str) -> Result<u128, CoinError> {
    if raw.is_empty() {
        return Err(CoinError::EmptyAmount);
    }
    if let Some(rest) = raw.strip_prefix('-') {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoinError::NegativeAmount(raw.to_string()));
        }
        return Err(CoinError::NotNumeric(raw.to_string()));
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoinError::NotNumeric(raw.to_string()));
    }
    raw.parse::<u128>()
        .map_err(|_| CoinError::Overflow(raw.to_string()))
}

/// Denoms: a letter, then 2..=127 of `[a-zA-Z0-9/:._-]`.
pub fn validate_denom(denom: &str) -> Result<(), CoinError> {
    let bytes = denom.as_bytes();
    let well_formed = (3..=128).contains(&bytes.len())
        && bytes[0].is_ascii_alphabetic()
        && bytes[1..]
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b':' | b'.' | b'_' | b'-'));
    if well_formed {
        Ok(())
    } else {
        Err(CoinError::InvalidDenom(denom.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: &str, amount: u128) -> Result<Self, CoinError> {
        validate_denom(denom)?;
        Ok(Coin {
            denom: denom.to_string(),
            amount,
        })
    }

    /// Build a coin from a decimal amount string.
    pub fn parse(denom: &str, amount: &str) -> Result<Self, CoinError> {
        Coin::new(denom, parse_amount(amount)?)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Sorted set of non-zero coins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coins(Vec<Coin>);

impl Coins {
    pub fn new(mut coins: Vec<Coin>) -> Result<Self, CoinError> {
        coins.retain(|c| !c.is_zero());
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));
        if let Some(pair) = coins.windows(2).find(|w| w[0].denom == w[1].denom) {
            return Err(CoinError::DuplicateDenom(pair[0].denom.clone()));
        }
        Ok(Coins(coins))
    }

    /// A zero coin yields the empty set.
    pub fn from_coin(coin: Coin) -> Self {
        if coin.is_zero() {
            Coins(Vec::new())
        } else {
            Coins(vec![coin])
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount)
            .unwrap_or(0)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}
