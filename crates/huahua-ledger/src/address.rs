// BECH32 ADDRESSES
// Account, validator-operator and consensus addresses of the chihuahua network.
//
// SAFETY INVARIANTS:
// 1. Decoding verifies the BIP-173 checksum before the payload is used
// 2. The human-readable prefix must match the address kind exactly
// 3. Mixed-case strings are rejected
// 4. Payloads are 1..=255 bytes (same bound as the SDK address format check)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bech32 character set (index = 5-bit value)
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// BCH generator polynomial coefficients
const GENERATOR: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];

/// Longest bech32 string accepted (SDK limit, not the BIP-173 90 chars)
pub const MAX_BECH32_LENGTH: usize = 1023;

/// Longest raw address accepted
pub const MAX_ADDRESS_BYTES: usize = 255;

const CHECKSUM_LENGTH: usize = 6;

pub const ACCOUNT_PREFIX: &str = "chihuahua";
pub const VALIDATOR_PREFIX: &str = "chihuahuavaloper";
pub const CONSENSUS_PREFIX: &str = "chihuahuavalcons";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("empty address string")]
    Empty,

    #[error("address string too long: {0} characters")]
    TooLong(usize),

    #[error("mixed-case address string")]
    MixedCase,

    #[error("missing or misplaced separator")]
    InvalidSeparator,

    #[error("invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("invalid checksum")]
    InvalidChecksum,

    #[error("invalid prefix: expected {expected}, got {got}")]
    InvalidPrefix { expected: String, got: String },

    #[error("non-zero padding in data part")]
    InvalidPadding,

    #[error("invalid address length: {0} bytes")]
    InvalidLength(usize),
}

fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &v in values {
        let top = chk >> 25;
        chk = ((chk & 0x1ff_ffff) << 5) ^ u32::from(v);
        for (i, gen) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= gen;
            }
        }
    }
    chk
}

fn hrp_expand(hrp: &str) -> Vec<u8> {
    let bytes = hrp.as_bytes();
    let mut ret = Vec::with_capacity(bytes.len() * 2 + 1);
    ret.extend(bytes.iter().map(|b| b >> 5));
    ret.push(0);
    ret.extend(bytes.iter().map(|b| b & 31));
    ret
}

fn create_checksum(hrp: &str, data: &[u8]) -> [u8; CHECKSUM_LENGTH] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0u8; CHECKSUM_LENGTH]);
    let pm = polymod(&values) ^ 1;
    let mut ret = [0u8; CHECKSUM_LENGTH];
    for (i, slot) in ret.iter_mut().enumerate() {
        *slot = ((pm >> (5 * (5 - i))) & 31) as u8;
    }
    ret
}

/// 8-bit bytes to 5-bit groups, zero padded.
fn to_base32(data: &[u8]) -> Vec<u8> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut ret = Vec::with_capacity((data.len() * 8).div_ceil(5));
    for &byte in data {
        acc = ((acc << 8) | u32::from(byte)) & 0xfff;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            ret.push(((acc >> bits) & 31) as u8);
        }
    }
    if bits > 0 {
        ret.push(((acc << (5 - bits)) & 31) as u8);
    }
    ret
}

/// 5-bit groups back to bytes. Leftover bits must be zero padding.
fn from_base32(data: &[u8]) -> Result<Vec<u8>, AddressError> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut ret = Vec::with_capacity(data.len() * 5 / 8);
    for &group in data {
        acc = ((acc << 5) | u32::from(group)) & 0xfff;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            ret.push(((acc >> bits) & 0xff) as u8);
        }
    }
    if bits >= 5 || (acc << (8 - bits)) & 0xff != 0 {
        return Err(AddressError::InvalidPadding);
    }
    Ok(ret)
}

fn verify_address_format(bytes: &[u8]) -> Result<(), AddressError> {
    if bytes.is_empty() || bytes.len() > MAX_ADDRESS_BYTES {
        return Err(AddressError::InvalidLength(bytes.len()));
    }
    Ok(())
}

/// Encode raw address bytes under `hrp`.
pub fn encode(hrp: &str, payload: &[u8]) -> String {
    let data = to_base32(payload);
    let checksum = create_checksum(hrp, &data);
    let mut out = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LENGTH);
    out.push_str(hrp);
    out.push('1');
    for &d in data.iter().chain(checksum.iter()) {
        out.push(CHARSET[usize::from(d)] as char);
    }
    out
}

/// Decode a bech32 string whose prefix must be exactly `expected_hrp`.
pub fn decode(expected_hrp: &str, address: &str) -> Result<Vec<u8>, AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }
    if address.len() > MAX_BECH32_LENGTH {
        return Err(AddressError::TooLong(address.len()));
    }
    let has_lower = address.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = address.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(AddressError::MixedCase);
    }

    let lower = address.to_ascii_lowercase();
    let sep = lower.rfind('1').ok_or(AddressError::InvalidSeparator)?;
    if sep == 0 || sep + 1 + CHECKSUM_LENGTH > lower.len() {
        return Err(AddressError::InvalidSeparator);
    }

    let (hrp, rest) = lower.split_at(sep);
    if let Some(c) = hrp.chars().find(|c| !(33..=126).contains(&(*c as u32))) {
        return Err(AddressError::InvalidCharacter(c));
    }
    if hrp != expected_hrp {
        return Err(AddressError::InvalidPrefix {
            expected: expected_hrp.to_string(),
            got: hrp.to_string(),
        });
    }

    let mut data = Vec::with_capacity(rest.len() - 1);
    for c in rest.chars().skip(1) {
        let pos = CHARSET
            .iter()
            .position(|&x| char::from(x) == c)
            .ok_or(AddressError::InvalidCharacter(c))?;
        data.push(pos as u8);
    }

    let mut values = hrp_expand(hrp);
    values.extend_from_slice(&data);
    if polymod(&values) != 1 {
        return Err(AddressError::InvalidChecksum);
    }

    data.truncate(data.len() - CHECKSUM_LENGTH);
    let bytes = from_base32(&data)?;
    verify_address_format(&bytes)?;
    Ok(bytes)
}

macro_rules! bech32_address {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Human-readable prefix of this address kind
            pub const PREFIX: &'static str = $prefix;

            pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, AddressError> {
                let bytes = bytes.into();
                verify_address_format(&bytes)?;
                Ok(Self(bytes))
            }

            pub fn from_bech32(address: &str) -> Result<Self, AddressError> {
                decode(Self::PREFIX, address).map(Self)
            }

            pub fn to_bech32(&self) -> String {
                encode(Self::PREFIX, &self.0)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_bech32())
            }
        }

        impl FromStr for $name {
            type Err = AddressError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_bech32(s)
            }
        }
    };
}

bech32_address!(
    /// Account address (`chihuahua1…`)
    AccAddress,
    ACCOUNT_PREFIX
);

bech32_address!(
    /// Validator operator address (`chihuahuavaloper1…`)
    ValAddress,
    VALIDATOR_PREFIX
);

bech32_address!(
    /// Validator consensus address (`chihuahuavalcons1…`)
    ConsAddress,
    CONSENSUS_PREFIX
);

impl AccAddress {
    /// Address of a module account: first 20 bytes of SHA-256(name).
    pub fn module(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        AccAddress(digest[..20].to_vec())
    }
}
