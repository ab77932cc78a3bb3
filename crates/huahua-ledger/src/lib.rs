/// CHIHUAHUA LEDGER ABSTRACTIONS
///
/// Keeper interfaces for the four ledgers an upgrade handler touches,
/// plus an in-memory chain implementing all of them:
/// - Mint: supply expansion into the mint module
/// - Bank: module-to-account sends
/// - Staking: validators, delegations and shares
/// - Slashing: signing info, tombstone and jail time
///
/// Addresses are Bech32 (`chihuahua`, `chihuahuavaloper`, `chihuahuavalcons`)
/// and every amount is an unsigned 128-bit integer of `uhuahua`.

pub mod address;
pub mod bank;
pub mod coin;
pub mod genesis;
pub mod mint;
pub mod slashing;
pub mod staking;
pub mod store;

pub use address::{AccAddress, AddressError, ConsAddress, ValAddress};
pub use bank::{BankError, BankKeeper, MemoryBank};
pub use coin::{Coin, CoinError, Coins, BOND_DENOM};
pub use genesis::GenesisBuilder;
pub use mint::{MemoryMint, MintError, MintKeeper};
pub use slashing::{MemorySlashing, SlashingError, SlashingKeeper, ValidatorSigningInfo};
pub use staking::{BondStatus, Delegation, MemoryStaking, StakingError, StakingKeeper, Validator, SHARE_PRECISION};
pub use store::{
    CacheContext, ChainState, InvariantError, LedgerEvent, MemoryChain, MemoryKeepers, BONDED_POOL,
    DISTRIBUTION_MODULE, MINT_MODULE, NOT_BONDED_POOL,
};
