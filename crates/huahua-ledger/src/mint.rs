// MINT LEDGER
// Supply expansion into the mint module account.
//
// SAFETY INVARIANTS:
// 1. Minting increases total supply by exactly the minted amount
// 2. Minted coins land in the mint module account and nowhere else
// 3. Supply overflow rejects the whole mint

use crate::address::AccAddress;
use crate::coin::Coins;
use crate::store::{LedgerEvent, SharedState, MINT_MODULE};
use log::debug;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MintError {
    #[error("supply of {0} would overflow")]
    SupplyOverflow(String),
}

/// Supply/minting ledger.
pub trait MintKeeper {
    /// Create `coins` in the mint module account.
    fn mint_coins(&mut self, coins: &Coins) -> Result<(), MintError>;
}

#[derive(Debug, Clone)]
pub struct MemoryMint {
    state: SharedState,
}

impl MemoryMint {
    pub(crate) fn new(state: SharedState) -> Self {
        MemoryMint { state }
    }
}

impl MintKeeper for MemoryMint {
    fn mint_coins(&mut self, coins: &Coins) -> Result<(), MintError> {
        if coins.is_empty() {
            return Ok(());
        }

        let module = AccAddress::module(MINT_MODULE);
        let mut state = self.state.write();

        for coin in coins.iter() {
            let supply_ok = state.total_supply(&coin.denom).checked_add(coin.amount).is_some();
            let balance_ok = state.balance(&module, &coin.denom).checked_add(coin.amount).is_some();
            if !supply_ok || !balance_ok {
                return Err(MintError::SupplyOverflow(coin.denom.clone()));
            }
        }

        for coin in coins.iter() {
            let supply = state.supply.entry(coin.denom.clone()).or_insert(0);
            *supply += coin.amount;
            state
                .credit(&module, &coin.denom, coin.amount)
                .map_err(|_| MintError::SupplyOverflow(coin.denom.clone()))?;
        }
        state.record(LedgerEvent::Mint {
            coins: coins.clone(),
        });
        debug!("Minted {}", coins);
        Ok(())
    }
}
