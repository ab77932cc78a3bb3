// BANK LEDGER
// Spendable balances and module-to-account sends.
//
// SAFETY INVARIANTS:
// 1. A send either moves every coin or nothing
// 2. Module accounts never receive module-to-account sends
// 3. Sends never change total supply

use crate::address::AccAddress;
use crate::coin::Coins;
use crate::store::{is_module_account, LedgerEvent, SharedState, MODULE_ACCOUNTS};
use log::debug;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("unknown module account {0}")]
    UnknownModule(String),

    #[error("{0} is a module account and cannot receive funds")]
    BlockedRecipient(String),

    #[error("insufficient funds on {address}: need {needed}{denom}, have {available}{denom}")]
    InsufficientFunds {
        address: String,
        denom: String,
        needed: u128,
        available: u128,
    },

    #[error("balance overflow on {address} for {denom}")]
    BalanceOverflow { address: String, denom: String },
}

/// Balance-transfer ledger.
pub trait BankKeeper {
    fn balance(&self, address: &AccAddress, denom: &str) -> u128;

    /// Move `coins` out of module account `module` into `recipient`.
    fn send_coins_from_module_to_account(
        &mut self,
        module: &str,
        recipient: &AccAddress,
        coins: &Coins,
    ) -> Result<(), BankError>;
}

/// Bank keeper over a shared `ChainState`.
#[derive(Debug, Clone)]
pub struct MemoryBank {
    state: SharedState,
}

impl MemoryBank {
    pub(crate) fn new(state: SharedState) -> Self {
        MemoryBank { state }
    }
}

impl BankKeeper for MemoryBank {
    fn balance(&self, address: &AccAddress, denom: &str) -> u128 {
        self.state.read().balance(address, denom)
    }

    fn send_coins_from_module_to_account(
        &mut self,
        module: &str,
        recipient: &AccAddress,
        coins: &Coins,
    ) -> Result<(), BankError> {
        if !MODULE_ACCOUNTS.contains(&module) {
            return Err(BankError::UnknownModule(module.to_string()));
        }
        if is_module_account(recipient) {
            return Err(BankError::BlockedRecipient(recipient.to_string()));
        }

        let from = AccAddress::module(module);
        let mut state = self.state.write();
        state.transfer(&from, recipient, coins)?;
        state.record(LedgerEvent::Transfer {
            from,
            to: recipient.clone(),
            coins: coins.clone(),
        });
        debug!("Sent {} from module {} to {}", coins, module, recipient);
        Ok(())
    }
}
