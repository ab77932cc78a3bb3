// UPGRADE REGISTRY
// Named upgrade handlers, applied inside a cache branch of the chain.
//
// SAFETY INVARIANTS:
// 1. Upgrade names are unique
// 2. An upgrade runs at most once per registry
// 3. State is committed only when the handler succeeds and supply still balances
// 4. A failed upgrade leaves the state hash unchanged

use crate::cos_patch::{apply_cos_patch, Keepers, RemediationOutcome, UpgradeContext};
use crate::error::RemediationError;
use huahua_ledger::{InvariantError, MemoryChain, MemoryKeepers};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name under which the COS patch is registered
pub const UPGRADE_NAME: &str = "v3.1.0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid version format: {0}")]
    InvalidFormat(String),
}

/// Semantic version tag (`v3.1.0`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        ProtocolVersion { major, minor, patch }
    }

    /// Accepts `3.1.0` and `v3.1.0`.
    pub fn parse(tag: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidFormat(tag.to_string());
        let bare = tag.strip_prefix('v').unwrap_or(tag);
        let parts: Vec<&str> = bare.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let number = |s: &str| -> Result<u32, VersionError> {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            s.parse().map_err(|_| invalid())
        };
        Ok(ProtocolVersion {
            major: number(parts[0])?,
            minor: number(parts[1])?,
            patch: number(parts[2])?,
        })
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ProtocolVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProtocolVersion::parse(s)
    }
}

pub type UpgradeHandler = fn(&UpgradeContext, Keepers<'_>) -> Result<RemediationOutcome, RemediationError>;

#[derive(Clone)]
pub struct Upgrade {
    pub name: String,
    pub version: ProtocolVersion,
    pub handler: UpgradeHandler,
}

impl fmt::Debug for Upgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upgrade")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// The v3.1.0 upgrade: COS tombstone reversal and lost-token compensation.
pub fn v3_1_0() -> Upgrade {
    Upgrade {
        name: UPGRADE_NAME.to_string(),
        version: ProtocolVersion::new(3, 1, 0),
        handler: apply_cos_patch,
    }
}

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("Unknown upgrade {0}")]
    UnknownUpgrade(String),

    #[error("Upgrade {0} is already registered")]
    DuplicateUpgrade(String),

    #[error("Upgrade {0} has already been applied")]
    AlreadyApplied(String),

    #[error("Upgrade handler failed: {0}")]
    HandlerFailed(#[from] RemediationError),

    #[error("Upgrade broke the supply invariant: {0}")]
    InvariantBroken(#[from] InvariantError),
}

/// Upgrade execution record
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeExecution {
    pub name: String,
    pub version: ProtocolVersion,
    pub context: UpgradeContext,

    /// State hash before the upgrade
    pub pre_state_hash: String,

    /// State hash after commit
    pub post_state_hash: String,

    pub outcome: RemediationOutcome,
}

#[derive(Debug, Default)]
pub struct UpgradeRegistry {
    upgrades: BTreeMap<String, Upgrade>,
    executed: Vec<UpgradeExecution>,
}

impl UpgradeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every upgrade this crate ships.
    pub fn with_default_upgrades() -> Self {
        let mut registry = UpgradeRegistry::new();
        registry.upgrades.insert(UPGRADE_NAME.to_string(), v3_1_0());
        registry
    }

    pub fn register(&mut self, upgrade: Upgrade) -> Result<(), UpgradeError> {
        if self.upgrades.contains_key(&upgrade.name) {
            return Err(UpgradeError::DuplicateUpgrade(upgrade.name));
        }
        self.upgrades.insert(upgrade.name.clone(), upgrade);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Upgrade> {
        self.upgrades.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.upgrades.keys().map(String::as_str)
    }

    pub fn is_applied(&self, name: &str) -> bool {
        self.executed.iter().any(|e| e.name == name)
    }

    /// Run upgrade `name` against `chain`. All mutations are discarded on failure.
    pub fn apply(
        &mut self,
        name: &str,
        ctx: &UpgradeContext,
        chain: &MemoryChain,
    ) -> Result<&UpgradeExecution, UpgradeError> {
        if self.is_applied(name) {
            return Err(UpgradeError::AlreadyApplied(name.to_string()));
        }
        let upgrade = self
            .upgrades
            .get(name)
            .ok_or_else(|| UpgradeError::UnknownUpgrade(name.to_string()))?;

        let pre_state_hash = chain.state_hash();
        let cache = chain.cache_context();
        let MemoryKeepers {
            mut mint,
            mut bank,
            mut staking,
            mut slashing,
        } = cache.chain().keepers();
        let keepers = Keepers {
            mint: &mut mint,
            bank: &mut bank,
            staking: &mut staking,
            slashing: &mut slashing,
        };

        let outcome = match (upgrade.handler)(ctx, keepers) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Upgrade {} failed at height {}: {} ({:?})", name, ctx.height, e, e.class());
                return Err(e.into());
            }
        };
        if let Err(e) = cache.chain().check_supply_invariant() {
            error!("Upgrade {} rejected: {}", name, e);
            return Err(e.into());
        }

        let post_state_hash = cache.chain().state_hash();
        cache.write();
        info!(
            "Upgrade {} ({}) applied at height {}: {} -> {}",
            name, upgrade.version, ctx.height, pre_state_hash, post_state_hash
        );

        self.executed.push(UpgradeExecution {
            name: upgrade.name.clone(),
            version: upgrade.version,
            context: *ctx,
            pre_state_hash,
            post_state_hash,
            outcome,
        });
        let latest = self.executed.len() - 1;
        Ok(&self.executed[latest])
    }

    pub fn executions(&self) -> &[UpgradeExecution] {
        &self.executed
    }
}
