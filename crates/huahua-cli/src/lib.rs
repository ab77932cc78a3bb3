//! Operator tooling for the chihuahua v3.1.0 upgrade.

pub mod settings;
pub mod simulation;

pub use settings::{OutputFormat, Settings};
pub use simulation::{parse_block_time, seed_chain, simulate, RecipientDelegation, SimulationReport};
