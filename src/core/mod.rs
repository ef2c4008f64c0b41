//! Core modules for the flashliq protocol.
//!
//! This module contains the fundamental building blocks:
//! - Configuration and protocol parameters
//! - Fungible asset ledgers and the asset registry
//! - The collateral ledger (deposits, debt, liquidation)
//! - The constant-product exchange

pub mod config;
pub mod exchange;
pub mod ledger;
pub mod token;

pub use config::*;
pub use exchange::*;
pub use ledger::*;
pub use token::*;
