//! Liquidation module for the flashliq protocol.
//!
//! This module handles capital-free liquidation of insolvent positions:
//! - Flash-liquidity pool and the lender/borrower callback interfaces
//! - Orchestrator that composes the ledger, the exchange and a flash loan

pub mod flash_pool;
pub mod orchestrator;

pub use flash_pool::*;
pub use orchestrator::*;
