//! # flashliq
//!
//! A collateralized-lending and liquidation pipeline built from three
//! coupled primitives:
//!
//! - **Collateral ledger**: per-account deposits and debt, enforcing a
//!   loan-to-value solvency invariant against an external price feed
//! - **Constant-product exchange**: a two-asset pool whose reserve product
//!   never decreases across swaps
//! - **Liquidation orchestrator**: flash-borrows a position's debt, repays
//!   it through the ledger, sells the seized collateral on the exchange and
//!   keeps the spread, all in one atomic operation
//!
//! ## Architecture
//!
//! - **Core**: asset ledgers, the collateral ledger and the exchange
//! - **Oracle**: the price source interface and a mutable feed
//! - **Liquidation**: flash-liquidity pool and the orchestrator
//! - **Protocol**: operations, events and the transactional state machine
//!
//! ## Example
//!
//! ```rust,ignore
//! use flashliq::prelude::*;
//!
//! let mut sm = ProtocolStateMachine::new(ProtocolParams::default(), Deployment::default(), price)?;
//! sm.execute(ProtocolOperation::Deposit { caller: alice, amount })?;
//! let preview = sm.preview_liquidation(&alice)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod liquidation;
pub mod oracle;
pub mod protocol;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::{Deployment, ProtocolParams},
        exchange::ConstantProductExchange,
        ledger::{CollateralLedger, Position, PositionHealth},
        token::{Asset, AssetRegistry, TokenLedger},
    };
    pub use crate::error::{Error, Result};
    pub use crate::liquidation::{
        flash_pool::{FlashBorrower, FlashLender, FlashPool},
        orchestrator::{LiquidationOrchestrator, LiquidationPreview, OrchestratorState},
    };
    pub use crate::oracle::{PriceData, PriceFeed, PriceSource};
    pub use crate::protocol::{
        events::{EventLog, ProtocolEvent},
        operations::{AssetKind, OperationResult, ProtocolOperation, Spender},
        state_machine::{ProtocolState, ProtocolStateMachine},
    };
    pub use crate::utils::address::Address;
}

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name
pub const PROTOCOL_NAME: &str = "flashliq";
