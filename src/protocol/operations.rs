//! Protocol operations - atomic state changes.
//!
//! Operations represent discrete actions that can be executed atomically
//! on the protocol state. Every entry point of the ledger, the exchange and
//! the orchestrator has a variant here, plus host-level setup (faucet mints,
//! allowances, price updates) used by the simulator and tests.

use serde::{Deserialize, Serialize};

use crate::core::config::Deployment;
use crate::utils::address::Address;
use crate::utils::math::U256;

// ═══════════════════════════════════════════════════════════════════════════════
// OPERAND TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// One of the two deployed assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    /// Borrowable asset
    Borrow,
    /// Collateral asset
    Collateral,
}

impl AssetKind {
    /// Resolve to the deployed asset address
    pub fn resolve(&self, deployment: &Deployment) -> Address {
        match self {
            Self::Borrow => deployment.borrow_asset,
            Self::Collateral => deployment.collateral_asset,
        }
    }
}

/// Allowance recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Spender {
    Ledger,
    Exchange,
    Account(Address),
}

impl Spender {
    /// Resolve to an address
    pub fn resolve(&self, deployment: &Deployment) -> Address {
        match self {
            Self::Ledger => deployment.ledger,
            Self::Exchange => deployment.exchange,
            Self::Account(address) => *address,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// All possible protocol operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolOperation {
    // Ledger
    /// Deposit collateral
    Deposit { caller: Address, amount: u128 },
    /// Borrow against collateral
    Borrow { caller: Address, amount: u128 },
    /// Repay debt
    Repay { caller: Address, amount: u128 },
    /// Withdraw collateral
    Withdraw { caller: Address, amount: u128 },
    /// Liquidate an insolvent position with the caller's own funds
    Liquidate { caller: Address, user: Address },

    // Exchange
    /// Seed the exchange
    Initialize {
        caller: Address,
        amount0: u128,
        amount1: u128,
    },
    /// Add proportional liquidity
    Mint {
        caller: Address,
        amount0: u128,
        amount1: u128,
    },
    /// Remove liquidity (`shares` is a `0x` hex string in JSON)
    Burn { caller: Address, shares: U256 },
    /// Sell asset 0 (collateral)
    Sell0 { caller: Address, amount: u128 },
    /// Sell asset 1 (borrowable)
    Sell1 { caller: Address, amount: u128 },

    // Orchestrator
    /// Flash-loan funded liquidation
    ArbitrageLiquidate { caller: Address, user: Address },
    /// Completion callback invoked directly by `caller`
    OnLoanReceived {
        caller: Address,
        initiator: Address,
        amount: u128,
        #[serde(default)]
        data: Vec<u8>,
    },

    // Host setup
    /// Mint test funds
    Faucet {
        asset: AssetKind,
        to: Address,
        amount: u128,
    },
    /// Set an allowance
    Approve {
        owner: Address,
        asset: AssetKind,
        spender: Spender,
        amount: u128,
    },
    /// Publish a new price
    SetPrice { price: i128 },
}

impl ProtocolOperation {
    /// Get the operation type name
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "Deposit",
            Self::Borrow { .. } => "Borrow",
            Self::Repay { .. } => "Repay",
            Self::Withdraw { .. } => "Withdraw",
            Self::Liquidate { .. } => "Liquidate",
            Self::Initialize { .. } => "Initialize",
            Self::Mint { .. } => "Mint",
            Self::Burn { .. } => "Burn",
            Self::Sell0 { .. } => "Sell0",
            Self::Sell1 { .. } => "Sell1",
            Self::ArbitrageLiquidate { .. } => "ArbitrageLiquidate",
            Self::OnLoanReceived { .. } => "OnLoanReceived",
            Self::Faucet { .. } => "Faucet",
            Self::Approve { .. } => "Approve",
            Self::SetPrice { .. } => "SetPrice",
        }
    }

    /// Account on whose behalf the operation runs, if any
    pub fn caller(&self) -> Option<&Address> {
        match self {
            Self::Deposit { caller, .. }
            | Self::Borrow { caller, .. }
            | Self::Repay { caller, .. }
            | Self::Withdraw { caller, .. }
            | Self::Liquidate { caller, .. }
            | Self::Initialize { caller, .. }
            | Self::Mint { caller, .. }
            | Self::Burn { caller, .. }
            | Self::Sell0 { caller, .. }
            | Self::Sell1 { caller, .. }
            | Self::ArbitrageLiquidate { caller, .. }
            | Self::OnLoanReceived { caller, .. } => Some(caller),
            Self::Approve { owner, .. } => Some(owner),
            Self::Faucet { .. } | Self::SetPrice { .. } => None,
        }
    }

    /// Whether this is a host setup operation rather than a protocol entry point
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::Faucet { .. } | Self::Approve { .. } | Self::SetPrice { .. })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a committed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    /// Nothing beyond the state change
    Done,
    /// Collateral received by a direct liquidator
    Seized { collateral: u128 },
    /// Pool shares minted
    Shares { shares: U256 },
    /// Assets paid out by a burn
    Withdrawn { amount0: u128, amount1: u128 },
    /// Output of a swap
    Swapped { amount_out: u128 },
    /// Profit paid by an arbitrage liquidation
    Profit { profit: u128 },
}
