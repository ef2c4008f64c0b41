//! Error types for the flashliq protocol.
//!
//! Every failure is raised at the point of violation and propagated with `?`;
//! the state machine rolls the enclosing operation back in full.

use thiserror::Error;

use crate::utils::address::Address;

/// Result type alias for flashliq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the flashliq protocol
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Ledger Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Borrow would leave the position below its collateral requirement
    #[error("Insufficient collateral: required {required}, deposited {deposited}")]
    InsufficientCollateral {
        /// Collateral required for the resulting debt
        required: u128,
        /// Collateral currently deposited
        deposited: u128,
    },

    /// Withdrawal would leave the remaining deposit below the requirement
    #[error("Too much debt: withdrawal leaves {remaining}, required {required}")]
    TooMuchDebt {
        /// Collateral required for the outstanding debt
        required: u128,
        /// Deposit remaining after the withdrawal
        remaining: u128,
    },

    /// Position is solvent and cannot be liquidated
    #[error("Account {0} is already sufficiently collateralized")]
    AlreadySufficientlyCollateralized(Address),

    // ═══════════════════════════════════════════════════════════════════
    // Exchange Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Exchange was initialized before
    #[error("Exchange already initialized")]
    AlreadyInitialized,

    /// Exchange has no reserves yet
    #[error("Exchange not initialized")]
    NotInitialized,

    /// Mint amounts are not proportional to the reserves
    #[error("Proportion mismatch: {amount0} * {reserve1} != {amount1} * {reserve0}")]
    ProportionMismatch {
        /// Offered amount of asset 0
        amount0: u128,
        /// Offered amount of asset 1
        amount1: u128,
        /// Reserve of asset 0
        reserve0: u128,
        /// Reserve of asset 1
        reserve1: u128,
    },

    /// Asset is not traded by this venue
    #[error("Unknown asset: {0}")]
    UnknownAsset(Address),

    // ═══════════════════════════════════════════════════════════════════
    // Orchestrator / Flash Loan Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Callback sender is not the pool authorized for the in-flight loan
    #[error("Unauthorized callback sender: {0}")]
    UnauthorizedMsgSender(Address),

    /// Callback initiator is not the orchestrator itself
    #[error("Unauthorized loan initiator: {0}")]
    UnauthorizedInitiator(Address),

    /// A liquidation is already awaiting its callback
    #[error("Liquidation already in progress")]
    LiquidationInProgress,

    /// Flash loan was not repaid with its fee
    #[error("Flash loan not repaid: expected {expected}, received {received}")]
    FlashLoanNotRepaid {
        /// Principal plus fee
        expected: u128,
        /// Amount actually returned to the pool
        received: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Asset / Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Asset collaborator returned `false`
    #[error("Transfer failed on asset {0}")]
    TransferFailed(Address),

    /// Price source reported a negative price
    #[error("Invalid price: {0}")]
    InvalidPrice(i128),

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    ArithmeticUnderflow {
        /// Operation that underflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Returns true if resubmitting the same operation later may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientCollateral { .. }
                | Error::TooMuchDebt { .. }
                | Error::AlreadySufficientlyCollateralized(_)
                | Error::ArithmeticUnderflow { .. }
                | Error::TransferFailed(_)
                | Error::InvalidPrice(_)
        )
    }

    /// Returns true for authorization failures on the flash-loan callback
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Error::UnauthorizedMsgSender(_) | Error::UnauthorizedInitiator(_)
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Ledger errors: 1xxx
            Error::InsufficientCollateral { .. } => 1001,
            Error::TooMuchDebt { .. } => 1002,
            Error::AlreadySufficientlyCollateralized(_) => 1003,

            // Exchange errors: 2xxx
            Error::AlreadyInitialized => 2001,
            Error::NotInitialized => 2002,
            Error::ProportionMismatch { .. } => 2003,
            Error::UnknownAsset(_) => 2004,

            // Orchestrator errors: 3xxx
            Error::UnauthorizedMsgSender(_) => 3001,
            Error::UnauthorizedInitiator(_) => 3002,
            Error::LiquidationInProgress => 3003,
            Error::FlashLoanNotRepaid { .. } => 3004,

            // Asset / oracle errors: 4xxx
            Error::TransferFailed(_) => 4001,
            Error::InvalidPrice(_) => 4002,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::ZeroAmount => 5002,
            Error::Overflow { .. } => 5003,
            Error::ArithmeticUnderflow { .. } => 5004,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,
        }
    }
}
