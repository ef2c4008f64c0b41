//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

/// Default loan-to-value ratio - 66%
pub const DEFAULT_LTV_BPS: u64 = 6_600;

/// Maximum loan-to-value ratio - 100%
pub const MAX_LTV_BPS: u64 = BPS_DIVISOR;

/// Largest decimal count the scaler accepts (10^38 is the largest power of ten in u128)
pub const MAX_DECIMALS: u8 = 38;

// ═══════════════════════════════════════════════════════════════════════════════
// FLASH LOAN CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Flash fee numerator (fee = floor(amount * 3 / 997) + 1)
pub const FLASH_FEE_NUMERATOR: u128 = 3;

/// Flash fee denominator
pub const FLASH_FEE_DENOMINATOR: u128 = 997;

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Decimals of the default borrowable asset (USD stablecoin)
pub const DEFAULT_BORROW_DECIMALS: u8 = 6;

/// Decimals of the default collateral asset (wrapped ether)
pub const DEFAULT_COLLATERAL_DECIMALS: u8 = 18;

/// Decimals of the default price feed
pub const DEFAULT_PRICE_DECIMALS: u8 = 18;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIER CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of an address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// Maximum events kept in a log before the oldest are dropped
pub const MAX_EVENT_LOG: usize = 10_000;
