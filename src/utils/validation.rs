//! Input validation utilities for flashliq.
//!
//! This module provides validation functions to ensure inputs meet
//! protocol requirements before processing.

use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::constants::*;

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: u128) -> Result<()> {
    if amount == 0 {
        return Err(Error::ZeroAmount);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a loan-to-value ratio: `0 < ltv_bps <= 10000`
pub fn validate_ltv(ltv_bps: u64) -> Result<()> {
    if ltv_bps == 0 || ltv_bps > MAX_LTV_BPS {
        return Err(Error::InvalidParameter {
            name: "ltv_bps".into(),
            reason: format!("must be in (0, {}], got {}", MAX_LTV_BPS, ltv_bps),
        });
    }
    Ok(())
}

/// Validate an asset or price precision
pub fn validate_decimals(decimals: u8, name: &str) -> Result<()> {
    if decimals > MAX_DECIMALS {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} decimals exceeds maximum {}", decimals, MAX_DECIMALS),
        });
    }
    Ok(())
}

/// Validate that a price is non-negative and return it unsigned
pub fn validate_price(price: i128) -> Result<u128> {
    u128::try_from(price).map_err(|_| Error::InvalidPrice(price))
}

/// Validate that two venue assets differ
pub fn validate_asset_pair(token0: &Address, token1: &Address) -> Result<()> {
    if token0 == token1 {
        return Err(Error::InvalidParameter {
            name: "asset_pair".into(),
            reason: format!("both sides are {}", token0),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_non_zero() {
        assert!(validate_non_zero(1).is_ok());
        assert_eq!(validate_non_zero(0), Err(Error::ZeroAmount));
    }

    #[test]
    fn test_validate_ltv() {
        assert!(validate_ltv(1).is_ok());
        assert!(validate_ltv(DEFAULT_LTV_BPS).is_ok());
        assert!(validate_ltv(MAX_LTV_BPS).is_ok());
        assert!(validate_ltv(0).is_err());
        assert!(validate_ltv(MAX_LTV_BPS + 1).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert_eq!(validate_price(0).unwrap(), 0);
        assert_eq!(validate_price(2000).unwrap(), 2000);
        assert_eq!(validate_price(-1), Err(Error::InvalidPrice(-1)));
    }

    #[test]
    fn test_validate_asset_pair() {
        let a = Address::from_label("a");
        let b = Address::from_label("b");
        assert!(validate_asset_pair(&a, &b).is_ok());
        assert!(validate_asset_pair(&a, &a).is_err());
    }
}
