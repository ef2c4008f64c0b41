//! Fixed-point arithmetic and mathematical utilities.
//!
//! All amounts are `u128` integers in an asset's native precision. Products
//! of two amounts are taken in 256 bits and only the final quotient must fit
//! back into `u128`. Every operation here is checked: overflow surfaces as
//! [`Error::Overflow`] and underflow as [`Error::ArithmeticUnderflow`], never
//! as a wrap or a panic.

pub use primitive_types::U256;

use crate::error::{Error, Result};
use crate::utils::constants::{FLASH_FEE_DENOMINATOR, FLASH_FEE_NUMERATOR, MAX_DECIMALS};

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(Error::ArithmeticUnderflow {
        operation: format!("{} - {}", a, b),
    })
}

/// Safe multiplication with overflow check
pub fn safe_mul(a: u128, b: u128) -> Result<u128> {
    a.checked_mul(b).ok_or(Error::Overflow {
        operation: format!("{} * {}", a, b),
    })
}

/// Safe division with zero check
pub fn safe_div(a: u128, b: u128) -> Result<u128> {
    if b == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    Ok(a / b)
}

/// Division rounding toward positive infinity
pub fn ceil_div(a: u128, b: u128) -> Result<u128> {
    let quotient = safe_div(a, b)?;
    if a % b == 0 {
        Ok(quotient)
    } else {
        Ok(quotient + 1)
    }
}

/// Computes `floor(a * b / c)` with a 256-bit intermediate
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    let quotient = wide_div(wide_mul(a, b), U256::from(c))?;
    narrow(quotient, || format!("{} * {} / {}", a, b, c))
}

/// Computes `ceil(a * b / c)` with a 256-bit intermediate
pub fn mul_div_up(a: u128, b: u128, c: u128) -> Result<u128> {
    let product = wide_mul(a, b);
    let divisor = U256::from(c);
    let mut quotient = wide_div(product, divisor)?;
    if !(product % divisor).is_zero() {
        // quotient < product, so this cannot wrap
        quotient += U256::one();
    }
    narrow(quotient, || format!("ceil({} * {} / {})", a, b, c))
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIDE ARITHMETIC
// ═══════════════════════════════════════════════════════════════════════════════

/// Exact product of two amounts; never overflows 256 bits
pub fn wide_mul(a: u128, b: u128) -> U256 {
    U256::from(a) * U256::from(b)
}

/// Checked 256-bit addition
pub fn wide_add(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Checked 256-bit subtraction
pub fn wide_sub(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(Error::ArithmeticUnderflow {
        operation: format!("{} - {}", a, b),
    })
}

/// Checked 256-bit multiplication
pub fn wide_checked_mul(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b).ok_or(Error::Overflow {
        operation: format!("{} * {}", a, b),
    })
}

/// `floor(numerator / denominator)` in 256 bits
pub fn wide_div(numerator: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    Ok(numerator / denominator)
}

/// Convert back to `u128`, failing with `Overflow` when the value does not fit
pub fn narrow<F: FnOnce() -> String>(value: U256, operation: F) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(Error::Overflow {
            operation: operation(),
        });
    }
    Ok(value.as_u128())
}

/// `10^exponent` as u128
pub fn pow10(exponent: u8) -> Result<u128> {
    if exponent > MAX_DECIMALS {
        return Err(Error::Overflow {
            operation: format!("10^{}", exponent),
        });
    }
    10u128.checked_pow(exponent as u32).ok_or(Error::Overflow {
        operation: format!("10^{}", exponent),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECIMAL SCALER
// ═══════════════════════════════════════════════════════════════════════════════

/// Convert `amount` from `from_decimals` precision to `to_decimals` precision.
///
/// Scaling up multiplies by `10^(to - from)`. Scaling down divides by
/// `10^(from - to)` and truncates, so only up-then-down round trips are exact.
pub fn scale_decimals(amount: u128, from_decimals: u8, to_decimals: u8) -> Result<u128> {
    if to_decimals >= from_decimals {
        safe_mul(amount, pow10(to_decimals - from_decimals)?)
    } else {
        safe_div(amount, pow10(from_decimals - to_decimals)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEE CALCULATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Flash-loan fee: `floor(3 * amount / 997) + 1`.
///
/// The `+ 1` covers the truncation so the lender is never underpaid.
pub fn flash_fee(amount: u128) -> Result<u128> {
    safe_add(mul_div(amount, FLASH_FEE_NUMERATOR, FLASH_FEE_DENOMINATOR)?, 1)
}

/// Principal plus flash fee
pub fn flash_repayment(amount: u128) -> Result<u128> {
    safe_add(amount, flash_fee(amount)?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANT PRODUCT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output of a constant-product swap: `amount_in * reserve_out / (reserve_in + amount_in)`
pub fn constant_product_out(amount_in: u128, reserve_in: u128, reserve_out: u128) -> Result<u128> {
    let denominator = safe_add(reserve_in, amount_in)?;
    mul_div(amount_in, reserve_out, denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_arithmetic() {
        assert!(safe_add(1, 2).is_ok());
        assert!(safe_add(u128::MAX, 1).is_err());

        assert!(safe_sub(5, 3).is_ok());
        assert!(matches!(
            safe_sub(3, 5),
            Err(Error::ArithmeticUnderflow { .. })
        ));

        assert!(safe_mul(100, 200).is_ok());
        assert!(safe_mul(u128::MAX, 2).is_err());

        assert!(safe_div(100, 10).is_ok());
        assert!(safe_div(100, 0).is_err());
    }

    #[test]
    fn test_ceil_div() {
        assert_eq!(ceil_div(10, 5).unwrap(), 2);
        assert_eq!(ceil_div(11, 5).unwrap(), 3);
        assert_eq!(ceil_div(0, 5).unwrap(), 0);
        assert!(ceil_div(1, 0).is_err());
    }

    #[test]
    fn test_mul_div_rounding() {
        assert_eq!(mul_div(10, 1, 6).unwrap(), 1);
        assert_eq!(mul_div_up(10, 1, 6).unwrap(), 2);
        assert_eq!(mul_div_up(12, 1, 6).unwrap(), 2);
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        const WAD: u128 = 1_000_000_000_000_000_000;
        // 1M units at 18 decimals times a 18-decimal price exceeds u128
        assert_eq!(
            mul_div_up(1_000_000 * WAD, WAD / 2000, WAD).unwrap(),
            500 * WAD
        );
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX).unwrap(), u128::MAX);
        assert!(matches!(mul_div(u128::MAX, 2, 1), Err(Error::Overflow { .. })));
        assert!(mul_div_up(1, 1, 0).is_err());
    }

    #[test]
    fn test_wide_mul() {
        assert_eq!(wide_mul(u128::MAX, 2), U256::from(u128::MAX) * U256::from(2u8));
        assert_eq!(narrow(wide_mul(3, 4), String::new).unwrap(), 12);
        assert!(narrow(wide_mul(u128::MAX, 2), String::new).is_err());
        assert!(wide_checked_mul(U256::MAX, U256::from(2u8)).is_err());
        assert!(wide_add(U256::MAX, U256::one()).is_err());
        assert!(matches!(
            wide_sub(U256::zero(), U256::one()),
            Err(Error::ArithmeticUnderflow { .. })
        ));
    }

    #[test]
    fn test_scale_decimals() {
        assert_eq!(scale_decimals(3_000_000, 6, 18).unwrap(), 3 * 10u128.pow(18));
        assert_eq!(scale_decimals(3 * 10u128.pow(18), 18, 6).unwrap(), 3_000_000);
        // Downscaling truncates
        assert_eq!(scale_decimals(1_999_999, 6, 0).unwrap(), 1);
        assert_eq!(scale_decimals(42, 8, 8).unwrap(), 42);
        assert!(scale_decimals(u128::MAX, 0, 18).is_err());
        assert!(scale_decimals(1, 0, 39).is_err());
    }

    #[test]
    fn test_flash_fee() {
        assert_eq!(flash_fee(0).unwrap(), 1);
        assert_eq!(flash_fee(997).unwrap(), 4);
        assert_eq!(flash_fee(6_000_000_000).unwrap(), 18_054_163);
        assert_eq!(flash_repayment(6_000_000_000).unwrap(), 6_018_054_163);
    }

    #[test]
    fn test_constant_product_out() {
        // 10 * 1 / (5 + 1) = 1.66.. truncated
        assert_eq!(constant_product_out(1, 5, 10).unwrap(), 1);
        assert_eq!(constant_product_out(5, 5, 10).unwrap(), 5);
    }
}
