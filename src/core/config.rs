//! Protocol configuration and parameters.
//!
//! Parameters are fixed when the components are constructed; nothing here is
//! mutable at runtime.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::address::Address;
use crate::utils::constants::*;
use crate::utils::validation::{validate_asset_pair, validate_decimals, validate_ltv};

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable protocol parameters (set at construction)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    /// Protocol version
    pub version: String,

    /// Loan-to-value ratio in basis points (6600 = 66%)
    pub ltv_bps: u64,

    /// Symbol of the borrowable asset
    pub borrow_symbol: String,

    /// Decimals of the borrowable asset
    pub borrow_decimals: u8,

    /// Symbol of the collateral asset
    pub collateral_symbol: String,

    /// Decimals of the collateral asset
    pub collateral_decimals: u8,

    /// Decimals of the price feed
    pub price_decimals: u8,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            ltv_bps: DEFAULT_LTV_BPS,
            borrow_symbol: "USDC".into(),
            borrow_decimals: DEFAULT_BORROW_DECIMALS,
            collateral_symbol: "WETH".into(),
            collateral_decimals: DEFAULT_COLLATERAL_DECIMALS,
            price_decimals: DEFAULT_PRICE_DECIMALS,
        }
    }
}

impl ProtocolParams {
    /// Override the loan-to-value ratio
    pub fn with_ltv(mut self, ltv_bps: u64) -> Self {
        self.ltv_bps = ltv_bps;
        self
    }

    /// Override asset and price precisions
    pub fn with_decimals(mut self, borrow: u8, collateral: u8, price: u8) -> Self {
        self.borrow_decimals = borrow;
        self.collateral_decimals = collateral;
        self.price_decimals = price;
        self
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        validate_ltv(self.ltv_bps)?;
        validate_decimals(self.borrow_decimals, "borrow_decimals")?;
        validate_decimals(self.collateral_decimals, "collateral_decimals")?;
        validate_decimals(self.price_decimals, "price_decimals")?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEPLOYMENT ADDRESSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Addresses of every component in a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Borrowable asset
    pub borrow_asset: Address,
    /// Collateral asset
    pub collateral_asset: Address,
    /// Collateral ledger
    pub ledger: Address,
    /// Constant-product exchange
    pub exchange: Address,
    /// Flash-liquidity pool
    pub flash_pool: Address,
    /// Liquidation orchestrator
    pub orchestrator: Address,
}

impl Default for Deployment {
    fn default() -> Self {
        Self {
            borrow_asset: Address::from_label("asset:borrow"),
            collateral_asset: Address::from_label("asset:collateral"),
            ledger: Address::from_label("ledger"),
            exchange: Address::from_label("exchange"),
            flash_pool: Address::from_label("flash-pool"),
            orchestrator: Address::from_label("orchestrator"),
        }
    }
}

impl Deployment {
    /// Validate that the deployment addresses are usable
    pub fn validate(&self) -> Result<()> {
        validate_asset_pair(&self.borrow_asset, &self.collateral_asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_params_default() {
        let params = ProtocolParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.ltv_bps, DEFAULT_LTV_BPS);
    }

    #[test]
    fn test_invalid_ltv_rejected() {
        assert!(ProtocolParams::default().with_ltv(0).validate().is_err());
        assert!(ProtocolParams::default().with_ltv(10_001).validate().is_err());
        assert!(ProtocolParams::default().with_ltv(10_000).validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: ProtocolParams = serde_json::from_str(r#"{"ltv_bps": 5000}"#).unwrap();
        assert_eq!(params.ltv_bps, 5000);
        assert_eq!(params.borrow_decimals, DEFAULT_BORROW_DECIMALS);
    }

    #[test]
    fn test_deployment_addresses_distinct() {
        let d = Deployment::default();
        assert!(d.validate().is_ok());
        assert_ne!(d.ledger, d.exchange);
        assert_ne!(d.flash_pool, d.orchestrator);
    }
}
