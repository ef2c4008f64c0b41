//! Constant-product exchange.
//!
//! A two-asset pool whose reserves keep `reserve0 * reserve1` from
//! decreasing across swaps. Liquidity providers hold shares; the first
//! provider receives `amount0 * amount1` shares and later providers mint
//! pro rata at the exact reserve ratio. Swaps charge no fee.
//!
//! Shares and the reserve product are 256-bit, since the product of two
//! 18-decimal amounts does not fit in `u128`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::core::token::AssetRegistry;
use crate::error::{Error, Result};
use crate::protocol::events::{EventLog, ProtocolEvent};
use crate::utils::address::Address;
use crate::utils::math::*;
use crate::utils::validation::*;

// ═══════════════════════════════════════════════════════════════════════════════
// SWAP DIRECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Which side of the pool is being sold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapSide {
    /// Sell asset 0 for asset 1
    Zero,
    /// Sell asset 1 for asset 0
    One,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXCHANGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Constant-product liquidity pool over two assets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantProductExchange {
    address: Address,
    token0: Address,
    token1: Address,
    reserve0: u128,
    reserve1: u128,
    total_shares: U256,
    shares: BTreeMap<Address, U256>,
}

impl ConstantProductExchange {
    /// Create an empty, uninitialized pool
    pub fn new(address: Address, token0: Address, token1: Address) -> Result<Self> {
        validate_asset_pair(&token0, &token1)?;
        Ok(Self {
            address,
            token0,
            token1,
            reserve0: 0,
            reserve1: 0,
            total_shares: U256::zero(),
            shares: BTreeMap::new(),
        })
    }

    /// Pool address (custodian of both reserves)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Asset 0
    pub fn token0(&self) -> Address {
        self.token0
    }

    /// Asset 1
    pub fn token1(&self) -> Address {
        self.token1
    }

    /// Current `(reserve0, reserve1)`
    pub fn reserves(&self) -> (u128, u128) {
        (self.reserve0, self.reserve1)
    }

    /// Outstanding shares
    pub fn total_shares(&self) -> U256 {
        self.total_shares
    }

    /// Shares held by `provider`
    pub fn shares_of(&self, provider: &Address) -> U256 {
        self.shares.get(provider).copied().unwrap_or_default()
    }

    /// Whether liquidity has been seeded
    pub fn is_initialized(&self) -> bool {
        !self.total_shares.is_zero()
    }

    /// `reserve0 * reserve1`
    pub fn invariant(&self) -> U256 {
        wide_mul(self.reserve0, self.reserve1)
    }

    /// Side of the pool that `asset` trades on
    pub fn side_of(&self, asset: &Address) -> Result<SwapSide> {
        if *asset == self.token0 {
            Ok(SwapSide::Zero)
        } else if *asset == self.token1 {
            Ok(SwapSide::One)
        } else {
            Err(Error::UnknownAsset(*asset))
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUOTES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Asset 1 received for selling `amount0`
    pub fn quote_sell0(&self, amount0: u128) -> Result<u128> {
        self.ensure_initialized()?;
        constant_product_out(amount0, self.reserve0, self.reserve1)
    }

    /// Asset 0 received for selling `amount1`
    pub fn quote_sell1(&self, amount1: u128) -> Result<u128> {
        self.ensure_initialized()?;
        constant_product_out(amount1, self.reserve1, self.reserve0)
    }

    /// Output for selling `amount` of `asset`
    pub fn quote_sell(&self, asset: &Address, amount: u128) -> Result<u128> {
        match self.side_of(asset)? {
            SwapSide::Zero => self.quote_sell0(amount),
            SwapSide::One => self.quote_sell1(amount),
        }
    }

    /// Counterpart amount and shares for minting with `amount0`.
    ///
    /// Fails with `ProportionMismatch` when no integer `amount1` matches the
    /// reserve ratio exactly.
    pub fn quote_mint(&self, amount0: u128) -> Result<(u128, U256)> {
        self.ensure_initialized()?;
        let scaled = wide_mul(amount0, self.reserve1);
        let amount1 = narrow(wide_div(scaled, U256::from(self.reserve0))?, || {
            format!("{} * {} / {}", amount0, self.reserve1, self.reserve0)
        })?;
        if wide_mul(amount1, self.reserve0) != scaled {
            return Err(self.mismatch(amount0, amount1));
        }
        Ok((amount1, self.shares_for(amount0)?))
    }

    /// Assets paid out for burning `shares`
    pub fn quote_burn(&self, shares: U256) -> Result<(u128, u128)> {
        self.ensure_initialized()?;
        Ok((
            self.pro_rata(self.reserve0, shares)?,
            self.pro_rata(self.reserve1, shares)?,
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDITY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Seed the pool. Shares minted are `amount0 * amount1`.
    pub fn initialize(
        &mut self,
        assets: &mut AssetRegistry,
        events: &mut EventLog,
        caller: Address,
        amount0: u128,
        amount1: u128,
    ) -> Result<U256> {
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        validate_non_zero(amount0)?;
        validate_non_zero(amount1)?;
        let shares = wide_mul(amount0, amount1);

        self.reserve0 = amount0;
        self.reserve1 = amount1;
        self.total_shares = shares;
        self.shares.insert(caller, shares);

        assets.transfer_from(&self.token0, self.address, caller, self.address, amount0)?;
        assets.transfer_from(&self.token1, self.address, caller, self.address, amount1)?;

        info!(provider = %caller.short(), amount0, amount1, %shares, "exchange initialized");
        events.push(ProtocolEvent::Initialized {
            provider: caller,
            amount0,
            amount1,
            shares,
        });
        Ok(shares)
    }

    /// Add liquidity at exactly the current reserve ratio
    pub fn mint(
        &mut self,
        assets: &mut AssetRegistry,
        events: &mut EventLog,
        caller: Address,
        amount0: u128,
        amount1: u128,
    ) -> Result<U256> {
        self.ensure_initialized()?;
        if wide_mul(amount0, self.reserve1) != wide_mul(amount1, self.reserve0) {
            return Err(self.mismatch(amount0, amount1));
        }
        let shares = self.shares_for(amount0)?;
        if shares.is_zero() {
            return Err(Error::ZeroAmount);
        }

        self.reserve0 = safe_add(self.reserve0, amount0)?;
        self.reserve1 = safe_add(self.reserve1, amount1)?;
        self.total_shares = wide_add(self.total_shares, shares)?;
        let held = wide_add(self.shares_of(&caller), shares)?;
        self.shares.insert(caller, held);

        assets.transfer_from(&self.token0, self.address, caller, self.address, amount0)?;
        assets.transfer_from(&self.token1, self.address, caller, self.address, amount1)?;

        info!(provider = %caller.short(), amount0, amount1, %shares, "liquidity minted");
        events.push(ProtocolEvent::Mint {
            provider: caller,
            amount0,
            amount1,
            shares,
        });
        Ok(shares)
    }

    /// Remove liquidity pro rata. Returns `(amount0, amount1)` paid out.
    pub fn burn(
        &mut self,
        assets: &mut AssetRegistry,
        events: &mut EventLog,
        caller: Address,
        shares: U256,
    ) -> Result<(u128, u128)> {
        if shares.is_zero() {
            return Err(Error::ZeroAmount);
        }
        let held = wide_sub(self.shares_of(&caller), shares)?;
        let (amount0, amount1) = self.quote_burn(shares)?;

        self.reserve0 = safe_sub(self.reserve0, amount0)?;
        self.reserve1 = safe_sub(self.reserve1, amount1)?;
        self.total_shares = wide_sub(self.total_shares, shares)?;
        if held.is_zero() {
            self.shares.remove(&caller);
        } else {
            self.shares.insert(caller, held);
        }

        assets.transfer(&self.token0, self.address, caller, amount0)?;
        assets.transfer(&self.token1, self.address, caller, amount1)?;

        info!(provider = %caller.short(), %shares, amount0, amount1, "liquidity burned");
        events.push(ProtocolEvent::Burn {
            provider: caller,
            shares,
            amount0,
            amount1,
        });
        Ok((amount0, amount1))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SWAPS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Sell `amount0` of asset 0; returns asset 1 paid out
    pub fn sell0(
        &mut self,
        assets: &mut AssetRegistry,
        events: &mut EventLog,
        caller: Address,
        amount0: u128,
    ) -> Result<u128> {
        let amount1_out = self.swap(assets, caller, SwapSide::Zero, amount0)?;
        events.push(ProtocolEvent::Sell0 {
            trader: caller,
            amount0_in: amount0,
            amount1_out,
        });
        Ok(amount1_out)
    }

    /// Sell `amount1` of asset 1; returns asset 0 paid out
    pub fn sell1(
        &mut self,
        assets: &mut AssetRegistry,
        events: &mut EventLog,
        caller: Address,
        amount1: u128,
    ) -> Result<u128> {
        let amount0_out = self.swap(assets, caller, SwapSide::One, amount1)?;
        events.push(ProtocolEvent::Sell1 {
            trader: caller,
            amount1_in: amount1,
            amount0_out,
        });
        Ok(amount0_out)
    }

    /// Sell `amount` of whichever pool asset `asset` names
    pub fn sell(
        &mut self,
        assets: &mut AssetRegistry,
        events: &mut EventLog,
        caller: Address,
        asset: &Address,
        amount: u128,
    ) -> Result<u128> {
        match self.side_of(asset)? {
            SwapSide::Zero => self.sell0(assets, events, caller, amount),
            SwapSide::One => self.sell1(assets, events, caller, amount),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Reserves are read and rewritten before either transfer runs
    fn swap(
        &mut self,
        assets: &mut AssetRegistry,
        caller: Address,
        side: SwapSide,
        amount_in: u128,
    ) -> Result<u128> {
        validate_non_zero(amount_in)?;
        self.ensure_initialized()?;

        let (token_in, token_out, reserve_in, reserve_out) = match side {
            SwapSide::Zero => (self.token0, self.token1, self.reserve0, self.reserve1),
            SwapSide::One => (self.token1, self.token0, self.reserve1, self.reserve0),
        };
        let amount_out = constant_product_out(amount_in, reserve_in, reserve_out)?;
        let new_in = safe_add(reserve_in, amount_in)?;
        let new_out = safe_sub(reserve_out, amount_out)?;

        match side {
            SwapSide::Zero => {
                self.reserve0 = new_in;
                self.reserve1 = new_out;
            }
            SwapSide::One => {
                self.reserve1 = new_in;
                self.reserve0 = new_out;
            }
        }

        assets.transfer_from(&token_in, self.address, caller, self.address, amount_in)?;
        assets.transfer(&token_out, self.address, caller, amount_out)?;

        info!(
            trader = %caller.short(),
            ?side,
            amount_in,
            amount_out,
            reserve0 = self.reserve0,
            reserve1 = self.reserve1,
            "swap executed"
        );
        Ok(amount_out)
    }

    /// `total_shares * amount0 / reserve0`
    fn shares_for(&self, amount0: u128) -> Result<U256> {
        let scaled = wide_checked_mul(self.total_shares, U256::from(amount0))?;
        wide_div(scaled, U256::from(self.reserve0))
    }

    /// `reserve * shares / total_shares`, at most `reserve` for held shares
    fn pro_rata(&self, reserve: u128, shares: U256) -> Result<u128> {
        let scaled = wide_checked_mul(U256::from(reserve), shares)?;
        narrow(wide_div(scaled, self.total_shares)?, || {
            format!("{} * {} / {}", reserve, shares, self.total_shares)
        })
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn mismatch(&self, amount0: u128, amount1: u128) -> Error {
        Error::ProportionMismatch {
            amount0,
            amount1,
            reserve0: self.reserve0,
            reserve1: self.reserve1,
        }
    }
}
