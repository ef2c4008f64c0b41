//! Collateral ledger.
//!
//! This module implements the lending side of the protocol:
//! - Depositing and withdrawing collateral
//! - Borrowing and repaying the borrowable asset
//! - Permissionless liquidation of insolvent positions
//! - Solvency queries against the price source
//!
//! Every position must satisfy `required_collateral(borrowed) <= deposited`
//! after each operation; `liquidate` is the only operation that runs while
//! the invariant is broken, because that is its precondition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::core::token::AssetRegistry;
use crate::error::{Error, Result};
use crate::oracle::PriceSource;
use crate::protocol::events::{EventLog, ProtocolEvent};
use crate::utils::address::Address;
use crate::utils::constants::BPS_DIVISOR;
use crate::utils::math::*;
use crate::utils::validation::*;

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-account balances, in native asset precision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Collateral deposited
    pub deposited: u128,
    /// Borrowable asset owed
    pub borrowed: u128,
}

impl Position {
    /// Check if the position holds nothing
    pub fn is_empty(&self) -> bool {
        self.deposited == 0 && self.borrowed == 0
    }

    /// Check if position has any debt
    pub fn has_debt(&self) -> bool {
        self.borrowed > 0
    }
}

/// Solvency snapshot of a position at the current price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionHealth {
    /// Balances
    pub position: Position,
    /// Collateral required for the current debt
    pub required_collateral: u128,
    /// Additional amount that could be borrowed right now
    pub max_additional_borrow: u128,
    /// Collateral that could be withdrawn right now
    pub withdrawable_collateral: u128,
    /// Whether `liquidate` would accept this position
    pub liquidatable: bool,
}

/// Aggregate ledger statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStatistics {
    pub accounts: u64,
    pub total_deposited: u128,
    pub total_borrowed: u128,
    pub liquidatable_accounts: u64,
    pub liquidatable_debt: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Ledger of deposits and debt enforcing a fixed loan-to-value ratio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralLedger {
    address: Address,
    borrow_asset: Address,
    collateral_asset: Address,
    borrow_decimals: u8,
    collateral_decimals: u8,
    ltv_bps: u64,
    positions: BTreeMap<Address, Position>,
}

impl CollateralLedger {
    /// Create a ledger, capturing both assets' decimals from the registry
    pub fn new(
        address: Address,
        borrow_asset: Address,
        collateral_asset: Address,
        ltv_bps: u64,
        assets: &AssetRegistry,
    ) -> Result<Self> {
        validate_ltv(ltv_bps)?;
        validate_asset_pair(&borrow_asset, &collateral_asset)?;
        Ok(Self {
            address,
            borrow_asset,
            collateral_asset,
            borrow_decimals: assets.decimals(&borrow_asset)?,
            collateral_decimals: assets.decimals(&collateral_asset)?,
            ltv_bps,
            positions: BTreeMap::new(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Ledger address (holds pooled collateral and lendable liquidity)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Borrowable asset address
    pub fn borrow_asset(&self) -> Address {
        self.borrow_asset
    }

    /// Collateral asset address
    pub fn collateral_asset(&self) -> Address {
        self.collateral_asset
    }

    /// Loan-to-value ratio in basis points
    pub fn ltv_bps(&self) -> u64 {
        self.ltv_bps
    }

    /// Position of `account` (empty if never touched)
    pub fn position(&self, account: &Address) -> Position {
        self.positions.get(account).copied().unwrap_or_default()
    }

    /// Collateral deposited by `account`
    pub fn deposited(&self, account: &Address) -> u128 {
        self.position(account).deposited
    }

    /// Debt owed by `account`
    pub fn borrowed(&self, account: &Address) -> u128 {
        self.position(account).borrowed
    }

    /// All positions, ordered by address
    pub fn positions(&self) -> impl Iterator<Item = (&Address, &Position)> {
        self.positions.iter()
    }

    /// Collateral required to back `borrow_amount` of debt.
    ///
    /// `ceil(borrow * price / 10^price_decimals)` is rescaled from borrowable
    /// to collateral precision and divided by the LTV with ceiling division.
    /// Both roundings go up so the requirement never understates exposure.
    pub fn required_collateral(&self, oracle: &dyn PriceSource, borrow_amount: u128) -> Result<u128> {
        let data = oracle.latest_price();
        let price = validate_price(data.price)?;

        let value = mul_div_up(borrow_amount, price, pow10(data.decimals)?)?;
        let value = scale_decimals(value, self.borrow_decimals, self.collateral_decimals)?;
        mul_div_up(value, BPS_DIVISOR as u128, self.ltv_bps as u128)
    }

    /// Full solvency snapshot for `account`
    pub fn position_health(&self, oracle: &dyn PriceSource, account: &Address) -> Result<PositionHealth> {
        let position = self.position(account);
        let required_collateral = self.required_collateral(oracle, position.borrowed)?;

        Ok(PositionHealth {
            position,
            required_collateral,
            max_additional_borrow: self.max_additional_borrow(oracle, &position)?,
            withdrawable_collateral: position.deposited.saturating_sub(required_collateral),
            liquidatable: required_collateral > position.deposited,
        })
    }

    /// Accounts whose deposit no longer covers their requirement
    pub fn find_liquidatable(&self, oracle: &dyn PriceSource) -> Result<Vec<(Address, Position)>> {
        let mut out = Vec::new();
        for (account, position) in &self.positions {
            if self.required_collateral(oracle, position.borrowed)? > position.deposited {
                out.push((*account, *position));
            }
        }
        Ok(out)
    }

    /// Calculate aggregate statistics
    pub fn statistics(&self, oracle: &dyn PriceSource) -> Result<LedgerStatistics> {
        let mut stats = LedgerStatistics::default();
        for position in self.positions.values() {
            stats.accounts += 1;
            stats.total_deposited = safe_add(stats.total_deposited, position.deposited)?;
            stats.total_borrowed = safe_add(stats.total_borrowed, position.borrowed)?;

            if self.required_collateral(oracle, position.borrowed)? > position.deposited {
                stats.liquidatable_accounts += 1;
                stats.liquidatable_debt = safe_add(stats.liquidatable_debt, position.borrowed)?;
            }
        }
        Ok(stats)
    }

    /// Check the solvency invariant for every position
    pub fn verify_solvency(&self, oracle: &dyn PriceSource) -> Result<bool> {
        Ok(self.find_liquidatable(oracle)?.is_empty())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit collateral, pulled from `caller` (requires an allowance)
    pub fn deposit(
        &mut self,
        assets: &mut AssetRegistry,
        events: &mut EventLog,
        caller: Address,
        amount: u128,
    ) -> Result<()> {
        validate_non_zero(amount)?;

        let mut position = self.position(&caller);
        position.deposited = safe_add(position.deposited, amount)?;
        self.positions.insert(caller, position);

        assets.transfer_from(&self.collateral_asset, self.address, caller, self.address, amount)?;

        info!(account = %caller.short(), amount, "collateral deposited");
        events.push(ProtocolEvent::Deposit { account: caller, amount });
        Ok(())
    }

    /// Borrow against deposited collateral
    pub fn borrow(
        &mut self,
        assets: &mut AssetRegistry,
        oracle: &dyn PriceSource,
        events: &mut EventLog,
        caller: Address,
        amount: u128,
    ) -> Result<()> {
        validate_non_zero(amount)?;

        let mut position = self.position(&caller);
        let new_debt = safe_add(position.borrowed, amount)?;
        let required = self.required_collateral(oracle, new_debt)?;
        if required > position.deposited {
            return Err(Error::InsufficientCollateral {
                required,
                deposited: position.deposited,
            });
        }

        position.borrowed = new_debt;
        self.positions.insert(caller, position);

        assets.transfer(&self.borrow_asset, self.address, caller, amount)?;

        info!(account = %caller.short(), amount, debt = new_debt, required, "borrowed");
        events.push(ProtocolEvent::Borrow { account: caller, amount });
        Ok(())
    }

    /// Repay debt, pulled from `caller` (requires an allowance)
    pub fn repay(
        &mut self,
        assets: &mut AssetRegistry,
        events: &mut EventLog,
        caller: Address,
        amount: u128,
    ) -> Result<()> {
        validate_non_zero(amount)?;

        let mut position = self.position(&caller);
        position.borrowed = safe_sub(position.borrowed, amount)?;
        self.store(caller, position);

        assets.transfer_from(&self.borrow_asset, self.address, caller, self.address, amount)?;

        info!(account = %caller.short(), amount, debt = position.borrowed, "repaid");
        events.push(ProtocolEvent::Repay { account: caller, amount });
        Ok(())
    }

    /// Withdraw collateral while keeping the position solvent
    pub fn withdraw(
        &mut self,
        assets: &mut AssetRegistry,
        oracle: &dyn PriceSource,
        events: &mut EventLog,
        caller: Address,
        amount: u128,
    ) -> Result<()> {
        validate_non_zero(amount)?;

        let mut position = self.position(&caller);
        let required = self.required_collateral(oracle, position.borrowed)?;
        let remaining = safe_sub(position.deposited, amount)?;
        if remaining < required {
            return Err(Error::TooMuchDebt { required, remaining });
        }

        position.deposited = remaining;
        self.store(caller, position);

        assets.transfer(&self.collateral_asset, self.address, caller, amount)?;

        info!(account = %caller.short(), amount, remaining, "collateral withdrawn");
        events.push(ProtocolEvent::Withdraw { account: caller, amount });
        Ok(())
    }

    /// Close an insolvent position.
    ///
    /// The caller repays the whole debt and receives the whole deposit.
    /// Returns the collateral transferred.
    pub fn liquidate(
        &mut self,
        assets: &mut AssetRegistry,
        oracle: &dyn PriceSource,
        events: &mut EventLog,
        caller: Address,
        user: Address,
    ) -> Result<u128> {
        let position = self.position(&user);
        let required = self.required_collateral(oracle, position.borrowed)?;
        if position.deposited >= required {
            return Err(Error::AlreadySufficientlyCollateralized(user));
        }

        self.positions.remove(&user);

        assets.transfer_from(&self.borrow_asset, self.address, caller, self.address, position.borrowed)?;
        assets.transfer(&self.collateral_asset, self.address, caller, position.deposited)?;

        info!(
            liquidator = %caller.short(),
            user = %user.short(),
            debt = position.borrowed,
            collateral = position.deposited,
            required,
            "position liquidated"
        );
        events.push(ProtocolEvent::Liquidate {
            liquidator: caller,
            user,
            debt_amount: position.borrowed,
            collateral_amount: position.deposited,
        });
        Ok(position.deposited)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    fn store(&mut self, account: Address, position: Position) {
        if position.is_empty() {
            self.positions.remove(&account);
        } else {
            self.positions.insert(account, position);
        }
    }

    /// Largest extra debt whose requirement still fits the deposit.
    ///
    /// `required_collateral` is monotonic in the borrow amount, so a binary
    /// search over it is exact under the same rounding the ledger enforces.
    fn max_additional_borrow(&self, oracle: &dyn PriceSource, position: &Position) -> Result<u128> {
        let fits = |extra: u128| -> Result<bool> {
            let debt = match position.borrowed.checked_add(extra) {
                Some(d) => d,
                None => return Ok(false),
            };
            match self.required_collateral(oracle, debt) {
                Ok(required) => Ok(required <= position.deposited),
                Err(Error::Overflow { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        };

        if !fits(0)? {
            return Ok(0);
        }
        let (mut lo, mut hi) = (0u128, u128::MAX - position.borrowed);
        while lo < hi {
            let mid = lo + (hi - lo) / 2 + 1;
            if fits(mid)? {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        debug!(extra = lo, "max additional borrow");
        Ok(lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::TokenLedger;
    use crate::oracle::PriceFeed;

    const WAD: u128 = 1_000_000_000_000_000_000;
    const USDC: u128 = 1_000_000;

    struct Fixture {
        assets: AssetRegistry,
        feed: PriceFeed,
        events: EventLog,
        ledger: CollateralLedger,
    }

    fn alice() -> Address {
        Address::from_label("alice")
    }

    /// USDC (6) borrowed against WETH (18); price in WETH per USDC, 18 decimals.
    /// 1 WETH = 2000 USDC, LTV as given.
    fn fixture(ltv_bps: u64) -> Fixture {
        fixture_with(ltv_bps, (6, 18), (WAD / 2000) as i128, 1_000_000 * USDC, 10 * WAD)
    }

    /// Borrowable and collateral assets at `decimals`, an 18-decimal price,
    /// `liquidity` held by the ledger and `collateral` held by alice.
    fn fixture_with(
        ltv_bps: u64,
        decimals: (u8, u8),
        price: i128,
        liquidity: u128,
        collateral: u128,
    ) -> Fixture {
        let debt_asset = Address::from_label("debt");
        let collateral_asset = Address::from_label("collateral");
        let ledger_addr = Address::from_label("ledger");

        let mut assets = AssetRegistry::new();
        assets.register(TokenLedger::new(debt_asset, "DEBT", decimals.0).unwrap()).unwrap();
        assets
            .register(TokenLedger::new(collateral_asset, "COLL", decimals.1).unwrap())
            .unwrap();
        assets.mint(&debt_asset, ledger_addr, liquidity).unwrap();
        assets.mint(&collateral_asset, alice(), collateral).unwrap();
        assets.approve(&collateral_asset, alice(), ledger_addr, u128::MAX).unwrap();
        assets.approve(&debt_asset, alice(), ledger_addr, u128::MAX).unwrap();

        let ledger =
            CollateralLedger::new(ledger_addr, debt_asset, collateral_asset, ltv_bps, &assets).unwrap();
        Fixture {
            assets,
            feed: PriceFeed::new(price, 18).unwrap(),
            events: EventLog::new(),
            ledger,
        }
    }

    impl Fixture {
        fn deposit(&mut self, amount: u128) -> Result<()> {
            self.ledger.deposit(&mut self.assets, &mut self.events, alice(), amount)
        }

        fn borrow(&mut self, amount: u128) -> Result<()> {
            self.ledger
                .borrow(&mut self.assets, &self.feed, &mut self.events, alice(), amount)
        }
    }

    #[test]
    fn test_required_collateral_rounds_up() {
        let f = fixture(10_000);
        assert_eq!(f.ledger.required_collateral(&f.feed, 6000 * USDC).unwrap(), 3 * WAD);
        // One extra micro-dollar costs a whole rounded-up unit of collateral precision
        let required = f.ledger.required_collateral(&f.feed, 6000 * USDC + 1).unwrap();
        assert_eq!(required, 3 * WAD + 1_000_000_000_000);
    }

    #[test]
    fn test_required_collateral_applies_ltv() {
        let f = fixture(5_000);
        assert_eq!(f.ledger.required_collateral(&f.feed, 2000 * USDC).unwrap(), 2 * WAD);
        assert_eq!(f.ledger.required_collateral(&f.feed, 0).unwrap(), 0);
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut f = fixture(10_000);
        f.feed.set_price(-1, 1);
        assert_eq!(
            f.ledger.required_collateral(&f.feed, 1).unwrap_err(),
            Error::InvalidPrice(-1)
        );
    }

    #[test]
    fn test_deposit_and_borrow() {
        let mut f = fixture(10_000);
        f.deposit(3 * WAD).unwrap();
        f.borrow(6000 * USDC).unwrap();

        assert_eq!(f.ledger.position(&alice()), Position { deposited: 3 * WAD, borrowed: 6000 * USDC });
        assert_eq!(f.assets.balance_of(&f.ledger.borrow_asset(), &alice()).unwrap(), 6000 * USDC);
        assert_eq!(f.events.len(), 2);
    }

    #[test]
    fn test_borrow_insufficient_collateral_leaves_state() {
        let mut f = fixture(10_000);
        f.deposit(3 * WAD).unwrap();
        f.borrow(6000 * USDC).unwrap();

        let err = f.borrow(1).unwrap_err();
        assert!(matches!(err, Error::InsufficientCollateral { .. }));
        assert_eq!(f.ledger.borrowed(&alice()), 6000 * USDC);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut f = fixture(10_000);
        assert_eq!(f.deposit(0).unwrap_err(), Error::ZeroAmount);
    }

    #[test]
    fn test_repay_more_than_owed_underflows() {
        let mut f = fixture(10_000);
        f.deposit(3 * WAD).unwrap();
        f.borrow(100 * USDC).unwrap();

        let err = f
            .ledger
            .repay(&mut f.assets, &mut f.events, alice(), 101 * USDC)
            .unwrap_err();
        assert!(matches!(err, Error::ArithmeticUnderflow { .. }));

        f.ledger.repay(&mut f.assets, &mut f.events, alice(), 100 * USDC).unwrap();
        assert_eq!(f.ledger.borrowed(&alice()), 0);
    }

    #[test]
    fn test_withdraw_too_much_debt() {
        let mut f = fixture(10_000);
        f.deposit(3 * WAD).unwrap();
        f.borrow(2000 * USDC).unwrap();

        // 1 WETH required, 2 WETH free
        let err = f
            .ledger
            .withdraw(&mut f.assets, &f.feed, &mut f.events, alice(), 2 * WAD + 1)
            .unwrap_err();
        assert!(matches!(err, Error::TooMuchDebt { .. }));

        f.ledger
            .withdraw(&mut f.assets, &f.feed, &mut f.events, alice(), 2 * WAD)
            .unwrap();
        assert_eq!(f.ledger.deposited(&alice()), WAD);
    }

    #[test]
    fn test_liquidate_healthy_position_fails() {
        let mut f = fixture(10_000);
        f.deposit(3 * WAD).unwrap();
        f.borrow(6000 * USDC).unwrap();

        let err = f
            .ledger
            .liquidate(&mut f.assets, &f.feed, &mut f.events, Address::from_label("bot"), alice())
            .unwrap_err();
        assert_eq!(err, Error::AlreadySufficientlyCollateralized(alice()));
    }

    #[test]
    fn test_position_health_and_statistics() {
        let mut f = fixture(10_000);
        f.deposit(3 * WAD).unwrap();
        f.borrow(2000 * USDC).unwrap();

        let health = f.ledger.position_health(&f.feed, &alice()).unwrap();
        assert_eq!(health.required_collateral, WAD);
        assert_eq!(health.withdrawable_collateral, 2 * WAD);
        assert_eq!(health.max_additional_borrow, 4000 * USDC);
        assert!(!health.liquidatable);

        f.feed.set_price((WAD / 500) as i128, 1);
        let stats = f.ledger.statistics(&f.feed).unwrap();
        assert_eq!(stats.accounts, 1);
        assert_eq!(stats.liquidatable_accounts, 1);
        assert_eq!(stats.liquidatable_debt, 2000 * USDC);
        assert_eq!(f.ledger.find_liquidatable(&f.feed).unwrap().len(), 1);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MIXED PRECISION
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_same_precision_borrow_at_scale() {
        // DAI (18) against WETH (18), 1 WETH = 2000 DAI
        let mut f = fixture_with(10_000, (18, 18), (WAD / 2000) as i128, 10_000_000 * WAD, 1_000 * WAD);
        f.deposit(1_000 * WAD).unwrap();
        f.borrow(1_000_000 * WAD).unwrap();

        assert_eq!(f.ledger.required_collateral(&f.feed, 1_000_000 * WAD).unwrap(), 500 * WAD);
        let health = f.ledger.position_health(&f.feed, &alice()).unwrap();
        assert_eq!(health.max_additional_borrow, 1_000_000 * WAD);
        assert_eq!(health.withdrawable_collateral, 500 * WAD);

        // Exact at 18 decimals: one wei of debt costs one wei of collateral
        assert_eq!(
            f.ledger.required_collateral(&f.feed, 2_000_000 * WAD + 2000).unwrap(),
            1_000 * WAD + 1
        );
        f.borrow(1_000_000 * WAD).unwrap();
        assert!(matches!(f.borrow(1), Err(Error::InsufficientCollateral { .. })));
    }

    #[test]
    fn test_downscaled_collateral_truncates() {
        // DAI (18) against WBTC (8), 1 WBTC = 50,000 DAI, LTV 75%
        let mut f = fixture_with(7_500, (18, 8), (WAD / 50_000) as i128, 1_000_000 * WAD, 100_000_000);
        f.deposit(80_000_000).unwrap();
        f.borrow(30_000 * WAD).unwrap();
        assert_eq!(f.ledger.required_collateral(&f.feed, 30_000 * WAD).unwrap(), 80_000_000);

        // Below one satoshi of value the rescale drops the remainder
        let dust = 499_999_999_950_000;
        assert_eq!(
            f.ledger.required_collateral(&f.feed, 30_000 * WAD + dust).unwrap(),
            80_000_000
        );
        assert_eq!(
            f.ledger.position_health(&f.feed, &alice()).unwrap().max_additional_borrow,
            dust
        );
        f.borrow(dust).unwrap();

        assert_eq!(
            f.borrow(1).unwrap_err(),
            Error::InsufficientCollateral {
                required: 80_000_002,
                deposited: 80_000_000,
            }
        );
        assert_eq!(f.ledger.position(&alice()).borrowed, 30_000 * WAD + dust);
    }
}
