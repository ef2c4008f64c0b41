//! Flash-liquidity pool.
//!
//! The pool lends its asset for the duration of a single call: it pushes the
//! principal to the borrower, hands control to the borrower's callback and,
//! once the callback returns, requires its own balance to have grown by at
//! least the fee.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::token::AssetRegistry;
use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::math::{flash_fee, safe_add};

// ═══════════════════════════════════════════════════════════════════════════════
// CALLBACK INTERFACES
// ═══════════════════════════════════════════════════════════════════════════════

/// Receiver of a flash loan
pub trait FlashBorrower {
    /// Address that receives the principal
    fn address(&self) -> Address;

    /// Completion callback, invoked by the lender while the loan is live.
    ///
    /// `msg_sender` is the lender making the call; `initiator` is whoever
    /// requested the loan. Repayment must be transferred before returning.
    fn on_loan_received(
        &mut self,
        assets: &mut AssetRegistry,
        msg_sender: Address,
        initiator: Address,
        amount: u128,
        data: &[u8],
    ) -> Result<()>;
}

/// Source of flash liquidity
pub trait FlashLender {
    /// Lender address (custodian of the liquidity)
    fn address(&self) -> Address;

    /// Asset lent
    fn asset(&self) -> Address;

    /// Fee charged on `amount`
    fn flash_fee(&self, amount: u128) -> Result<u128>;

    /// Lend `amount` to `borrower` for the duration of its callback
    fn request_loan(
        &mut self,
        assets: &mut AssetRegistry,
        initiator: Address,
        amount: u128,
        borrower: &mut dyn FlashBorrower,
        data: &[u8],
    ) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// FLASH POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Single-asset flash lender charging `floor(3 * amount / 997) + 1`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashPool {
    address: Address,
    asset: Address,
    /// Loans repaid
    total_loans: u64,
    /// Fees collected
    total_fees: u128,
}

impl FlashPool {
    /// Create a pool lending `asset`
    pub fn new(address: Address, asset: Address) -> Self {
        Self {
            address,
            asset,
            total_loans: 0,
            total_fees: 0,
        }
    }

    /// Liquidity available to lend
    pub fn available_liquidity(&self, assets: &AssetRegistry) -> Result<u128> {
        assets.balance_of(&self.asset, &self.address)
    }

    /// Number of loans completed
    pub fn total_loans(&self) -> u64 {
        self.total_loans
    }

    /// Total fees collected
    pub fn total_fees(&self) -> u128 {
        self.total_fees
    }
}

impl FlashLender for FlashPool {
    fn address(&self) -> Address {
        self.address
    }

    fn asset(&self) -> Address {
        self.asset
    }

    fn flash_fee(&self, amount: u128) -> Result<u128> {
        flash_fee(amount)
    }

    fn request_loan(
        &mut self,
        assets: &mut AssetRegistry,
        initiator: Address,
        amount: u128,
        borrower: &mut dyn FlashBorrower,
        data: &[u8],
    ) -> Result<()> {
        let fee = flash_fee(amount)?;
        let balance_before = self.available_liquidity(assets)?;
        let expected = safe_add(balance_before, fee)?;

        assets.transfer(&self.asset, self.address, borrower.address(), amount)?;
        debug!(
            borrower = %borrower.address().short(),
            initiator = %initiator.short(),
            amount,
            fee,
            "flash loan issued"
        );

        borrower.on_loan_received(assets, self.address, initiator, amount, data)?;

        let balance_after = self.available_liquidity(assets)?;
        if balance_after < expected {
            return Err(Error::FlashLoanNotRepaid {
                expected,
                received: balance_after,
            });
        }

        self.total_loans += 1;
        self.total_fees = safe_add(self.total_fees, balance_after - balance_before)?;
        info!(amount, fee, "flash loan repaid");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::TokenLedger;

    /// Borrower that sends back `principal + extra` from its own balance
    struct Repayer {
        address: Address,
        pool: Address,
        asset: Address,
        extra: u128,
        calls: u32,
    }

    impl FlashBorrower for Repayer {
        fn address(&self) -> Address {
            self.address
        }

        fn on_loan_received(
            &mut self,
            assets: &mut AssetRegistry,
            msg_sender: Address,
            _initiator: Address,
            amount: u128,
            _data: &[u8],
        ) -> Result<()> {
            assert_eq!(msg_sender, self.pool);
            self.calls += 1;
            assets.transfer(&self.asset, self.address, self.pool, amount + self.extra)
        }
    }

    fn setup(extra: u128) -> (AssetRegistry, FlashPool, Repayer) {
        let asset = Address::from_label("usdc");
        let pool_addr = Address::from_label("flash-pool");
        let borrower = Address::from_label("borrower");

        let mut assets = AssetRegistry::new();
        assets.register(TokenLedger::new(asset, "USDC", 6).unwrap()).unwrap();
        assets.mint(&asset, pool_addr, 1_000_000).unwrap();
        assets.mint(&asset, borrower, 1_000).unwrap();

        let repayer = Repayer {
            address: borrower,
            pool: pool_addr,
            asset,
            extra,
            calls: 0,
        };
        (assets, FlashPool::new(pool_addr, asset), repayer)
    }

    #[test]
    fn test_loan_repaid_with_fee() {
        let (mut assets, mut pool, mut borrower) = setup(flash_fee(997).unwrap());
        let initiator = borrower.address;

        pool.request_loan(&mut assets, initiator, 997, &mut borrower, &[])
            .unwrap();

        assert_eq!(borrower.calls, 1);
        assert_eq!(pool.total_loans(), 1);
        assert_eq!(pool.total_fees(), 4);
        assert_eq!(pool.available_liquidity(&assets).unwrap(), 1_000_004);
    }

    #[test]
    fn test_underpaid_loan_rejected() {
        let (mut assets, mut pool, mut borrower) = setup(0);
        let initiator = borrower.address;

        let err = pool
            .request_loan(&mut assets, initiator, 997, &mut borrower, &[])
            .unwrap_err();
        assert_eq!(
            err,
            Error::FlashLoanNotRepaid {
                expected: 1_000_004,
                received: 1_000_000,
            }
        );
    }

    #[test]
    fn test_loan_beyond_liquidity_fails() {
        let (mut assets, mut pool, mut borrower) = setup(0);
        let initiator = borrower.address;

        let err = pool
            .request_loan(&mut assets, initiator, 2_000_000, &mut borrower, &[])
            .unwrap_err();
        assert!(matches!(err, Error::TransferFailed(_)));
        assert_eq!(borrower.calls, 0);
    }
}
