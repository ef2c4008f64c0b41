//! Liquidation orchestrator.
//!
//! Closes an insolvent ledger position without the caller putting up any
//! capital:
//! - Flash-borrow exactly the position's debt
//! - Repay it through `CollateralLedger::liquidate`, receiving the collateral
//! - Sell the collateral on the exchange
//! - Return principal plus fee to the lender and pay the rest to the caller
//!
//! The lender drives the middle steps by calling back into
//! [`LiquidationOrchestrator::on_loan_received`]. Only the lender recorded
//! for the in-flight liquidation may make that call, and only on behalf of
//! this orchestrator.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::exchange::ConstantProductExchange;
use crate::core::ledger::CollateralLedger;
use crate::core::token::AssetRegistry;
use crate::error::{Error, Result};
use crate::liquidation::flash_pool::{FlashBorrower, FlashLender};
use crate::oracle::PriceSource;
use crate::protocol::events::{EventLog, ProtocolEvent};
use crate::utils::address::Address;
use crate::utils::math::*;

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestratorState {
    /// No liquidation in flight
    #[default]
    Idle,
    /// Flash loan requested; only `authorized_pool` may call back
    AwaitingCallback {
        /// Lender permitted to invoke the completion callback
        authorized_pool: Address,
    },
}

/// Callback payload carried through the lender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationParams {
    /// Position being liquidated
    pub user: Address,
    /// Caller who receives the profit
    pub liquidator: Address,
}

impl LiquidationParams {
    /// Encode for the flash-loan data field
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode from the flash-loan data field
    pub fn decode(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// The venues a liquidation touches, borrowed for one call
pub struct Venues<'a> {
    pub ledger: &'a mut CollateralLedger,
    pub exchange: &'a mut ConstantProductExchange,
    pub oracle: &'a dyn PriceSource,
    pub events: &'a mut EventLog,
}

/// Dry-run estimate of a liquidation at current prices and reserves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationPreview {
    /// Position owner
    pub user: Address,
    /// Whether the ledger would accept the liquidation
    pub liquidatable: bool,
    /// Debt to flash-borrow
    pub debt: u128,
    /// Collateral that would be seized
    pub collateral: u128,
    /// Borrowable asset received for the collateral
    pub proceeds: u128,
    /// Flash fee on the debt
    pub fee: u128,
    /// Profit paid to the caller (zero when unprofitable)
    pub profit: u128,
    /// Amount by which proceeds fall short of the repayment
    pub shortfall: u128,
}

impl LiquidationPreview {
    /// Whether executing now would succeed
    pub fn is_executable(&self) -> bool {
        self.liquidatable && self.shortfall == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORCHESTRATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Flash-loan funded liquidator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationOrchestrator {
    address: Address,
    state: OrchestratorState,
    /// Liquidations completed
    total_liquidations: u64,
    /// Profit paid out to callers
    total_profit: u128,
}

impl LiquidationOrchestrator {
    /// Create an idle orchestrator
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: OrchestratorState::Idle,
            total_liquidations: 0,
            total_profit: 0,
        }
    }

    /// Orchestrator address (holds funds only during a liquidation)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current lifecycle state
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Liquidations completed
    pub fn total_liquidations(&self) -> u64 {
        self.total_liquidations
    }

    /// Profit paid out to callers
    pub fn total_profit(&self) -> u128 {
        self.total_profit
    }

    /// `floor(3 * amount / 997) + 1`
    pub fn flash_fee(amount: u128) -> Result<u128> {
        flash_fee(amount)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Estimate the outcome of liquidating `user` without touching any state
    pub fn preview_liquidation(
        &self,
        ledger: &CollateralLedger,
        exchange: &ConstantProductExchange,
        oracle: &dyn PriceSource,
        user: &Address,
    ) -> Result<LiquidationPreview> {
        let health = ledger.position_health(oracle, user)?;
        let debt = health.position.borrowed;
        let collateral = health.position.deposited;

        let proceeds = if collateral == 0 {
            0
        } else {
            exchange.quote_sell(&ledger.collateral_asset(), collateral)?
        };
        let fee = flash_fee(debt)?;
        let owed = safe_add(debt, fee)?;

        debug!(user = %user.short(), debt, collateral, proceeds, fee, "liquidation preview");
        Ok(LiquidationPreview {
            user: *user,
            liquidatable: health.liquidatable,
            debt,
            collateral,
            proceeds,
            fee,
            profit: proceeds.saturating_sub(owed),
            shortfall: owed.saturating_sub(proceeds),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Liquidate `user` with a flash loan of their full debt from `lender`.
    ///
    /// Returns the profit transferred to `caller`. The authorization is
    /// cleared before returning, whether the loan succeeded or not.
    pub fn liquidate(
        &mut self,
        assets: &mut AssetRegistry,
        lender: &mut dyn FlashLender,
        venues: Venues<'_>,
        caller: Address,
        user: Address,
    ) -> Result<u128> {
        if self.state != OrchestratorState::Idle {
            return Err(Error::LiquidationInProgress);
        }
        if lender.asset() != venues.ledger.borrow_asset() {
            return Err(Error::UnknownAsset(lender.asset()));
        }

        let debt = venues.ledger.borrowed(&user);
        let data = LiquidationParams {
            user,
            liquidator: caller,
        }
        .encode()?;
        let initiator = self.address;

        self.state = OrchestratorState::AwaitingCallback {
            authorized_pool: lender.address(),
        };
        debug!(user = %user.short(), debt, pool = %lender.address().short(), "requesting flash loan");

        let mut session = CallbackSession {
            orchestrator: &mut *self,
            venues,
            profit: None,
        };
        let outcome = lender.request_loan(assets, initiator, debt, &mut session, &data);
        let profit = session.profit;
        self.state = OrchestratorState::Idle;

        outcome?;
        profit.ok_or_else(|| Error::InvalidParameter {
            name: "flash_lender".into(),
            reason: "loan completed without invoking the callback".into(),
        })
    }

    /// Completion callback for the flash loan requested by [`Self::liquidate`].
    ///
    /// `msg_sender` must be the lender recorded for the in-flight liquidation
    /// and `initiator` must be this orchestrator. Returns the profit paid out.
    pub fn on_loan_received(
        &mut self,
        assets: &mut AssetRegistry,
        venues: &mut Venues<'_>,
        msg_sender: Address,
        initiator: Address,
        amount: u128,
        data: &[u8],
    ) -> Result<u128> {
        match self.state {
            OrchestratorState::AwaitingCallback { authorized_pool } if authorized_pool == msg_sender => {}
            _ => return Err(Error::UnauthorizedMsgSender(msg_sender)),
        }
        if initiator != self.address {
            return Err(Error::UnauthorizedInitiator(initiator));
        }
        let params = LiquidationParams::decode(data)?;

        let borrow_asset = venues.ledger.borrow_asset();
        let collateral_asset = venues.ledger.collateral_asset();

        assets.approve(&borrow_asset, self.address, venues.ledger.address(), amount)?;
        let collateral = venues.ledger.liquidate(
            assets,
            venues.oracle,
            venues.events,
            self.address,
            params.user,
        )?;

        assets.approve(&collateral_asset, self.address, venues.exchange.address(), collateral)?;
        let proceeds = venues.exchange.sell(
            assets,
            venues.events,
            self.address,
            &collateral_asset,
            collateral,
        )?;

        let owed = flash_repayment(amount)?;
        let profit = safe_sub(proceeds, owed)?;

        assets.transfer(&borrow_asset, self.address, msg_sender, owed)?;
        assets.transfer(&borrow_asset, self.address, params.liquidator, profit)?;

        self.total_liquidations += 1;
        self.total_profit = safe_add(self.total_profit, profit)?;

        info!(
            liquidator = %params.liquidator.short(),
            user = %params.user.short(),
            debt = amount,
            collateral,
            proceeds,
            owed,
            profit,
            "arbitrage liquidation complete"
        );
        venues.events.push(ProtocolEvent::ArbitrageLiquidation {
            liquidator: params.liquidator,
            liquidatee: params.user,
            profit,
        });
        Ok(profit)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALLBACK SESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// What the lender sees as the borrower: the orchestrator plus the venues it
/// needs, borrowed for the lifetime of one `liquidate` call.
struct CallbackSession<'o, 'v> {
    orchestrator: &'o mut LiquidationOrchestrator,
    venues: Venues<'v>,
    profit: Option<u128>,
}

impl FlashBorrower for CallbackSession<'_, '_> {
    fn address(&self) -> Address {
        self.orchestrator.address
    }

    fn on_loan_received(
        &mut self,
        assets: &mut AssetRegistry,
        msg_sender: Address,
        initiator: Address,
        amount: u128,
        data: &[u8],
    ) -> Result<()> {
        let profit = self.orchestrator.on_loan_received(
            assets,
            &mut self.venues,
            msg_sender,
            initiator,
            amount,
            data,
        )?;
        self.profit = Some(profit);
        Ok(())
    }
}
