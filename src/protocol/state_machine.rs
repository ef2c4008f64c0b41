//! Protocol State Machine - transactional host.
//!
//! The state machine owns every component and executes operations one at a
//! time. Each operation runs against the live state; if it fails, the state
//! is restored to the snapshot taken before it started, so a failed
//! operation has no observable effect (no balances moved, no events).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::config::{Deployment, ProtocolParams};
use crate::core::exchange::ConstantProductExchange;
use crate::core::ledger::{CollateralLedger, LedgerStatistics, PositionHealth};
use crate::core::token::{AssetRegistry, TokenLedger};
use crate::error::Result;
use crate::liquidation::flash_pool::FlashPool;
use crate::liquidation::orchestrator::{LiquidationOrchestrator, LiquidationPreview, Venues};
use crate::oracle::PriceFeed;
use crate::protocol::events::EventLog;
use crate::protocol::operations::*;
use crate::utils::address::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything an operation may touch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolState {
    /// Asset balances and allowances
    pub assets: AssetRegistry,
    /// Price source
    pub oracle: PriceFeed,
    /// Collateral ledger
    pub ledger: CollateralLedger,
    /// Constant-product exchange (asset 0 = collateral, asset 1 = borrowable)
    pub exchange: ConstantProductExchange,
    /// Flash-liquidity pool lending the borrowable asset
    pub flash_pool: FlashPool,
    /// Liquidation orchestrator
    pub orchestrator: LiquidationOrchestrator,
    /// Events of the current block
    pub events: EventLog,
    /// Current block height
    pub block_height: u64,
    /// Current timestamp
    pub timestamp: u64,
}

impl ProtocolState {
    /// Deploy every component from parameters
    pub fn deploy(params: &ProtocolParams, deployment: &Deployment, initial_price: i128) -> Result<Self> {
        params.validate()?;
        deployment.validate()?;

        let mut assets = AssetRegistry::new();
        assets.register(TokenLedger::new(
            deployment.borrow_asset,
            params.borrow_symbol.clone(),
            params.borrow_decimals,
        )?)?;
        assets.register(TokenLedger::new(
            deployment.collateral_asset,
            params.collateral_symbol.clone(),
            params.collateral_decimals,
        )?)?;

        let ledger = CollateralLedger::new(
            deployment.ledger,
            deployment.borrow_asset,
            deployment.collateral_asset,
            params.ltv_bps,
            &assets,
        )?;
        let exchange = ConstantProductExchange::new(
            deployment.exchange,
            deployment.collateral_asset,
            deployment.borrow_asset,
        )?;

        Ok(Self {
            assets,
            oracle: PriceFeed::new(initial_price, params.price_decimals)?,
            ledger,
            exchange,
            flash_pool: FlashPool::new(deployment.flash_pool, deployment.borrow_asset),
            orchestrator: LiquidationOrchestrator::new(deployment.orchestrator),
            events: EventLog::new(),
            block_height: 0,
            timestamp: 0,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Protocol state machine - executes operations atomically
pub struct ProtocolStateMachine {
    /// Protocol parameters
    params: ProtocolParams,
    /// Component addresses
    deployment: Deployment,
    /// Live state
    state: ProtocolState,
    /// Operations committed
    committed: u64,
    /// Operations rolled back
    rolled_back: u64,
}

impl ProtocolStateMachine {
    /// Deploy a fresh protocol
    pub fn new(params: ProtocolParams, deployment: Deployment, initial_price: i128) -> Result<Self> {
        let state = ProtocolState::deploy(&params, &deployment, initial_price)?;
        info!(
            ltv_bps = params.ltv_bps,
            borrow = %params.borrow_symbol,
            collateral = %params.collateral_symbol,
            "protocol deployed"
        );
        Ok(Self {
            params,
            deployment,
            state,
            committed: 0,
            rolled_back: 0,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Protocol parameters
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Component addresses
    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Live state (read-only)
    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    /// Events emitted so far in this block
    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    /// `(committed, rolled_back)` operation counts
    pub fn operation_counts(&self) -> (u64, u64) {
        (self.committed, self.rolled_back)
    }

    /// Balance of `account` in one of the deployed assets
    pub fn balance_of(&self, asset: AssetKind, account: &Address) -> Result<u128> {
        self.state
            .assets
            .balance_of(&asset.resolve(&self.deployment), account)
    }

    /// Solvency snapshot of `account`
    pub fn position_health(&self, account: &Address) -> Result<PositionHealth> {
        self.state.ledger.position_health(&self.state.oracle, account)
    }

    /// Aggregate ledger statistics
    pub fn statistics(&self) -> Result<LedgerStatistics> {
        self.state.ledger.statistics(&self.state.oracle)
    }

    /// Dry-run an arbitrage liquidation of `user`
    pub fn preview_liquidation(&self, user: &Address) -> Result<LiquidationPreview> {
        self.state.orchestrator.preview_liquidation(
            &self.state.ledger,
            &self.state.exchange,
            &self.state.oracle,
            user,
        )
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BLOCK PROCESSING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Begin a new block
    pub fn begin_block(&mut self, height: u64, timestamp: u64) -> Result<()> {
        self.state.block_height = height;
        self.state.timestamp = timestamp;
        self.state.events.clear();
        debug!(height, timestamp, "block started");
        Ok(())
    }

    /// End the current block, draining its events
    pub fn end_block(&mut self) -> Result<EventLog> {
        let events = std::mem::take(&mut self.state.events);
        debug!(height = self.state.block_height, events = events.len(), "block ended");
        Ok(events)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OPERATION EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Execute a protocol operation atomically
    pub fn execute(&mut self, op: ProtocolOperation) -> Result<OperationResult> {
        let operation = op.operation_type();
        let snapshot = self.state.clone();

        match self.dispatch(op) {
            Ok(result) => {
                self.committed += 1;
                debug!(operation, ?result, "operation committed");
                Ok(result)
            }
            Err(e) => {
                self.state = snapshot;
                self.rolled_back += 1;
                warn!(operation, code = e.code(), error = %e, "operation rolled back");
                Err(e)
            }
        }
    }

    /// Execute operations in order, stopping at the first failure
    pub fn execute_all(&mut self, ops: impl IntoIterator<Item = ProtocolOperation>) -> Result<Vec<OperationResult>> {
        ops.into_iter().map(|op| self.execute(op)).collect()
    }

    fn dispatch(&mut self, op: ProtocolOperation) -> Result<OperationResult> {
        let s = &mut self.state;

        match op {
            ProtocolOperation::Deposit { caller, amount } => {
                s.ledger.deposit(&mut s.assets, &mut s.events, caller, amount)?;
                Ok(OperationResult::Done)
            }
            ProtocolOperation::Borrow { caller, amount } => {
                s.ledger
                    .borrow(&mut s.assets, &s.oracle, &mut s.events, caller, amount)?;
                Ok(OperationResult::Done)
            }
            ProtocolOperation::Repay { caller, amount } => {
                s.ledger.repay(&mut s.assets, &mut s.events, caller, amount)?;
                Ok(OperationResult::Done)
            }
            ProtocolOperation::Withdraw { caller, amount } => {
                s.ledger
                    .withdraw(&mut s.assets, &s.oracle, &mut s.events, caller, amount)?;
                Ok(OperationResult::Done)
            }
            ProtocolOperation::Liquidate { caller, user } => {
                let collateral = s
                    .ledger
                    .liquidate(&mut s.assets, &s.oracle, &mut s.events, caller, user)?;
                Ok(OperationResult::Seized { collateral })
            }

            ProtocolOperation::Initialize {
                caller,
                amount0,
                amount1,
            } => {
                let shares = s
                    .exchange
                    .initialize(&mut s.assets, &mut s.events, caller, amount0, amount1)?;
                Ok(OperationResult::Shares { shares })
            }
            ProtocolOperation::Mint {
                caller,
                amount0,
                amount1,
            } => {
                let shares = s
                    .exchange
                    .mint(&mut s.assets, &mut s.events, caller, amount0, amount1)?;
                Ok(OperationResult::Shares { shares })
            }
            ProtocolOperation::Burn { caller, shares } => {
                let (amount0, amount1) = s.exchange.burn(&mut s.assets, &mut s.events, caller, shares)?;
                Ok(OperationResult::Withdrawn { amount0, amount1 })
            }
            ProtocolOperation::Sell0 { caller, amount } => {
                let amount_out = s.exchange.sell0(&mut s.assets, &mut s.events, caller, amount)?;
                Ok(OperationResult::Swapped { amount_out })
            }
            ProtocolOperation::Sell1 { caller, amount } => {
                let amount_out = s.exchange.sell1(&mut s.assets, &mut s.events, caller, amount)?;
                Ok(OperationResult::Swapped { amount_out })
            }

            ProtocolOperation::ArbitrageLiquidate { caller, user } => {
                let venues = Venues {
                    ledger: &mut s.ledger,
                    exchange: &mut s.exchange,
                    oracle: &s.oracle,
                    events: &mut s.events,
                };
                let profit = s
                    .orchestrator
                    .liquidate(&mut s.assets, &mut s.flash_pool, venues, caller, user)?;
                Ok(OperationResult::Profit { profit })
            }
            ProtocolOperation::OnLoanReceived {
                caller,
                initiator,
                amount,
                data,
            } => {
                let mut venues = Venues {
                    ledger: &mut s.ledger,
                    exchange: &mut s.exchange,
                    oracle: &s.oracle,
                    events: &mut s.events,
                };
                let profit = s.orchestrator.on_loan_received(
                    &mut s.assets,
                    &mut venues,
                    caller,
                    initiator,
                    amount,
                    &data,
                )?;
                Ok(OperationResult::Profit { profit })
            }

            ProtocolOperation::Faucet { asset, to, amount } => {
                s.assets.mint(&asset.resolve(&self.deployment), to, amount)?;
                Ok(OperationResult::Done)
            }
            ProtocolOperation::Approve {
                owner,
                asset,
                spender,
                amount,
            } => {
                s.assets.approve(
                    &asset.resolve(&self.deployment),
                    owner,
                    spender.resolve(&self.deployment),
                    amount,
                )?;
                Ok(OperationResult::Done)
            }
            ProtocolOperation::SetPrice { price } => {
                s.oracle.set_price(price, s.timestamp);
                Ok(OperationResult::Done)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const WAD: u128 = 1_000_000_000_000_000_000;

    fn machine() -> ProtocolStateMachine {
        let params = ProtocolParams::default().with_ltv(10_000);
        ProtocolStateMachine::new(params, Deployment::default(), (WAD / 2000) as i128).unwrap()
    }

    #[test]
    fn test_deploy_validates_params() {
        let params = ProtocolParams::default().with_ltv(0);
        assert!(ProtocolStateMachine::new(params, Deployment::default(), 1).is_err());
    }

    #[test]
    fn test_failed_operation_rolls_back() {
        let mut sm = machine();
        let alice = Address::from_label("alice");

        sm.execute(ProtocolOperation::Faucet {
            asset: AssetKind::Collateral,
            to: alice,
            amount: WAD,
        })
        .unwrap();

        // No allowance: the ledger records the deposit, then the pull fails
        let err = sm
            .execute(ProtocolOperation::Deposit { caller: alice, amount: WAD })
            .unwrap_err();
        assert_eq!(err, Error::TransferFailed(sm.deployment().collateral_asset));
        assert_eq!(sm.state().ledger.deposited(&alice), 0);
        assert!(sm.events().is_empty());
        assert_eq!(sm.operation_counts(), (1, 1));
    }

    #[test]
    fn test_end_block_drains_events() {
        let mut sm = machine();
        let alice = Address::from_label("alice");
        sm.begin_block(1, 100).unwrap();
        sm.execute_all([
            ProtocolOperation::Faucet {
                asset: AssetKind::Collateral,
                to: alice,
                amount: WAD,
            },
            ProtocolOperation::Approve {
                owner: alice,
                asset: AssetKind::Collateral,
                spender: Spender::Ledger,
                amount: WAD,
            },
            ProtocolOperation::Deposit { caller: alice, amount: WAD },
        ])
        .unwrap();

        let events = sm.end_block().unwrap();
        assert_eq!(events.len(), 1);
        assert!(sm.events().is_empty());
        assert_eq!(sm.state().block_height, 1);
    }

    #[test]
    fn test_set_price_uses_block_timestamp() {
        let mut sm = machine();
        sm.begin_block(7, 1_700).unwrap();
        sm.execute(ProtocolOperation::SetPrice { price: 42 }).unwrap();

        let latest = crate::oracle::PriceSource::latest_price(&sm.state().oracle);
        assert_eq!(latest.price, 42);
        assert_eq!(latest.timestamp, 1_700);
    }
}
