//! Protocol events for state change notifications.
//!
//! Events are emitted by the ledger, the exchange and the orchestrator for
//! audit and observability; nothing inside the protocol consumes them. They
//! live in the transactional state, so an operation that fails emits nothing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::address::Address;
use crate::utils::constants::MAX_EVENT_LOG;
use crate::utils::math::U256;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All protocol event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProtocolEvent {
    // Ledger Events
    /// Collateral deposited
    Deposit {
        /// Position owner
        account: Address,
        /// Collateral amount
        amount: u128,
    },
    /// Borrowable asset lent out
    Borrow {
        /// Position owner
        account: Address,
        /// Borrowed amount
        amount: u128,
    },
    /// Debt repaid
    Repay {
        /// Position owner
        account: Address,
        /// Repaid amount
        amount: u128,
    },
    /// Collateral withdrawn
    Withdraw {
        /// Position owner
        account: Address,
        /// Collateral amount
        amount: u128,
    },
    /// Insolvent position closed by a liquidator
    Liquidate {
        /// Account that repaid the debt
        liquidator: Address,
        /// Liquidated position owner
        user: Address,
        /// Debt repaid by the liquidator
        debt_amount: u128,
        /// Collateral handed to the liquidator
        collateral_amount: u128,
    },

    // Exchange Events
    /// Exchange seeded with its first reserves
    Initialized {
        /// Liquidity provider
        provider: Address,
        /// Reserve 0 deposited
        amount0: u128,
        /// Reserve 1 deposited
        amount1: u128,
        /// Shares minted
        shares: U256,
    },
    /// Proportional liquidity added
    Mint {
        /// Liquidity provider
        provider: Address,
        /// Asset 0 deposited
        amount0: u128,
        /// Asset 1 deposited
        amount1: u128,
        /// Shares minted
        shares: U256,
    },
    /// Liquidity removed
    Burn {
        /// Liquidity provider
        provider: Address,
        /// Shares burned
        shares: U256,
        /// Asset 0 paid out
        amount0: u128,
        /// Asset 1 paid out
        amount1: u128,
    },
    /// Asset 0 sold for asset 1
    Sell0 {
        /// Trader
        trader: Address,
        /// Asset 0 received by the pool
        amount0_in: u128,
        /// Asset 1 paid to the trader
        amount1_out: u128,
    },
    /// Asset 1 sold for asset 0
    Sell1 {
        /// Trader
        trader: Address,
        /// Asset 1 received by the pool
        amount1_in: u128,
        /// Asset 0 paid to the trader
        amount0_out: u128,
    },

    // Orchestrator Events
    /// Flash-funded liquidation completed
    ArbitrageLiquidation {
        /// Caller who receives the profit
        liquidator: Address,
        /// Liquidated position owner
        liquidatee: Address,
        /// Borrowable asset paid to the liquidator
        profit: u128,
    },
}

impl ProtocolEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "Deposit",
            Self::Borrow { .. } => "Borrow",
            Self::Repay { .. } => "Repay",
            Self::Withdraw { .. } => "Withdraw",
            Self::Liquidate { .. } => "Liquidate",
            Self::Initialized { .. } => "Initialized",
            Self::Mint { .. } => "Mint",
            Self::Burn { .. } => "Burn",
            Self::Sell0 { .. } => "Sell0",
            Self::Sell1 { .. } => "Sell1",
            Self::ArbitrageLiquidation { .. } => "ArbitrageLiquidation",
        }
    }

    /// Component that emitted the event
    pub fn source(&self) -> EventSource {
        match self {
            Self::Deposit { .. }
            | Self::Borrow { .. }
            | Self::Repay { .. }
            | Self::Withdraw { .. }
            | Self::Liquidate { .. } => EventSource::Ledger,
            Self::Initialized { .. }
            | Self::Mint { .. }
            | Self::Burn { .. }
            | Self::Sell0 { .. }
            | Self::Sell1 { .. } => EventSource::Exchange,
            Self::ArbitrageLiquidation { .. } => EventSource::Orchestrator,
        }
    }

    /// SHA-256 of the bincode encoding
    pub fn hash(&self) -> [u8; 32] {
        let data = bincode::serialize(self).unwrap_or_default();
        Sha256::digest(&data).into()
    }
}

/// Emitting component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    /// Collateral ledger
    Ledger,
    /// Constant-product exchange
    Exchange,
    /// Liquidation orchestrator
    Orchestrator,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Append-only event log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<ProtocolEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn push(&mut self, event: ProtocolEvent) {
        tracing::trace!(event = event.event_type(), "event emitted");
        self.events.push(event);
        if self.events.len() > MAX_EVENT_LOG {
            self.events.drain(0..self.events.len() - MAX_EVENT_LOG);
        }
    }

    /// Get all events
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&ProtocolEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Most recent event
    pub fn last(&self) -> Option<&ProtocolEvent> {
        self.events.last()
    }

    /// Get the number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Chained digest over every event, in order
    pub fn digest(&self) -> [u8; 32] {
        self.events.iter().fold([0u8; 32], |acc, event| {
            let mut hasher = Sha256::new();
            hasher.update(acc);
            hasher.update(event.hash());
            hasher.finalize().into()
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit(amount: u128) -> ProtocolEvent {
        ProtocolEvent::Deposit {
            account: Address::from_label("alice"),
            amount,
        }
    }

    #[test]
    fn test_event_types() {
        assert_eq!(deposit(1).event_type(), "Deposit");
        assert_eq!(deposit(1).source(), EventSource::Ledger);

        let event = ProtocolEvent::ArbitrageLiquidation {
            liquidator: Address::from_label("bot"),
            liquidatee: Address::from_label("alice"),
            profit: 7,
        };
        assert_eq!(event.source(), EventSource::Orchestrator);
    }

    #[test]
    fn test_event_log_filter() {
        let mut log = EventLog::new();
        log.push(deposit(1));
        log.push(ProtocolEvent::Sell0 {
            trader: Address::from_label("bob"),
            amount0_in: 1,
            amount1_out: 1,
        });
        log.push(deposit(2));

        assert_eq!(log.len(), 3);
        assert_eq!(log.filter_by_type("Deposit").len(), 2);
        assert_eq!(log.last(), Some(&deposit(2)));
    }

    #[test]
    fn test_digest_depends_on_order() {
        let mut a = EventLog::new();
        a.push(deposit(1));
        a.push(deposit(2));

        let mut b = EventLog::new();
        b.push(deposit(2));
        b.push(deposit(1));

        assert_ne!(a.digest(), b.digest());
        assert_eq!(EventLog::new().digest(), [0u8; 32]);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_string(&deposit(5)).unwrap();
        assert!(json.contains("\"type\":\"Deposit\""));
    }
}
