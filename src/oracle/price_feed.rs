//! Price feed implementation.
//!
//! This module provides the price source consulted by the collateral ledger:
//! - The [`PriceSource`] interface (signed price plus its precision)
//! - A mutable [`PriceFeed`] stub with a bounded update history

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::constants::*;
use crate::utils::validation::validate_decimals;

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// A single price observation.
///
/// `price` is the amount of collateral asset (in `decimals` fixed-point) that
/// one whole unit of the borrowable asset is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceData {
    /// Signed fixed-point price
    pub price: i128,
    /// Decimal places of `price`
    pub decimals: u8,
    /// Host timestamp when recorded
    pub timestamp: u64,
}

impl PriceData {
    /// Create a new price observation
    pub fn new(price: i128, decimals: u8, timestamp: u64) -> Self {
        Self {
            price,
            decimals,
            timestamp,
        }
    }

    /// Check whether the price is usable by the ledger
    pub fn is_negative(&self) -> bool {
        self.price < 0
    }

    /// Get age of price in seconds
    pub fn age(&self, current_time: u64) -> u64 {
        current_time.saturating_sub(self.timestamp)
    }
}

impl Default for PriceData {
    fn default() -> Self {
        Self {
            price: 0,
            decimals: DEFAULT_PRICE_DECIMALS,
            timestamp: 0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// External price collaborator
pub trait PriceSource {
    /// Latest price and its precision
    fn latest_price(&self) -> PriceData;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// Mutable price stub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeed {
    /// Current price
    current: PriceData,
    /// Previous price (for change detection)
    previous: PriceData,
    /// Price history
    history: Vec<PriceData>,
    /// Maximum history size
    max_history: usize,
}

impl Default for PriceFeed {
    fn default() -> Self {
        Self {
            current: PriceData::default(),
            previous: PriceData::default(),
            history: Vec::new(),
            max_history: 100,
        }
    }
}

impl PriceFeed {
    /// Create a feed with an initial price
    pub fn new(price: i128, decimals: u8) -> Result<Self> {
        validate_decimals(decimals, "price_decimals")?;
        let initial = PriceData::new(price, decimals, 0);
        Ok(Self {
            current: initial,
            previous: initial,
            history: vec![initial],
            ..Self::default()
        })
    }

    /// Set a new price. Negative prices are stored as-is; the ledger rejects them.
    pub fn set_price(&mut self, price: i128, timestamp: u64) {
        let data = PriceData::new(price, self.current.decimals, timestamp);
        self.previous = self.current;
        self.current = data;
        self.history.push(data);
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }
        tracing::debug!(price, timestamp, "price updated");
    }

    /// Get previous price
    pub fn previous_price(&self) -> &PriceData {
        &self.previous
    }

    /// Recorded history, oldest first
    pub fn history(&self) -> &[PriceData] {
        &self.history
    }

    /// Get price change in basis points relative to the previous observation
    pub fn price_change_bps(&self) -> i128 {
        if self.previous.price == 0 {
            return 0;
        }
        (self.current.price - self.previous.price) * BPS_DIVISOR as i128 / self.previous.price
    }
}

impl PriceSource for PriceFeed {
    fn latest_price(&self) -> PriceData {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_price_tracks_previous() {
        let mut feed = PriceFeed::new(500, 18).unwrap();
        feed.set_price(1000, 10);

        assert_eq!(feed.latest_price().price, 1000);
        assert_eq!(feed.latest_price().decimals, 18);
        assert_eq!(feed.previous_price().price, 500);
        assert_eq!(feed.price_change_bps(), 10_000);
    }

    #[test]
    fn test_negative_price_is_stored() {
        let mut feed = PriceFeed::new(500, 8).unwrap();
        feed.set_price(-1, 1);
        assert!(feed.latest_price().is_negative());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut feed = PriceFeed::new(1, 8).unwrap();
        for i in 0..150 {
            feed.set_price(i, i as u64);
        }
        assert_eq!(feed.history().len(), 100);
        assert_eq!(feed.history().last().unwrap().price, 149);
    }

    #[test]
    fn test_rejects_oversized_decimals() {
        assert!(PriceFeed::new(1, 39).is_err());
    }
}
