//! Oracle module for price feeds.
//!
//! The ledger reads prices through the [`PriceSource`] trait; [`PriceFeed`]
//! is the mutable stub used by the state machine, the simulator and tests.

pub mod price_feed;

pub use price_feed::*;
