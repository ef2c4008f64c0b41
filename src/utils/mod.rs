//! Utility modules for flashliq.
//!
//! This module contains shared utilities used across the protocol:
//! - Addresses
//! - Checked fixed-point arithmetic and the decimal scaler
//! - Validation helpers
//! - Constants

pub mod address;
pub mod constants;
pub mod math;
pub mod validation;

pub use address::*;
pub use constants::*;
pub use math::*;
pub use validation::*;
