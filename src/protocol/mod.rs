//! Protocol module - transactional host and orchestration.
//!
//! This module provides the state machine that executes every ledger,
//! exchange and orchestrator operation atomically, together with the
//! operation and event types it consumes and produces.

pub mod events;
pub mod operations;
pub mod state_machine;

pub use events::*;
pub use operations::*;
pub use state_machine::*;
