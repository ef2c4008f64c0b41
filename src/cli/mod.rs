//! flashliq command-line simulator.
//!
//! Replays JSON scripts of protocol operations through the state machine
//! and reports each outcome.

pub mod config;
pub mod output;

pub use config::*;
pub use output::*;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::error::Error;
use crate::protocol::operations::{OperationResult, ProtocolOperation};
use crate::protocol::state_machine::ProtocolStateMachine;

// ═══════════════════════════════════════════════════════════════════════════════
// SCRIPT
// ═══════════════════════════════════════════════════════════════════════════════

/// A block of operations sharing a height and timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptBlock {
    /// Timestamp recorded with price updates in this block
    pub timestamp: u64,
    /// Operations, executed in order
    pub operations: Vec<ProtocolOperation>,
}

/// A replayable simulation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Script {
    /// Keep going after a failed operation
    pub continue_on_error: bool,
    /// Blocks, executed in order starting at height 1
    pub blocks: Vec<ScriptBlock>,
}

impl Script {
    /// Load from a JSON file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Io(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse from JSON text
    pub fn parse(content: &str) -> CliResult<Self> {
        serde_json::from_str(content).map_err(|e| CliError::InvalidArgument(e.to_string()))
    }

    /// Total number of operations
    pub fn len(&self) -> usize {
        self.blocks.iter().map(|b| b.operations.len()).sum()
    }

    /// Check if the script has no operations
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one scripted operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// Block height
    pub height: u64,
    /// Operation type name
    pub operation: &'static str,
    /// Result when committed
    pub result: Option<OperationResult>,
    /// Error when rolled back
    pub error: Option<StepError>,
}

/// Error details of a rolled-back step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepError {
    pub code: u32,
    pub message: String,
}

impl From<&Error> for StepError {
    fn from(e: &Error) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

/// Summary of a script run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptReport {
    /// Per-operation outcomes, in execution order
    pub steps: Vec<StepOutcome>,
    /// Events emitted, as one-line descriptions, per block
    pub events: Vec<Vec<String>>,
    /// Whether execution stopped at a failure
    pub aborted: bool,
}

impl ScriptReport {
    /// Count of committed operations
    pub fn committed(&self) -> usize {
        self.steps.iter().filter(|s| s.result.is_some()).count()
    }

    /// Count of rolled-back operations
    pub fn failed(&self) -> usize {
        self.steps.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Run every block of `script` through `sm`
pub fn run_script(sm: &mut ProtocolStateMachine, script: &Script) -> CliResult<ScriptReport> {
    let mut report = ScriptReport::default();

    for (index, block) in script.blocks.iter().enumerate() {
        let height = index as u64 + 1;
        sm.begin_block(height, block.timestamp)
            .map_err(|e| CliError::Execution(e.to_string()))?;

        for op in &block.operations {
            let operation = op.operation_type();
            let step = match sm.execute(op.clone()) {
                Ok(result) => StepOutcome {
                    height,
                    operation,
                    result: Some(result),
                    error: None,
                },
                Err(e) => StepOutcome {
                    height,
                    operation,
                    result: None,
                    error: Some(StepError::from(&e)),
                },
            };
            let failed = step.error.is_some();
            report.steps.push(step);

            if failed && !script.continue_on_error {
                report.aborted = true;
                break;
            }
        }

        let events = sm
            .end_block()
            .map_err(|e| CliError::Execution(e.to_string()))?;
        report
            .events
            .push(events.events().iter().map(describe_event).collect());

        if report.aborted {
            break;
        }
    }

    Ok(report)
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLI RESULT
// ═══════════════════════════════════════════════════════════════════════════════

/// CLI Error types
#[derive(Debug, Clone, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Command execution error
    #[error("Execution error: {0}")]
    Execution(String),
    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

/// CLI Result type
pub type CliResult<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Deployment, ProtocolParams};
    use crate::utils::address::Address;

    fn machine() -> ProtocolStateMachine {
        let config = SimulatorConfig::default();
        ProtocolStateMachine::new(config.params, config.deployment, config.initial_price).unwrap()
    }

    fn script_json(continue_on_error: bool) -> String {
        let alice = Address::from_label("alice").to_hex();
        format!(
            r#"{{
                "continue_on_error": {continue_on_error},
                "blocks": [
                    {{"timestamp": 10, "operations": [
                        {{"Faucet": {{"asset": "Collateral", "to": "{alice}", "amount": 100}}}},
                        {{"Deposit": {{"caller": "{alice}", "amount": 100}}}},
                        {{"SetPrice": {{"price": 7}}}}
                    ]}},
                    {{"timestamp": 20, "operations": [
                        {{"SetPrice": {{"price": 8}}}}
                    ]}}
                ]
            }}"#
        )
    }

    #[test]
    fn test_run_script_stops_at_failure() {
        let script = Script::parse(&script_json(false)).unwrap();
        assert_eq!(script.len(), 4);

        let mut sm = machine();
        let report = run_script(&mut sm, &script).unwrap();

        assert!(report.aborted);
        assert_eq!(report.committed(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.steps[1].error.as_ref().map(|e| e.code), Some(4001));
        assert_eq!(report.events.len(), 1);
    }

    #[test]
    fn test_run_script_continue_on_error() {
        let script = Script::parse(&script_json(true)).unwrap();
        let mut sm = machine();
        let report = run_script(&mut sm, &script).unwrap();

        assert!(!report.aborted);
        assert_eq!(report.committed(), 3);
        assert_eq!(report.events.len(), 2);
        assert_eq!(sm.state().block_height, 2);
    }

    #[test]
    fn test_bad_script_rejected() {
        assert!(matches!(Script::parse("{\"blocks\": 3}"), Err(CliError::InvalidArgument(_))));
        assert!(Script::parse("{}").unwrap().is_empty());
    }

    #[test]
    fn test_default_machine_matches_params() {
        let sm = machine();
        assert_eq!(sm.params(), &ProtocolParams::default());
        assert_eq!(sm.deployment(), &Deployment::default());
    }
}
