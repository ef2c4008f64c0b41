//! CLI Output Formatting.
//!
//! Handles output formatting for text and JSON, and renders fixed-point
//! amounts in whole units.

use console::style;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::protocol::events::ProtocolEvent;
use crate::protocol::operations::OperationResult;

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
    /// Pretty JSON format
    JsonPretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMATTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Output formatter for CLI
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create new formatter
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Get format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json | OutputFormat::JsonPretty)
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        self.status("success", &style("✓").green().to_string(), message);
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        if self.is_json() {
            self.print_json(&serde_json::json!({ "status": "error", "message": message }));
        } else {
            eprintln!("{} {}", style("✗").red(), message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        self.status("warning", &style("⚠").yellow().to_string(), message);
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        self.status("info", &style("→").cyan().to_string(), message);
    }

    /// Print key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.is_json() {
            self.print_json(&serde_json::json!({ key: value }));
        } else {
            println!("  {}: {}", style(key).bold(), value);
        }
    }

    /// Print section header
    pub fn section(&self, title: &str) {
        if !self.is_json() {
            println!();
            println!("{}", style(format!("=== {} ===", title)).cyan().bold());
        }
    }

    /// Print structured data (JSON formats only)
    pub fn data<T: Serialize>(&self, data: &T) {
        if self.is_json() {
            self.print_json(data);
        }
    }

    fn status(&self, status: &str, marker: &str, message: &str) {
        if self.is_json() {
            self.print_json(&serde_json::json!({ "status": status, "message": message }));
        } else {
            println!("{} {}", marker, message);
        }
    }

    fn print_json<T: Serialize>(&self, data: &T) {
        let output = if matches!(self.format, OutputFormat::JsonPretty) {
            serde_json::to_string_pretty(data)
        } else {
            serde_json::to_string(data)
        };

        if let Ok(json) = output {
            println!("{}", json);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FORMATTING HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Render a fixed-point amount in whole units, trimming trailing zeros.
///
/// Falls back to the raw integer when the value exceeds `Decimal`'s range.
pub fn format_amount(amount: u128, decimals: u8) -> String {
    i128::try_from(amount)
        .ok()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, decimals as u32).ok())
        .map(|d| d.normalize().to_string())
        .unwrap_or_else(|| amount.to_string())
}

/// Render a signed fixed-point price in whole units
pub fn format_price(price: i128, decimals: u8) -> String {
    Decimal::try_from_i128_with_scale(price, decimals as u32)
        .map(|d| d.normalize().to_string())
        .unwrap_or_else(|_| price.to_string())
}

/// One-line description of an operation result
pub fn describe_result(result: &OperationResult) -> String {
    match result {
        OperationResult::Done => "ok".into(),
        OperationResult::Seized { collateral } => format!("seized {} collateral", collateral),
        OperationResult::Shares { shares } => format!("minted {} shares", shares),
        OperationResult::Withdrawn { amount0, amount1 } => {
            format!("withdrew {} / {}", amount0, amount1)
        }
        OperationResult::Swapped { amount_out } => format!("received {}", amount_out),
        OperationResult::Profit { profit } => format!("profit {}", profit),
    }
}

/// One-line description of an event
pub fn describe_event(event: &ProtocolEvent) -> String {
    match event {
        ProtocolEvent::Deposit { account, amount }
        | ProtocolEvent::Borrow { account, amount }
        | ProtocolEvent::Repay { account, amount }
        | ProtocolEvent::Withdraw { account, amount } => {
            format!("{} {} amount={}", event.event_type(), account, amount)
        }
        ProtocolEvent::Liquidate {
            liquidator,
            user,
            debt_amount,
            collateral_amount,
        } => format!(
            "Liquidate {} by {} debt={} collateral={}",
            user, liquidator, debt_amount, collateral_amount
        ),
        ProtocolEvent::Initialized {
            provider,
            amount0,
            amount1,
            shares,
        }
        | ProtocolEvent::Mint {
            provider,
            amount0,
            amount1,
            shares,
        } => format!(
            "{} {} amount0={} amount1={} shares={}",
            event.event_type(),
            provider,
            amount0,
            amount1,
            shares
        ),
        ProtocolEvent::Burn {
            provider,
            shares,
            amount0,
            amount1,
        } => format!(
            "Burn {} shares={} amount0={} amount1={}",
            provider, shares, amount0, amount1
        ),
        ProtocolEvent::Sell0 {
            trader,
            amount0_in,
            amount1_out,
        } => format!("Sell0 {} in={} out={}", trader, amount0_in, amount1_out),
        ProtocolEvent::Sell1 {
            trader,
            amount1_in,
            amount0_out,
        } => format!("Sell1 {} in={} out={}", trader, amount1_in, amount0_out),
        ProtocolEvent::ArbitrageLiquidation {
            liquidator,
            liquidatee,
            profit,
        } => format!(
            "ArbitrageLiquidation {} by {} profit={}",
            liquidatee, liquidator, profit
        ),
    }
}
