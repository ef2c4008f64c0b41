//! flashliq CLI
//!
//! Command-line simulator for the collateral ledger, the constant-product
//! exchange and the flash-loan liquidation orchestrator.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::{style, Term};

use flashliq::cli::{
    describe_result, format_amount, format_price, run_script, OutputFormat, OutputFormatter, Script,
    SimulatorConfig,
};
use flashliq::protocol::state_machine::ProtocolStateMachine;
use flashliq::utils::math::{constant_product_out, flash_fee, flash_repayment};

/// flashliq - collateralized lending with flash-loan liquidations
#[derive(Parser)]
#[command(name = "flashliq")]
#[command(version = flashliq::VERSION)]
#[command(about = "Simulator for the flashliq lending and liquidation protocol", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a JSON configuration file (default: ./flashliq.json when present)
    #[arg(short, long, env = "FLASHLIQ_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (text, json, json-pretty)
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Destination path (default: ./flashliq.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Replay a JSON script of operations
    Run {
        /// Script path
        script: PathBuf,
    },

    /// Quote a constant-product swap
    Quote {
        /// Amount sold
        #[arg(short, long)]
        amount: u128,

        /// Reserve of the asset sold
        #[arg(long)]
        reserve_in: u128,

        /// Reserve of the asset bought
        #[arg(long)]
        reserve_out: u128,
    },

    /// Flash-loan fee and repayment for an amount
    Fee {
        /// Loan amount
        #[arg(short, long)]
        amount: u128,
    },

    /// Collateral required to borrow an amount at a price
    Collateral {
        /// Amount to borrow, in borrowable precision
        #[arg(short, long)]
        borrow: u128,

        /// Price (collateral per borrowable unit), in price precision
        #[arg(short, long)]
        price: i128,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════════════════════

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    let output = OutputFormatter::new(cli.format);
    match &cli.command {
        Commands::Init { output: path, force } => {
            let path = path.clone().unwrap_or_else(SimulatorConfig::default_path);
            cmd_init(&path, *force, &output)
        }
        Commands::Run { script } => cmd_run(cli, script, &output, term),
        Commands::Quote {
            amount,
            reserve_in,
            reserve_out,
        } => cmd_quote(*amount, *reserve_in, *reserve_out, &output),
        Commands::Fee { amount } => cmd_fee(*amount, &output),
        Commands::Collateral { borrow, price } => cmd_collateral(cli, *borrow, *price, &output),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SimulatorConfig> {
    let path = SimulatorConfig::locate(cli.config.as_deref(), &std::env::current_dir()?);
    if let Some(path) = &path {
        tracing::debug!(path = %path.display(), "loading configuration");
    }
    Ok(SimulatorConfig::resolve(path.as_deref())?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_init(path: &Path, force: bool, output: &OutputFormatter) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    SimulatorConfig::from_env()?.save(path)?;
    output.success(&format!("Configuration written to {}", path.display()));
    Ok(())
}

fn cmd_run(cli: &Cli, script_path: &Path, output: &OutputFormatter, term: &Term) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let script = Script::load(script_path)?;

    let mut sm = ProtocolStateMachine::new(config.params.clone(), config.deployment, config.initial_price)?;
    if cli.verbose {
        output.info(&format!(
            "Replaying {} operations from {}",
            script.len(),
            script_path.display()
        ));
    }

    let report = run_script(&mut sm, &script)?;

    if output.format() != OutputFormat::Text {
        output.data(&report);
    } else {
        output.section("Operations");
        for step in &report.steps {
            match (&step.result, &step.error) {
                (Some(result), _) => {
                    let _ = term.write_line(&format!(
                        "  {} [{}] {} {}",
                        style("✓").green(),
                        step.height,
                        step.operation,
                        describe_result(result)
                    ));
                }
                (None, Some(err)) => {
                    let _ = term.write_line(&format!(
                        "  {} [{}] {} {} ({})",
                        style("✗").red(),
                        step.height,
                        step.operation,
                        err.message,
                        err.code
                    ));
                }
                (None, None) => {}
            }
        }

        output.section("Events");
        for (height, events) in report.events.iter().enumerate() {
            for event in events {
                let _ = term.write_line(&format!("  [{}] {}", height + 1, event));
            }
        }

        output.section("Summary");
        let stats = sm.statistics()?;
        let params = sm.params();
        output.kv("committed", &report.committed().to_string());
        output.kv("rolled back", &report.failed().to_string());
        output.kv("positions", &stats.accounts.to_string());
        output.kv(
            "total deposited",
            &format!(
                "{} {}",
                format_amount(stats.total_deposited, params.collateral_decimals),
                params.collateral_symbol
            ),
        );
        output.kv(
            "total borrowed",
            &format!(
                "{} {}",
                format_amount(stats.total_borrowed, params.borrow_decimals),
                params.borrow_symbol
            ),
        );
        output.kv("liquidatable", &stats.liquidatable_accounts.to_string());
        let (reserve0, reserve1) = sm.state().exchange.reserves();
        output.kv(
            "exchange reserves",
            &format!(
                "{} {} / {} {}",
                format_amount(reserve0, params.collateral_decimals),
                params.collateral_symbol,
                format_amount(reserve1, params.borrow_decimals),
                params.borrow_symbol
            ),
        );
    }

    if report.aborted {
        anyhow::bail!("script aborted after {} operations", report.steps.len());
    }
    Ok(())
}

fn cmd_quote(amount: u128, reserve_in: u128, reserve_out: u128, output: &OutputFormatter) -> anyhow::Result<()> {
    let amount_out = constant_product_out(amount, reserve_in, reserve_out)?;
    output.data(&serde_json::json!({
        "amount_in": amount.to_string(),
        "amount_out": amount_out.to_string(),
        "reserve_in_after": (reserve_in + amount).to_string(),
        "reserve_out_after": (reserve_out - amount_out).to_string(),
    }));
    if output.format() == OutputFormat::Text {
        output.kv("amount out", &amount_out.to_string());
        output.kv(
            "reserves after",
            &format!("{} / {}", reserve_in + amount, reserve_out - amount_out),
        );
    }
    Ok(())
}

fn cmd_fee(amount: u128, output: &OutputFormatter) -> anyhow::Result<()> {
    let fee = flash_fee(amount)?;
    let repayment = flash_repayment(amount)?;
    output.data(&serde_json::json!({
        "amount": amount.to_string(),
        "fee": fee.to_string(),
        "repayment": repayment.to_string(),
    }));
    if output.format() == OutputFormat::Text {
        output.kv("fee", &fee.to_string());
        output.kv("repayment", &repayment.to_string());
    }
    Ok(())
}

fn cmd_collateral(cli: &Cli, borrow: u128, price: i128, output: &OutputFormatter) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let params = config.params.clone();
    let sm = ProtocolStateMachine::new(config.params, config.deployment, price)?;
    let state = sm.state();
    let required = state.ledger.required_collateral(&state.oracle, borrow)?;

    output.data(&serde_json::json!({
        "borrow": borrow.to_string(),
        "price": price.to_string(),
        "ltv_bps": params.ltv_bps,
        "required_collateral": required.to_string(),
    }));
    if output.format() == OutputFormat::Text {
        output.kv(
            "borrow",
            &format!("{} {}", format_amount(borrow, params.borrow_decimals), params.borrow_symbol),
        );
        output.kv(
            "price",
            &format!(
                "{} {} per {}",
                format_price(price, params.price_decimals),
                params.collateral_symbol,
                params.borrow_symbol
            ),
        );
        output.kv("ltv", &format!("{} bps", params.ltv_bps));
        output.kv(
            "required collateral",
            &format!(
                "{} {} ({})",
                format_amount(required, params.collateral_decimals),
                params.collateral_symbol,
                required
            ),
        );
    }
    Ok(())
}
