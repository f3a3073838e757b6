//! COVENANT Escrow Reference Runtime: Demo CLI
//!
//! Runs one or all of the three escrow scenarios. Each scenario drives real
//! COVENANT components (agents, number ledger, dispatcher, hash-chained
//! mailboxes) with fictional parties.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- settlement
//!   cargo run -p demo -- rollback
//!   cargo run -p demo -- --config demo/covenant.toml board-notice

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use covenant_contracts::error::CovenantResult;
use covenant_ref_escrow::scenarios::{board_notice, rollback, settlement};
use covenant_settings::{CovenantConfig, Settings};

// ── CLI definition ────────────────────────────────────────────────────────────

/// COVENANT: agent authority for scripted contracts.
///
/// Each subcommand runs one or all of the escrow scenarios, showing how
/// agents sign, reserve and release transaction numbers, and receive
/// receipts on behalf of their parties.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "COVENANT escrow reference runtime demo",
    long_about = "Runs COVENANT escrow scenarios showing agent signing, transaction-number\n\
                  reservation and rollback, and receipt delivery to inboxes and nymboxes."
)]
struct Cli {
    /// Settings file. Created with defaults when missing; built-in defaults
    /// are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three escrow scenarios in sequence.
    RunAll,
    /// Scenario 1: Settlement (reserve, sign, finalize every party).
    Settlement,
    /// Scenario 2: Failed-step rollback (harvest and rejection notices).
    Rollback,
    /// Scenario 3: Board vote notice (voting group fan-out).
    BoardNotice,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let (config, settings) = match load_config(cli.config.as_ref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    // RUST_LOG wins over the configured filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_target(false)
        .compact()
        .init();
    info!(notary = %config.notary_id, persist = config.persist_numbers, "configuration loaded");

    if let Some(settings) = settings {
        if let Err(e) = settings.save() {
            warn!(error = %e, "could not write default settings");
        }
    }

    print_banner(&config);

    let result = match cli.command {
        Command::RunAll => run_all(&config),
        Command::Settlement => settlement::run_scenario(&config),
        Command::Rollback => rollback::run_scenario(&config),
        Command::BoardNotice => board_notice::run_scenario(&config),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Read the config from `path`, or use the defaults. The settings store is
/// returned when defaults were filled in and need writing back.
fn load_config(path: Option<&PathBuf>) -> CovenantResult<(CovenantConfig, Option<Settings>)> {
    let Some(path) = path else {
        return Ok((CovenantConfig::default(), None));
    };

    let mut settings = Settings::new(path);
    settings.load()?;
    let (config, wrote_default) = CovenantConfig::from_settings(&mut settings)?;
    Ok((config, wrote_default.then_some(settings)))
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all(config: &CovenantConfig) -> CovenantResult<()> {
    settlement::run_scenario(config)?;
    rollback::run_scenario(config)?;
    board_notice::run_scenario(config)?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner(config: &CovenantConfig) {
    println!();
    println!("COVENANT — Agent Authority for Scripted Contracts");
    println!("Escrow Reference Demo (notary {})", config.notary_id);
    println!("=================================================");
    println!();
    println!("Per contract pass:");
    println!("  [1] Loaded Nyms are bound to agents for this pass only");
    println!("  [2] Opening and closing numbers move from issued to in-use");
    println!("  [3] Agents sign; a voting group never signs for itself");
    println!("  [4] On failure, reserved numbers are harvested back to issued");
    println!("  [5] Final receipts and notices land in hash-chained inboxes and nymboxes");
    println!("  [6] Pass ends: every credential reference is cleared");
    println!();
}
