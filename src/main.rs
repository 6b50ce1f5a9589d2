use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

mod cli;

use autoloop::config::Config;
use autoloop::daemon::LoopStatusView;
use autoloop::storage::LoopStatsSummary;
use cli::Cli;
use cli::commands::Commands;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autoloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("autoloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run { report_secs, force } => handle_run_command(*report_secs, force.as_ref(), config),
        Commands::Stats => handle_stats_command(config),
        Commands::CheckConfig => handle_check_config_command(config),
    }
}

fn print_status(status: &LoopStatusView) {
    println!("{} {}", "Status:".cyan(), status.summary());
    if let Some(decision) = status.recent_decisions.last() {
        let verdict = if decision.acted { "act".green() } else { "wait".normal() };
        println!("  last decision: {:.2} {} ({})", decision.score, verdict, decision.reason);
    }
    if status.gather_failures > 0 || status.persistence_failures > 0 {
        println!(
            "  {} gather={} persistence={}",
            "failures:".yellow(),
            status.gather_failures,
            status.persistence_failures
        );
    }
}

fn handle_run_command(report_secs: u64, force: Option<&Option<String>>, config: &Config) -> Result<()> {
    info!("Running control loop (report every {}s)", report_secs);
    let control = config.build_loop().context("Failed to build control loop")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(async {
        control.start().await;
        println!("{} (Ctrl-C to stop)", "Control loop started".green());

        if let Some(kind) = force {
            let result = control
                .force_action(kind.as_deref())
                .await
                .context("Forced action failed")?;
            let outcome = if result.success { "succeeded".green() } else { "failed".red() };
            println!("{} {} {}", "Forced:".cyan(), result.kind, outcome);
        }

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut ticker = (report_secs > 0).then(|| tokio::time::interval(Duration::from_secs(report_secs)));

        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    result.context("Failed to listen for Ctrl-C")?;
                    break;
                }
                _ = async {
                    match ticker.as_mut() {
                        Some(ticker) => { ticker.tick().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => print_status(&control.status()),
            }
        }

        println!("{}", "Stopping control loop...".yellow());
        control.stop().await;
        print_status(&control.status());
        Ok::<(), eyre::Report>(())
    })
}

fn print_stats(stats: &LoopStatsSummary) {
    println!("{}", "Loop statistics".bold());
    println!("  decisions:        {} ({} acted)", stats.total_decisions, stats.acted_decisions);
    println!("  average score:    {:.3}", stats.average_score);
    println!("  actions:          {} ({} succeeded)", stats.total_actions, stats.successful_actions);
    match stats.success_rate() {
        Some(rate) if rate >= 0.5 => println!("  success rate:     {}", format!("{:.2}", rate).green()),
        Some(rate) => println!("  success rate:     {}", format!("{:.2}", rate).red()),
        None => println!("  success rate:     -"),
    }
    println!("  average impact:   {:.3}", stats.average_impact);
    match stats.last_action_at {
        Some(at) => println!("  last action:      {}", at.to_rfc3339()),
        None => println!("  last action:      never"),
    }
}

fn handle_stats_command(config: &Config) -> Result<()> {
    info!(
        "Reading stats from {} store at {}",
        config.storage.backend,
        config.storage.dir.display()
    );
    let store = config.open_store().context("Failed to open store")?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let stats = runtime
        .block_on(store.stats())
        .context("Failed to read statistics")?;
    print_stats(&stats);
    Ok(())
}

fn handle_check_config_command(config: &Config) -> Result<()> {
    let loop_config = config.validate().context("Invalid configuration")?;
    info!("Configuration valid: {:?}", loop_config);

    println!("{}", "Configuration OK".green());
    let yaml = serde_yaml::to_string(config).context("Failed to render configuration")?;
    println!("{}", yaml);

    let missing = config.unregistered_kinds();
    if !missing.is_empty() {
        println!(
            "{} no action configured for: {}",
            "Warning:".yellow(),
            missing.join(", ")
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
