//! chat-migrate CLI - MongoDB chat data to PostgreSQL and ScyllaDB.

use chat_migrate::{
    Config, CountStatus, MigrateError, MigrationResult, Orchestrator, PipelineKind,
    ReconciliationReport,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "chat-migrate")]
#[command(about = "Migrate chat conversations and messages from MongoDB to PostgreSQL and ScyllaDB")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

/// Which pipeline(s) to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PipelineArg {
    Conversations,
    Messages,
    All,
}

impl PipelineArg {
    fn kinds(self) -> Vec<PipelineKind> {
        match self {
            PipelineArg::Conversations => vec![PipelineKind::Conversations],
            PipelineArg::Messages => vec![PipelineKind::Messages],
            PipelineArg::All => PipelineKind::ALL.to_vec(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration
    Run {
        /// Pipeline to run
        #[arg(long, value_enum, default_value = "all")]
        pipeline: PipelineArg,

        /// Override the primary-relation flush threshold
        #[arg(long)]
        batch_size: Option<usize>,

        /// Reconcile counts after the run
        #[arg(long)]
        verify: bool,

        /// Map and count into memory without writing to any destination
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare source and destination counts without migrating
    Validate {
        /// Pipeline to check
        #[arg(long, value_enum, default_value = "all")]
        pipeline: PipelineArg,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            pipeline,
            batch_size,
            verify,
            dry_run,
        } => {
            if let Some(n) = batch_size {
                config.migration.batch_size = n;
            }
            if verify {
                config.migration.verify = true;
            }
            config.validate()?;

            let cancel_token = setup_signal_handler().await?;
            let orchestrator = Orchestrator::new(config).with_cancel(cancel_token);
            let results = orchestrator.run(&pipeline.kinds(), dry_run).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                let status_msg = if dry_run { "Dry run completed!" } else { "Migration completed!" };
                println!("\n{}", status_msg);
                for result in &results {
                    print_result(result);
                }
            }
        }

        Commands::Validate { pipeline } => {
            let orchestrator = Orchestrator::new(config);
            let reports = orchestrator.validate(&pipeline.kinds()).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    print_report(report);
                }
                println!("\nValidation completed");
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config);
            let result = orchestrator.health_check().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                for store in &result.stores {
                    println!(
                        "  {}: {} ({}ms)",
                        store.store,
                        if store.connected { "OK" } else { "FAILED" },
                        store.latency_ms
                    );
                    if let Some(ref err) = store.error {
                        println!("    Error: {}", err);
                    }
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::connection(
                    "health-check",
                    "one or more stores are unreachable",
                ));
            }
        }
    }

    Ok(())
}

fn print_result(result: &MigrationResult) {
    println!("  Pipeline: {}", result.pipeline);
    println!("    Duration: {:.2}s", result.duration_seconds);
    println!(
        "    Documents: {} (~{} estimated)",
        result.documents_processed, result.documents_estimated
    );
    println!("    Flushes: {}", result.flushes);
    for (relation, rows) in &result.rows {
        println!("    {}: {} rows", relation, rows);
    }
    println!("    Throughput: {} docs/sec", result.documents_per_second);
    if let Some(ref report) = result.reconciliation {
        print_report(report);
    }
}

fn print_report(report: &ReconciliationReport) {
    println!("  Reconciliation ({}):", report.pipeline);
    for count in &report.relations {
        let status = match count.status {
            CountStatus::Match => "match",
            CountStatus::Mismatch => "MISMATCH",
            CountStatus::Unchecked => "unchecked",
            CountStatus::Unavailable => "unavailable",
        };
        let source = count
            .source
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let destination = count
            .destination
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "    {}: source={} destination={} ({})",
            count.relation, source, destination, status
        );
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Invalid verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Invalid log format '{}'", other)),
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
async fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token_int = cancel_token.clone();
    tokio::spawn(async move {
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Stopping after the current document...");
        token_int.cancel();
    });

    let token_term = cancel_token.clone();
    tokio::spawn(async move {
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Stopping after the current document...");
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current document...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
