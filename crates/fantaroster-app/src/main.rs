// Fantaroster entry point.
//
// `serve` startup sequence:
// 1. Initialize tracing
// 2. Load config (copying defaults on first run)
// 3. Open the roster store
// 4. Spawn WebSocket server task
// 5. Spawn app logic task
// 6. Wait for Ctrl+C, then shut both down
//
// The other subcommands run one batch stage over files and exit.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use fantaroster_app::{app, commands, config, ws_server};
use fantaroster_core::roster::RosterStore;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "fantaroster")]
#[command(about = "Fantasy football roster manager and stats pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the roster WebSocket service
    Serve,
    /// Collapse per-match rows into per-player season summaries
    Summarize {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Enrich a player list with stat fields matched by name
    Reconcile {
        /// Stats dataset (one row per player)
        #[arg(long)]
        stats: PathBuf,
        /// List to enrich (e.g. the quotation list)
        #[arg(long)]
        target: PathBuf,
        /// Defaults to <output_dir>/enriched_<timestamp>.csv
        #[arg(long)]
        output: Option<PathBuf>,
        /// Prepend fresh sequential ids to the output
        #[arg(long)]
        renumber: bool,
    },
    /// Replace the id column with sequential ids
    Renumber {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to rewriting the input
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "id")]
        id_field: String,
        /// Field delimiter (defaults to the roster delimiter)
        #[arg(long)]
        delimiter: Option<char>,
    },
    /// Rename header columns using the [rename] table
    RenameColumns {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to rewriting the input
        #[arg(long)]
        output: Option<PathBuf>,
        /// Field delimiter (defaults to the roster delimiter)
        #[arg(long)]
        delimiter: Option<char>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing()?;

    let config = config::load_config().context("failed to load configuration")?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Summarize { input, output } => {
            let groups = commands::summarize(&input, &output, &config.aggregate)?;
            println!("{groups} groups written to {}", output.display());
            Ok(())
        }
        Command::Reconcile {
            stats,
            target,
            output,
            renumber,
        } => {
            let output = output.unwrap_or_else(|| {
                commands::default_enriched_path(
                    Path::new(&config.reconcile.output_dir),
                    chrono::Local::now(),
                )
            });
            let report =
                commands::reconcile_files(&stats, &target, &output, &config.reconcile, renumber)?;
            println!(
                "{} rows written to {}: {} exact, {} by surname, {} fuzzy, {} unmatched, {} without a name, {} already filled",
                report.rows.len(),
                output.display(),
                report.exact,
                report.fallback,
                report.fuzzy,
                report.unmatched,
                report.missing_name,
                report.already_filled
            );
            for warning in &report.warnings {
                println!("  warning: {warning}");
            }
            Ok(())
        }
        Command::Renumber {
            input,
            output,
            id_field,
            delimiter,
        } => {
            let delimiter = delimiter_or(delimiter, config.roster.layout.delimiter)?;
            let output = output.unwrap_or_else(|| input.clone());
            let rows = commands::renumber_file(&input, &output, &id_field, delimiter)?;
            println!("{rows} rows renumbered in {}", output.display());
            Ok(())
        }
        Command::RenameColumns {
            input,
            output,
            delimiter,
        } => {
            if config.rename.is_empty() {
                warn!("[rename] table is empty, columns are copied unchanged");
            }
            let delimiter = delimiter_or(delimiter, config.roster.layout.delimiter)?;
            let output = output.unwrap_or_else(|| input.clone());
            let rows = commands::rename_file(&input, &output, &config.rename, delimiter)?;
            println!("{rows} rows rewritten to {}", output.display());
            Ok(())
        }
    }
}

async fn serve(config: config::Config) -> anyhow::Result<()> {
    let store = RosterStore::new(&config.roster.path, config.roster.layout.clone());
    info!("Roster store at {}", store.path().display());

    let listener = ws_server::bind(&config.server.host, config.server.port)
        .await
        .with_context(|| {
            format!(
                "failed to bind WebSocket server on {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let (ws_tx, ws_rx) = mpsc::channel(256);

    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(listener, ws_tx).await {
            error!("WebSocket server error: {}", e);
        }
    });

    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(ws_rx, app::AppState::new(store)).await {
            error!("Application loop error: {}", e);
        }
    });

    info!("Ready. Press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Shutdown requested");

    // The app loop exits once every sender is gone: the listener's on abort,
    // each connection's when its client leaves.
    ws_handle.abort();
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), app_handle).await;

    info!("Fantaroster shut down cleanly");
    Ok(())
}

fn delimiter_or(flag: Option<char>, fallback: u8) -> anyhow::Result<u8> {
    match flag {
        None => Ok(fallback),
        Some(c) if c.is_ascii() && c != '"' => Ok(c as u8),
        Some(c) => bail!("delimiter must be a single ASCII character other than a quote, got {c:?}"),
    }
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fantaroster=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
