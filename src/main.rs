//! # Intake CLI (`intake`)
//!
//! The `intake` binary runs single scan passes, reports what has been
//! integrated, and runs the periodic watcher on its own, behind an HTTP
//! status API, or alongside an interactive shell.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `intake scan` | Run one pass and print what was integrated |
//! | `intake stats` | Print integration statistics |
//! | `intake files` | List integrated files |
//! | `intake watch` | Poll the watched folder until Ctrl-C |
//! | `intake serve` | Watch and expose the HTTP status API |
//! | `intake shell` | Watch and accept interactive commands |
//! | `intake completions <shell>` | Print shell completions |
//!
//! Logging goes to stderr and follows `RUST_LOG` (e.g. `RUST_LOG=intake=debug`).

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use intake::commands::{Command, CommandOutput};
use intake::config::{self, Config};
use intake::integrator::Integrator;
use intake::progress::ProgressMode;
use intake::server::{self, AppState};
use intake::watcher::{WatchSchedule, Watcher};
use intake::{scan, shell, stats};

const DEFAULT_CONFIG: &str = "./config/intake.toml";

/// Intake — a content-addressed directory watcher that incrementally
/// integrates new files.
#[derive(Parser)]
#[command(name = "intake", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/intake.toml`; when that file does not exist the
    /// built-in defaults are used (watch `./training_data`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// How integration events are reported on stderr.
    ///
    /// Defaults to `human` when stderr is a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scan pass over the watched folder.
    Scan,

    /// Show integration statistics.
    Stats,

    /// List integrated files with their extraction summaries.
    Files,

    /// Poll the watched folder until interrupted.
    ///
    /// Each pass integrates files whose content has not been seen before,
    /// then waits `watch.interval_secs` before the next one.
    Watch {
        /// Also serve the HTTP status API on `[server].bind`.
        #[arg(long)]
        serve: bool,
    },

    /// Watch and serve the HTTP status API.
    Serve,

    /// Watch and accept interactive commands (type `help`).
    Shell,

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

impl Commands {
    fn long_running(&self) -> bool {
        matches!(self, Commands::Watch { .. } | Commands::Serve | Commands::Shell)
    }
}

fn init_logging(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "intake", &mut std::io::stdout());
        return Ok(());
    }

    init_logging(if cli.command.long_running() {
        "intake=info"
    } else {
        "intake=warn"
    });

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let cfg = config::load_or_default(&config_path, cli.config.is_some())?;
    let mode = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Scan => run_scan(cfg)?,
        Commands::Stats => stats::print_stats(&Integrator::open(cfg)),
        Commands::Files => {
            let integrator = Integrator::open(cfg);
            if let Some(output) = Command::Files.execute(&integrator)? {
                print!("{}", output);
            }
        }
        Commands::Watch { serve } => run_watch(cfg, mode, serve).await?,
        Commands::Serve => run_watch(cfg, mode, true).await?,
        Commands::Shell => run_shell(cfg, mode).await?,
        Commands::Completions { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}

fn run_scan(cfg: Config) -> anyhow::Result<()> {
    let integrator = Integrator::open(cfg);
    let result = integrator
        .scan_once()
        .with_context(|| format!("scan of {} failed", integrator.watched_root().display()))?;
    print!("{}", CommandOutput::Scan { result });
    Ok(())
}

fn build_watcher(cfg: Config, mode: ProgressMode) -> anyhow::Result<Arc<Watcher>> {
    scan::check_root(&cfg.watch.root)
        .with_context(|| "cannot start watcher (create the folder or set watch.root)")?;
    let schedule = WatchSchedule::from_config(&cfg.watch);
    let integrator = Arc::new(Integrator::open(cfg));
    let watcher = Arc::new(Watcher::new(integrator, schedule, mode.reporter()));
    watcher.start()?;
    Ok(watcher)
}

async fn stop_watcher(watcher: &Watcher) {
    if let Err(e) = watcher.stop().await {
        warn!(error = %e, "final state flush failed");
    }
    let stats = watcher.integrator().stats();
    println!(
        "Stopped. {} file(s) integrated, state saved to {}",
        stats.total_integrated,
        watcher.integrator().config().watch.state_path.display()
    );
}

async fn run_watch(cfg: Config, mode: ProgressMode, serve: bool) -> anyhow::Result<()> {
    let bind = cfg.server.bind.clone();
    let interval = cfg.watch.interval_secs;
    let watcher = build_watcher(cfg, mode)?;

    let stats = watcher.integrator().stats();
    println!(
        "Watching {} every {}s ({} file(s) already integrated). Press Ctrl-C to stop.",
        stats.watching_folder, interval, stats.total_integrated
    );

    let outcome = if serve {
        server::run_server(&bind, AppState::new(watcher.clone()), ctrl_c()).await
    } else {
        ctrl_c().await;
        Ok(())
    };

    stop_watcher(&watcher).await;
    outcome
}

async fn run_shell(cfg: Config, mode: ProgressMode) -> anyhow::Result<()> {
    let watcher = build_watcher(cfg, mode)?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let outcome = shell::run_shell(watcher.clone(), stdin, &mut std::io::stdout(), ctrl_c()).await;
    stop_watcher(&watcher).await;
    outcome
}
