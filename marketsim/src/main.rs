//! Marketplace agent simulation CLI.
//!
//! Runs simulated job posters and service providers against the in-memory
//! marketplace and writes the final report plus a world snapshot.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use marketsim::core::types::RunStatus;
use marketsim::execute::Backends;
use marketsim::exit_codes;
use marketsim::io::config::{DEFAULT_CONFIG_PATH, SimConfig, load_config, write_config};
use marketsim::io::decision::{CommandDecisionService, DecisionService};
use marketsim::io::memory_backend::InMemoryBackend;
use marketsim::io::report::write_run_artifacts;
use marketsim::logging;
use marketsim::simulate::{IterationSummary, run_simulation};

#[derive(Parser)]
#[command(
    name = "marketsim",
    version,
    about = "Multi-role marketplace agent simulation"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Load and validate the config file.
    Check {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Run one simulation.
    Run(RunArgs),
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
struct RunArgs {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Consult the configured decision command before the priority tables.
    #[arg(long)]
    llm: bool,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    max_iterations: Option<u32>,
    /// Pause between actor turns, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,
    /// Keep provisioned identities after the run.
    #[arg(long)]
    skip_cleanup: bool,
    /// Directory for report.json and world.json.
    #[arg(long, default_value = "marketsim-out")]
    out: PathBuf,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match dispatch(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn dispatch(command: Command) -> Result<i32> {
    match command {
        Command::Init { force, config } => cmd_init(&config, force),
        Command::Check { config } => cmd_check(&config),
        Command::Run(args) => cmd_run(&args),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &SimConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_check(path: &Path) -> Result<i32> {
    let config = load_config(path)?;
    println!(
        "config ok: {} poster(s), {} provider(s), {} job template(s), llm {}",
        config.actors.posters(),
        config.actors.service_provider,
        config.job_catalog.len(),
        if config.llm.enabled { "on" } else { "off" }
    );
    Ok(exit_codes::OK)
}

fn cmd_run(args: &RunArgs) -> Result<i32> {
    let config = resolve_config(args)?;
    let seed = config
        .run
        .seed
        .unwrap_or_else(|| rand::thread_rng().r#gen());
    info!(seed, "starting simulation");
    let mut rng = StdRng::seed_from_u64(seed);

    let backend = InMemoryBackend::new();
    let command_service = if config.llm.enabled {
        Some(
            CommandDecisionService::new(
                &config.llm.command,
                Duration::from_secs(config.llm.timeout_secs),
                config.llm.output_limit_bytes,
            )
            .context("configure decision command")?,
        )
    } else {
        None
    };
    let decision = command_service
        .as_ref()
        .map(|service| service as &dyn DecisionService);

    let backends = Backends {
        tools: &backend,
        identities: &backend,
    };
    let outcome = run_simulation(&config, backends, decision, &mut rng, &mut print_progress)?;
    let artifacts = write_run_artifacts(&args.out, &outcome.report, &outcome.state)?;

    let report = &outcome.report;
    println!(
        "{:?} after {} iteration(s) (seed {seed}): jobs={} applications={} offers={} reviews={} errors={}",
        report.status,
        report.iterations,
        report.counts.jobs,
        report.counts.applications,
        report.counts.offers,
        report.counts.reviews,
        report.error_count
    );
    for error in &report.errors {
        println!("  error: {error}");
    }
    println!("report: {}", artifacts.report.display());

    Ok(match report.status {
        RunStatus::Failed => exit_codes::RUN_FAILED,
        _ => exit_codes::OK,
    })
}

/// Config file values overridden by command-line flags.
fn resolve_config(args: &RunArgs) -> Result<SimConfig> {
    let mut config = load_config(&args.config)?;
    if args.llm {
        config.llm.enabled = true;
    }
    if let Some(seed) = args.seed {
        config.run.seed = Some(seed);
    }
    if let Some(max_iterations) = args.max_iterations {
        config.run.max_iterations = max_iterations;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.run.turn_delay_ms = delay_ms;
    }
    if args.skip_cleanup {
        config.run.skip_cleanup = true;
    }
    config.validate().context("invalid run options")?;
    Ok(config)
}

fn print_progress(summary: &IterationSummary) {
    println!(
        "iteration {:>3}: turns={} ok={} failed={} waiting={} skipped={} | jobs={} applications={} offers={} reviews={} errors={}",
        summary.iteration,
        summary.turns,
        summary.succeeded,
        summary.failed,
        summary.waiting,
        summary.skipped,
        summary.counts.jobs,
        summary.counts.applications,
        summary.counts.offers,
        summary.counts.reviews,
        summary.errors
    );
}
