#![warn(missing_docs)]
//! Joulecast CLI Library
//!
//! Command-line surface of the measurement study. Subcommands map straight
//! onto the core: `run` drives the orchestrator over the full or filtered
//! matrix, `trial` executes one trial of one condition, `report` aggregates
//! whatever the result store holds, and `list` shows stored progress.

mod browser;
mod config;
mod orchestrator;
mod planner;

pub use browser::BrowserLauncher;
pub use config::{
    BrowserConfig, ExperimentConfig, OutputConfig, PlatformConfig, SamplerConfig, StudyConfig,
};
pub use orchestrator::{
    EpisodeUrls, ExperimentOrchestrator, OrchestratorError, RunOutcome, Schedule,
};
pub use planner::{ExecutionPlan, build_plan};

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use joulecast_core::{CancelFlag, Condition, EnergySampler, TrialRunner, TrialSpec};
use joulecast_report::{
    ConditionReport, OutputFormat, RunReport, format_human_report, generate_csv_report,
    generate_json_report,
};
use joulecast_store::ResultStore;

/// Joulecast CLI arguments
#[derive(Parser, Debug)]
#[command(name = "joulecast")]
#[command(author, version, about = "Joulecast - media playback energy measurement study")]
pub struct Cli {
    /// Optional subcommand; defaults to running the full matrix
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (default: discover joulecast.toml upwards)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Results directory (overrides configuration)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the condition matrix with stored progress
    List,
    /// Run the full or filtered condition matrix (default)
    Run {
        /// Filter conditions by regex over their names
        #[arg(default_value = ".*")]
        filter: String,

        /// Success target per condition (overrides configuration)
        #[arg(long)]
        runs: Option<u32>,

        /// Execute the full trial state machine without the external sampler
        #[arg(long)]
        dry_run: bool,
    },
    /// Run a single condition for one trial
    Trial {
        /// Condition name, e.g. chrome_spotify_1x
        condition: String,

        /// Execute the trial without the external sampler
        #[arg(long)]
        dry_run: bool,
    },
    /// Aggregate stored results into a report
    Report {
        /// Output format: human, json, csv (default from configuration)
        #[arg(long)]
        format: Option<String>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a default joulecast.toml to stdout
    InitConfig,
}

/// Run the joulecast CLI. This is the binary's entry point.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(Cli::parse())
}

/// Run the joulecast CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("joulecast=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("joulecast=info")
            .init();
    }

    install_interrupt_handler();

    let config = match &cli.config {
        Some(path) => StudyConfig::load(path)
            .with_context(|| format!("could not load configuration {}", path.display()))?,
        None => StudyConfig::discover().unwrap_or_default(),
    };
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.directory));

    match cli.command {
        Some(Commands::List) => cmd_list(&config, &output_dir),
        Some(Commands::Run {
            ref filter,
            runs,
            dry_run,
        }) => cmd_run(&config, &output_dir, filter, runs, dry_run),
        Some(Commands::Trial {
            ref condition,
            dry_run,
        }) => cmd_trial(&config, &output_dir, condition, dry_run),
        Some(Commands::Report { ref format, ref output }) => {
            cmd_report(&config, &output_dir, format.as_deref(), output.as_deref())
        }
        Some(Commands::InitConfig) => {
            print!("{}", StudyConfig::default_toml());
            Ok(())
        }
        None => cmd_run(&config, &output_dir, ".*", None, false),
    }
}

fn cmd_list(config: &StudyConfig, output_dir: &std::path::Path) -> anyhow::Result<()> {
    let store = ResultStore::open(output_dir)?;
    let state = store.load_state()?;
    let target = config.experiment.runs_per_config;

    println!("Condition matrix (target {target} successful trials each):");
    for condition in Condition::matrix() {
        let progress = state.progress(&condition.name());
        println!(
            "  {:<22} {:>3}/{} successful, {} attempt(s)",
            condition.name(),
            progress.successes,
            target,
            progress.attempts
        );
    }
    Ok(())
}

fn cmd_run(
    config: &StudyConfig,
    output_dir: &std::path::Path,
    filter: &str,
    runs: Option<u32>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let re = regex::Regex::new(filter).with_context(|| format!("invalid filter: {filter}"))?;
    let plan = build_plan(Some(&re));
    if plan.conditions.is_empty() {
        anyhow::bail!(
            "no condition matches '{}'; available: {}",
            filter,
            condition_names().join(", ")
        );
    }

    let target = runs.unwrap_or(config.experiment.runs_per_config);
    let schedule = Schedule {
        runs_per_config: target,
        max_attempts: config
            .experiment
            .max_attempts_per_config
            .unwrap_or_else(|| target.saturating_mul(2)),
        measurement: config.measurement()?,
        cooldown: config.cooldown()?,
        page_load_wait: config.page_load_wait()?,
        fallback_interval: config.sampler_interval()?,
    };

    let store = ResultStore::open(output_dir)?;
    let launcher = BrowserLauncher::new(config.browser.clone());
    let sampler = if dry_run {
        EnergySampler::Noop
    } else {
        EnergySampler::External(config.sampler_settings()?)
    };
    let urls = EpisodeUrls {
        spotify: config.platforms.spotify_url.clone(),
        apple: config.platforms.apple_url.clone(),
    };

    tracing::info!(
        conditions = plan.conditions.len(),
        target,
        dry_run,
        "experiment starting"
    );
    let orchestrator = ExperimentOrchestrator::new(
        &launcher,
        sampler,
        &store,
        schedule,
        urls,
        CancelFlag::new(),
    );
    let outcome = orchestrator.run(&plan.conditions)?;

    if outcome.interrupted {
        tracing::warn!(trials = outcome.trials_run, "run interrupted; progress is durable");
    }

    // Completion summary over exactly the planned conditions.
    let report = build_store_report(config, &store, Some(&plan.conditions), target)?;
    println!("{}", format_human_report(&report));
    Ok(())
}

fn cmd_trial(
    config: &StudyConfig,
    output_dir: &std::path::Path,
    name: &str,
    dry_run: bool,
) -> anyhow::Result<()> {
    let condition = Condition::parse(name).ok_or_else(|| {
        anyhow::anyhow!(
            "unknown condition '{}'; available: {}",
            name,
            condition_names().join(", ")
        )
    })?;

    let store = ResultStore::open(output_dir)?;
    let index = store.records(name)?.len() as u32;
    let launcher = BrowserLauncher::new(config.browser.clone());
    let sampler = if dry_run {
        EnergySampler::Noop
    } else {
        EnergySampler::External(config.sampler_settings()?)
    };

    let spec = TrialSpec {
        condition,
        index,
        url: config.episode_url(condition.platform).to_string(),
        page_load_wait: config.page_load_wait()?,
        measurement: config.measurement()?,
        fallback_interval: config.sampler_interval()?,
        energy_path: store.energy_path(name, index)?,
    };

    let runner = TrialRunner::new(&launcher, &sampler, CancelFlag::new());
    let record = runner.run(&spec);
    store.append(&record)?;

    println!("Trial {index} of {name}:");
    println!("  success: {}", record.success);
    if let Some(energy) = &record.energy {
        println!(
            "  energy:  {:.2} J over {} sample(s), mean {:.2} W",
            energy.total_energy_joules, energy.sample_count, energy.mean_power_watts
        );
    }
    if record.format_flagged {
        println!("  note:    telemetry format not recognized");
    }
    if let Some(error) = record.error {
        println!("  error:   {error:?}");
        anyhow::bail!("trial failed");
    }
    Ok(())
}

fn cmd_report(
    config: &StudyConfig,
    output_dir: &std::path::Path,
    format: Option<&str>,
    output: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let store = ResultStore::open(output_dir)?;
    let report = build_store_report(config, &store, None, config.experiment.runs_per_config)?;

    let format: OutputFormat = format
        .unwrap_or(&config.output.format)
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let text = match format {
        OutputFormat::Json => generate_json_report(&report)?,
        OutputFormat::Csv => generate_csv_report(&report),
        OutputFormat::Human => format_human_report(&report),
    };

    match output {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("could not create {}", path.display()))?;
            file.write_all(text.as_bytes())?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Aggregate stored records into a report, either over a planned subset or
/// over every condition with records.
fn build_store_report(
    config: &StudyConfig,
    store: &ResultStore,
    conditions: Option<&[Condition]>,
    target: u32,
) -> anyhow::Result<RunReport> {
    let names: Vec<String> = match conditions {
        Some(conditions) => conditions.iter().map(|c| c.name()).collect(),
        None => store.condition_names()?,
    };

    let mut reports = Vec::with_capacity(names.len());
    for name in &names {
        let records = store.records(name)?;
        reports.push(ConditionReport::from_records(name, &records, target));
    }
    Ok(RunReport::new(
        target,
        config.measurement()?.as_secs(),
        reports,
    ))
}

fn condition_names() -> Vec<String> {
    Condition::matrix().iter().map(|c| c.name()).collect()
}

/// Route SIGINT/SIGTERM into the shared interrupt latch so every blocking
/// wait unwinds cleanly: in-flight processes are stopped and the partial
/// trial is recorded instead of abandoned.
#[cfg(unix)]
fn install_interrupt_handler() {
    extern "C" fn handle(_signal: libc::c_int) {
        joulecast_core::note_interrupt();
    }
    let handler: extern "C" fn(libc::c_int) = handle;
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_interrupt_handler() {}
