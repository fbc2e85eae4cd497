#![warn(missing_docs)]
//! # Joulecast
//!
//! Controlled energy-measurement study for web media playback. For every
//! condition (browser × content platform × playback speed) it repeatedly
//! drives a playback session for a fixed window while an external sampler
//! records energy telemetry, and persists each trial durably enough to
//! resume after a crash:
//!
//! - **Two telemetry families, one metric**: cumulative-energy counters and
//!   instantaneous-power samples both normalize into total joules, mean
//!   watts, and a sample count
//! - **Crash-durable progress**: every trial record is fsynced before the
//!   orchestrator advances; restarts re-derive progress from the store
//! - **Supervised subprocesses**: browser and sampler are stopped together
//!   at the end of every trial, no orphans
//! - **Serial by design**: trials never overlap, keeping telemetry free of
//!   cross-trial interference
//!
//! ## Quick Start
//!
//! ```ignore
//! // Run the full 8-condition matrix, resuming any prior progress:
//! //   joulecast run
//! // One smoke-test trial without the sampler:
//! //   joulecast trial chrome_spotify_1x --dry-run
//! // Aggregate whatever is stored:
//! //   joulecast report --format csv
//! ```

// Re-export core types
pub use joulecast_core::{
    Browser, CancelFlag, Condition, EnergySampler, ErrorKind, PlaybackError, PlaybackSession,
    Platform, SamplerError, SamplerSettings, ScriptedLauncher, SessionLauncher, SessionRequest,
    Speed, TrialRecord, TrialRunner, TrialSpec,
};

// Re-export telemetry interpretation
pub use joulecast_telemetry::{
    EnergySummary, Interpretation, RawTable, SummaryStatistics, TelemetryFormat, classify,
    compute_summary, interpret,
};

// Re-export persistence
pub use joulecast_store::{ConditionProgress, ExperimentState, ResultStore, StoreError};

// Re-export reporting
pub use joulecast_report::{
    ConditionReport, OutputFormat, RunReport, format_human_report, generate_csv_report,
    generate_json_report,
};

// Re-export orchestration and configuration
pub use joulecast_cli::{
    BrowserLauncher, EpisodeUrls, ExperimentOrchestrator, OrchestratorError, RunOutcome, Schedule,
    StudyConfig,
};

/// Run the joulecast CLI.
///
/// Call this from the binary's `main()`:
/// ```ignore
/// fn main() {
///     if let Err(e) = joulecast::run() {
///         eprintln!("error: {e:#}");
///         std::process::exit(1);
///     }
/// }
/// ```
pub use joulecast_cli::run;
