//! Experiment Orchestrator
//!
//! Drives trials across the condition matrix with durable progress:
//! - Progress is re-derived from the result store on every start, so a
//!   restart continues exactly where the records left off.
//! - Every record is persisted (and fsynced) before the next trial begins.
//! - Failed trials consume index slots but not success slots; a condition is
//!   retried until the success target is met or the attempts ceiling is hit,
//!   then reported incomplete.
//! - Cooldowns run between trials, never after the last one, and are
//!   interruptible but never silently skipped.

use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use joulecast_core::{
    CancelFlag, Condition, EnergySampler, ErrorKind, SessionLauncher, TrialRunner, TrialSpec,
};
use joulecast_store::{ResultStore, StoreError};

/// Orchestrator failure classification. Both variants are fatal to the run;
/// trial-local failures are recorded, not raised.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Durable storage failed; continuing would void the crash-safety
    /// contract.
    #[error("result store failure: {0}")]
    Store(#[from] StoreError),

    /// The sampler executable is missing. Every further trial would fail the
    /// same way, so the remaining matrix is abandoned after recording the
    /// current trial.
    #[error("energy sampler unavailable; aborting remaining conditions")]
    SamplerUnavailable,
}

/// Schedule parameters for one run.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Successful trials targeted per condition.
    pub runs_per_config: u32,
    /// Ceiling on total attempts per condition.
    pub max_attempts: u32,
    /// Measurement window per trial.
    pub measurement: Duration,
    /// Idle pause between trials.
    pub cooldown: Duration,
    /// Wait after navigation before playback is attempted.
    pub page_load_wait: Duration,
    /// Fallback sampling interval for untimed telemetry.
    pub fallback_interval: Duration,
}

/// Episode URLs keyed by platform.
#[derive(Debug, Clone)]
pub struct EpisodeUrls {
    /// Spotify episode URL.
    pub spotify: String,
    /// Apple Podcasts episode URL.
    pub apple: String,
}

impl EpisodeUrls {
    fn for_condition(&self, condition: &Condition) -> String {
        match condition.platform {
            joulecast_core::Platform::Spotify => self.spotify.clone(),
            joulecast_core::Platform::Apple => self.apple.clone(),
        }
    }
}

/// Outcome of a full run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Trials executed by this process (resumed trials not included).
    pub trials_run: u32,
    /// True when an external cancellation cut the run short.
    pub interrupted: bool,
}

/// Drives many trial executions across a condition plan.
pub struct ExperimentOrchestrator<'a> {
    launcher: &'a dyn SessionLauncher,
    sampler: EnergySampler,
    store: &'a ResultStore,
    schedule: Schedule,
    urls: EpisodeUrls,
    cancel: CancelFlag,
}

impl<'a> ExperimentOrchestrator<'a> {
    /// Assemble an orchestrator. Pass [`EnergySampler::Noop`] for dry runs:
    /// the full trial state machine executes without the external tool.
    pub fn new(
        launcher: &'a dyn SessionLauncher,
        sampler: EnergySampler,
        store: &'a ResultStore,
        schedule: Schedule,
        urls: EpisodeUrls,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            launcher,
            sampler,
            store,
            schedule,
            urls,
            cancel,
        }
    }

    /// Run the plan to completion, resuming from whatever the store already
    /// holds.
    pub fn run(&self, plan: &[Condition]) -> Result<RunOutcome, OrchestratorError> {
        let runner = TrialRunner::new(self.launcher, &self.sampler, self.cancel.clone());
        let target = self.schedule.runs_per_config;

        let mut trials_run = 0u32;
        let mut ran_before = false;

        for condition in plan {
            let name = condition.name();
            let records = self.store.records(&name)?;
            let mut attempts = records.len() as u32;
            let mut successes = records.iter().filter(|r| r.success).count() as u32;

            if successes >= target {
                info!(condition = %name, successes, "target already met; skipping");
                continue;
            }
            info!(
                condition = %name,
                completed = successes,
                target,
                "condition starting"
            );

            while successes < target && attempts < self.schedule.max_attempts {
                if self.cancel.is_cancelled() {
                    return Ok(RunOutcome {
                        trials_run,
                        interrupted: true,
                    });
                }

                // Cooldown precedes every trial except the very first of the
                // run, which also keeps it off the tail of the final
                // condition.
                if ran_before {
                    info!(seconds = self.schedule.cooldown.as_secs(), "cooling down");
                    if !self.cancel.sleep(self.schedule.cooldown) {
                        warn!("cooldown interrupted; stopping run");
                        return Ok(RunOutcome {
                            trials_run,
                            interrupted: true,
                        });
                    }
                }
                ran_before = true;

                let index = attempts;
                let spec = TrialSpec {
                    condition: *condition,
                    index,
                    url: self.urls.for_condition(condition),
                    page_load_wait: self.schedule.page_load_wait,
                    measurement: self.schedule.measurement,
                    fallback_interval: self.schedule.fallback_interval,
                    energy_path: self.store.energy_path(&name, index)?,
                };

                let record = runner.run(&spec);

                // Durability before progress: the record must be on disk
                // before the counters advance or the next trial starts.
                self.store.append(&record)?;
                trials_run += 1;
                attempts += 1;
                if record.success {
                    successes += 1;
                }

                match record.error {
                    Some(ErrorKind::SamplerNotFound) => {
                        error!(condition = %name, "sampler missing; no further trial can succeed");
                        return Err(OrchestratorError::SamplerUnavailable);
                    }
                    Some(ErrorKind::Interrupted) => {
                        return Ok(RunOutcome {
                            trials_run,
                            interrupted: true,
                        });
                    }
                    _ => {}
                }
            }

            if successes < target {
                warn!(
                    condition = %name,
                    successes,
                    attempts,
                    "attempts ceiling reached; condition incomplete"
                );
            } else {
                info!(condition = %name, successes, attempts, "condition complete");
            }
        }

        Ok(RunOutcome {
            trials_run,
            interrupted: false,
        })
    }
}
