//! Trial Runner
//!
//! Executes one trial end to end: open the playback session, start the
//! energy sampler alongside it, hold the measurement window, stop both, and
//! interpret the captured telemetry into a durable [`TrialRecord`].
//!
//! The two external processes (browser, sampler) progress independently;
//! the runner synchronizes them only at the start and stop barriers, and
//! stops each one regardless of what happened to the other so neither can
//! leak past its trial.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use joulecast_telemetry::interpret;

use crate::{
    CancelFlag, Condition, EnergySampler, ErrorKind, SessionLauncher, SessionRequest, TrialRecord,
};

/// Everything one trial execution needs.
#[derive(Debug, Clone)]
pub struct TrialSpec {
    /// The measurement condition.
    pub condition: Condition,
    /// 0-based trial ordinal within the condition.
    pub index: u32,
    /// Episode URL for the condition's platform.
    pub url: String,
    /// Wait after navigation before playback is attempted.
    pub page_load_wait: Duration,
    /// Fixed wall-clock measurement window.
    pub measurement: Duration,
    /// Assumed sampling period when telemetry carries no timing column.
    pub fallback_interval: Duration,
    /// Destination for the raw telemetry of this trial; exclusively owned by
    /// this trial, overwritten never appended.
    pub energy_path: PathBuf,
}

/// Runs single trials against a session launcher and a sampler.
pub struct TrialRunner<'a> {
    launcher: &'a dyn SessionLauncher,
    sampler: &'a EnergySampler,
    cancel: CancelFlag,
}

impl<'a> TrialRunner<'a> {
    /// Create a runner. The cancel flag is shared with the orchestrator so
    /// one signal reaches every blocking point.
    pub fn new(
        launcher: &'a dyn SessionLauncher,
        sampler: &'a EnergySampler,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            launcher,
            sampler,
            cancel,
        }
    }

    /// Execute one trial and produce its record. Trial-local failures are
    /// captured in the record, never raised.
    pub fn run(&self, spec: &TrialSpec) -> TrialRecord {
        let started_at = Utc::now();
        info!(condition = %spec.condition, index = spec.index, "trial starting");

        let request = SessionRequest {
            condition: spec.condition,
            url: spec.url.clone(),
            page_load_wait: spec.page_load_wait,
        };

        // Session first: a trial with no confirmed player is never a usable
        // measurement, so the sampler is not started until the page is up.
        let mut session = match self.launcher.open(&request, &self.cancel) {
            Ok(session) => session,
            Err(error) => {
                warn!(condition = %spec.condition, index = spec.index, "playback setup failed: {error}");
                let kind = if self.cancel.is_cancelled() {
                    ErrorKind::Interrupted
                } else {
                    ErrorKind::PlaybackFailed
                };
                return self.failure(spec, started_at, kind, None, false);
            }
        };

        let running = match self.sampler.start(&spec.energy_path) {
            Ok(running) => running,
            Err(error) => {
                warn!(condition = %spec.condition, index = spec.index, "sampler start failed: {error}");
                session.close();
                return self.failure(spec, started_at, error.kind(), None, false);
            }
        };

        // Playback start is the last step before the window: the sampler is
        // already recording, so a failure here discards its partial output.
        if let Err(error) = session.set_speed(spec.condition.speed.multiplier()) {
            warn!(condition = %spec.condition, index = spec.index, "playback start failed: {error}");
            running.discard();
            session.close();
            return self.failure(spec, started_at, ErrorKind::PlaybackFailed, None, false);
        }

        debug!(
            condition = %spec.condition,
            index = spec.index,
            seconds = spec.measurement.as_secs(),
            "measurement window open"
        );
        let window_completed = self.cancel.sleep(spec.measurement);
        if !window_completed {
            warn!(condition = %spec.condition, index = spec.index, "trial interrupted mid-window");
        }

        // Stop both regardless of each other's outcome; session close is
        // infallible, so the sampler result can be handled afterwards.
        let output = running.stop();
        session.close();

        match output {
            Ok(output) => {
                let interpretation = interpret(&output.table, spec.fallback_interval);
                if interpretation.format_flagged {
                    warn!(
                        condition = %spec.condition,
                        index = spec.index,
                        headers = ?output.table.headers(),
                        "telemetry format not recognized; trial flagged"
                    );
                } else if let Some(column) = &interpretation.column_used {
                    debug!(column = %column, "telemetry column selected");
                }

                let error = if !window_completed {
                    Some(ErrorKind::Interrupted)
                } else if output.crash.is_some() {
                    Some(ErrorKind::SamplerCrashed)
                } else {
                    None
                };
                if let Some(crash) = &output.crash {
                    warn!(condition = %spec.condition, index = spec.index, "{crash}");
                }

                let record = TrialRecord {
                    condition: spec.condition.name(),
                    index: spec.index,
                    started_at,
                    duration_seconds: spec.measurement.as_secs(),
                    success: error.is_none(),
                    error,
                    format_flagged: interpretation.format_flagged,
                    // Partial data from a crashed or interrupted window is
                    // still worth keeping for re-analysis.
                    energy: Some(interpretation.summary),
                };
                info!(
                    condition = %spec.condition,
                    index = spec.index,
                    success = record.success,
                    joules = interpretation.summary.total_energy_joules,
                    "trial finished"
                );
                record
            }
            Err(error) => {
                warn!(condition = %spec.condition, index = spec.index, "sampler stop failed: {error}");
                let kind = if !window_completed {
                    ErrorKind::Interrupted
                } else {
                    error.kind()
                };
                self.failure(spec, started_at, kind, None, false)
            }
        }
    }

    fn failure(
        &self,
        spec: &TrialSpec,
        started_at: chrono::DateTime<Utc>,
        kind: ErrorKind,
        energy: Option<joulecast_telemetry::EnergySummary>,
        format_flagged: bool,
    ) -> TrialRecord {
        TrialRecord {
            condition: spec.condition.name(),
            index: spec.index,
            started_at,
            duration_seconds: spec.measurement.as_secs(),
            success: false,
            error: Some(kind),
            format_flagged,
            energy,
        }
    }
}
