#![warn(missing_docs)]
//! Joulecast Core - Trial Execution Engine
//!
//! This crate provides the measurement-side machinery of the study:
//! - The fixed condition matrix (browser × platform × playback speed)
//! - The `PlaybackSession` interface consumed from the trial runner
//! - Supervision of the external energy-sampling process
//! - The per-trial state machine producing durable trial records
//! - Cancellable waits shared by every blocking point

mod cancel;
mod runner;
mod sampler;
mod session;

pub use cancel::{CancelFlag, interrupt_requested, note_interrupt};
pub use runner::{TrialRunner, TrialSpec};
pub use sampler::{
    EnergySampler, RunningSampler, SAMPLER_BINARY_CANDIDATES, SAMPLER_PATH_ENV, SamplerError,
    SamplerOutput, SamplerSettings,
};
pub use session::{
    PlaybackError, PlaybackSession, ScriptedLauncher, SessionLauncher, SessionRequest,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use joulecast_telemetry::EnergySummary;

/// Browser under measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    /// Chromium-based Chrome.
    Chrome,
    /// Chromium-based Brave.
    Brave,
}

impl Browser {
    /// Stable lowercase name used in condition names.
    pub fn as_str(self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Brave => "brave",
        }
    }
}

/// Content platform whose web player is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Spotify web player.
    Spotify,
    /// Apple Podcasts web player.
    Apple,
}

impl Platform {
    /// Stable lowercase name used in condition names.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Spotify => "spotify",
            Platform::Apple => "apple",
        }
    }
}

/// Playback speed multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speed {
    /// Normal speed.
    #[serde(rename = "1x")]
    X1,
    /// Double speed.
    #[serde(rename = "2x")]
    X2,
}

impl Speed {
    /// The multiplier handed to the playback session.
    pub fn multiplier(self) -> f64 {
        match self {
            Speed::X1 => 1.0,
            Speed::X2 => 2.0,
        }
    }

    /// Stable suffix used in condition names.
    pub fn as_str(self) -> &'static str {
        match self {
            Speed::X1 => "1x",
            Speed::X2 => "2x",
        }
    }
}

/// One measurement condition: a (browser, platform, speed) tuple.
///
/// Immutable, drawn from the fixed cross product returned by
/// [`Condition::matrix`]. The derived [`name`](Condition::name) is the
/// storage partition key; no two conditions share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    /// Browser under measurement.
    pub browser: Browser,
    /// Content platform.
    pub platform: Platform,
    /// Playback speed.
    pub speed: Speed,
}

impl Condition {
    /// Stable name derived from the fields, e.g. `chrome_spotify_1x`.
    pub fn name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.browser.as_str(),
            self.platform.as_str(),
            self.speed.as_str()
        )
    }

    /// Parse a condition back from its stable name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::matrix().into_iter().find(|c| c.name() == name)
    }

    /// The full 8-condition matrix in stable execution order.
    pub fn matrix() -> Vec<Condition> {
        let mut conditions = Vec::with_capacity(8);
        for browser in [Browser::Chrome, Browser::Brave] {
            for platform in [Platform::Spotify, Platform::Apple] {
                for speed in [Speed::X1, Speed::X2] {
                    conditions.push(Condition {
                        browser,
                        platform,
                        speed,
                    });
                }
            }
        }
        conditions
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// Failure classification persisted with a failed trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Player not reachable, playback never started, or speed rejected.
    PlaybackFailed,
    /// The sampler executable is missing or misconfigured. Affects every
    /// future trial, so the orchestrator aborts the remaining matrix.
    SamplerNotFound,
    /// The sampler exited before the measurement window completed.
    SamplerCrashed,
    /// An external cancellation arrived mid-trial; resources were stopped
    /// and the partial result recorded instead of being abandoned.
    Interrupted,
}

/// One persisted trial outcome. Written exactly once, append-only; never
/// mutated after write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Partition key: the condition's stable name.
    pub condition: String,
    /// 0-based ordinal within the condition; strictly increasing, failures
    /// included.
    pub index: u32,
    /// When the trial was dispatched.
    pub started_at: DateTime<Utc>,
    /// Length of the measurement window in seconds.
    pub duration_seconds: u64,
    /// Whether playback was confirmed and the sampler produced a parseable
    /// result.
    pub success: bool,
    /// Failure classification, absent on success.
    pub error: Option<ErrorKind>,
    /// Set when the telemetry columns were not recognized; the trial still
    /// counts, flagged for operator follow-up.
    #[serde(default)]
    pub format_flagged: bool,
    /// Derived energy summary. Present on success, and on sampler crashes
    /// where partial output could still be parsed.
    pub energy: Option<EnergySummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_has_eight_unique_names() {
        let matrix = Condition::matrix();
        assert_eq!(matrix.len(), 8);
        let names: std::collections::HashSet<String> =
            matrix.iter().map(|c| c.name()).collect();
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_condition_name_round_trip() {
        for condition in Condition::matrix() {
            assert_eq!(Condition::parse(&condition.name()), Some(condition));
        }
        assert_eq!(Condition::parse("netscape_myspace_3x"), None);
    }

    #[test]
    fn test_known_name() {
        let condition = Condition {
            browser: Browser::Chrome,
            platform: Platform::Spotify,
            speed: Speed::X1,
        };
        assert_eq!(condition.name(), "chrome_spotify_1x");
    }

    #[test]
    fn test_speed_multiplier() {
        assert!((Speed::X1.multiplier() - 1.0).abs() < f64::EPSILON);
        assert!((Speed::X2.multiplier() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_serde_round_trip() {
        let record = TrialRecord {
            condition: "brave_apple_2x".to_string(),
            index: 3,
            started_at: Utc::now(),
            duration_seconds: 45,
            success: false,
            error: Some(ErrorKind::SamplerCrashed),
            format_flagged: true,
            energy: Some(EnergySummary {
                sample_count: 12,
                total_energy_joules: 87.5,
                mean_power_watts: 14.6,
            }),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: TrialRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
