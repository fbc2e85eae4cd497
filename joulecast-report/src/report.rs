//! Report Data Structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use joulecast_core::TrialRecord;
use joulecast_telemetry::{SummaryStatistics, compute_summary};

/// Complete run report over every condition with recorded trials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Report metadata.
    pub meta: RunMeta,
    /// Per-condition aggregation, in stable name order.
    pub conditions: Vec<ConditionReport>,
    /// Totals across all conditions.
    pub summary: RunSummary,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    /// On-disk schema version of this report.
    pub schema_version: u32,
    /// Crate version that produced the report.
    pub version: String,
    /// When the report was generated.
    pub timestamp: DateTime<Utc>,
    /// Success target per condition the run aimed for.
    pub runs_target: u32,
    /// Measurement window length in seconds.
    pub measurement_seconds: u64,
}

/// Aggregation over one condition's recorded trials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionReport {
    /// Condition name (storage partition key).
    pub condition: String,
    /// Total recorded trials, failures included.
    pub attempts: u32,
    /// Recorded successful trials.
    pub successes: u32,
    /// True when the run stopped short of the success target for this
    /// condition (attempts ceiling reached or run aborted).
    pub incomplete: bool,
    /// Trials whose telemetry format was not recognized.
    pub flagged_trials: u32,
    /// Energy statistics over successful trials; absent when none succeeded.
    pub energy: Option<EnergyMetrics>,
}

/// Energy statistics over the successful trials of one condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyMetrics {
    /// Number of successful trials aggregated.
    pub samples: usize,
    /// Mean total energy per trial, joules.
    pub mean_joules: f64,
    /// Median total energy per trial, joules.
    pub median_joules: f64,
    /// Sample standard deviation, joules.
    pub std_dev_joules: f64,
    /// Smallest trial total, joules.
    pub min_joules: f64,
    /// Largest trial total, joules.
    pub max_joules: f64,
    /// Coefficient of variation, percent.
    pub cv_percent: f64,
    /// Mean of the per-trial mean power, watts.
    pub mean_power_watts: f64,
}

impl From<&SummaryStatistics> for EnergyMetrics {
    fn from(stats: &SummaryStatistics) -> Self {
        Self {
            samples: stats.sample_count,
            mean_joules: stats.mean,
            median_joules: stats.median,
            std_dev_joules: stats.std_dev,
            min_joules: stats.min,
            max_joules: stats.max,
            cv_percent: stats.coefficient_of_variation(),
            mean_power_watts: 0.0, // Filled from power readings
        }
    }
}

/// Report summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Conditions covered by the report.
    pub total_conditions: usize,
    /// Conditions that reached the success target.
    pub completed: usize,
    /// Conditions that stopped short.
    pub incomplete: usize,
    /// Recorded trials across all conditions.
    pub total_attempts: u32,
    /// Successful trials across all conditions.
    pub total_successes: u32,
}

impl ConditionReport {
    /// Aggregate one condition's records against the success target.
    pub fn from_records(condition: &str, records: &[TrialRecord], target: u32) -> Self {
        let successes = records.iter().filter(|r| r.success).count() as u32;
        let flagged_trials = records.iter().filter(|r| r.format_flagged).count() as u32;

        let totals: Vec<f64> = records
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.energy.as_ref())
            .map(|e| e.total_energy_joules)
            .collect();
        let powers: Vec<f64> = records
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.energy.as_ref())
            .map(|e| e.mean_power_watts)
            .collect();

        let energy = if totals.is_empty() {
            None
        } else {
            let mut metrics = EnergyMetrics::from(&compute_summary(&totals));
            metrics.mean_power_watts = powers.iter().sum::<f64>() / powers.len() as f64;
            Some(metrics)
        };

        Self {
            condition: condition.to_string(),
            attempts: records.len() as u32,
            successes,
            incomplete: successes < target,
            flagged_trials,
            energy,
        }
    }
}

impl RunReport {
    /// Current report schema version.
    pub const SCHEMA_VERSION: u32 = 1;

    /// Assemble the full report from per-condition aggregations.
    pub fn new(runs_target: u32, measurement_seconds: u64, conditions: Vec<ConditionReport>) -> Self {
        let summary = RunSummary {
            total_conditions: conditions.len(),
            completed: conditions.iter().filter(|c| !c.incomplete).count(),
            incomplete: conditions.iter().filter(|c| c.incomplete).count(),
            total_attempts: conditions.iter().map(|c| c.attempts).sum(),
            total_successes: conditions.iter().map(|c| c.successes).sum(),
        };
        Self {
            meta: RunMeta {
                schema_version: Self::SCHEMA_VERSION,
                version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: Utc::now(),
                runs_target,
                measurement_seconds,
            },
            conditions,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joulecast_core::ErrorKind;
    use joulecast_telemetry::EnergySummary;

    fn record(index: u32, success: bool, joules: f64) -> TrialRecord {
        TrialRecord {
            condition: "chrome_spotify_1x".to_string(),
            index,
            started_at: Utc::now(),
            duration_seconds: 45,
            success,
            error: (!success).then_some(ErrorKind::SamplerCrashed),
            format_flagged: false,
            energy: success.then_some(EnergySummary {
                sample_count: 90,
                total_energy_joules: joules,
                mean_power_watts: joules / 45.0,
            }),
        }
    }

    #[test]
    fn test_condition_report_aggregates_successes_only() {
        let records = vec![
            record(0, true, 400.0),
            record(1, false, 0.0),
            record(2, true, 500.0),
        ];
        let report = ConditionReport::from_records("chrome_spotify_1x", &records, 2);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.successes, 2);
        assert!(!report.incomplete);
        let energy = report.energy.unwrap();
        assert_eq!(energy.samples, 2);
        assert!((energy.mean_joules - 450.0).abs() < 1e-9);
        assert!((energy.mean_power_watts - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_condition_report_incomplete() {
        let records = vec![record(0, false, 0.0)];
        let report = ConditionReport::from_records("chrome_spotify_1x", &records, 30);
        assert!(report.incomplete);
        assert!(report.energy.is_none());
    }

    #[test]
    fn test_run_report_summary_counts() {
        let a = ConditionReport::from_records("a", &[record(0, true, 10.0)], 1);
        let b = ConditionReport::from_records("b", &[record(0, false, 0.0)], 1);
        let report = RunReport::new(1, 45, vec![a, b]);
        assert_eq!(report.summary.total_conditions, 2);
        assert_eq!(report.summary.completed, 1);
        assert_eq!(report.summary.incomplete, 1);
        assert_eq!(report.summary.total_attempts, 2);
        assert_eq!(report.summary.total_successes, 1);
        assert_eq!(report.meta.schema_version, RunReport::SCHEMA_VERSION);
    }
}
