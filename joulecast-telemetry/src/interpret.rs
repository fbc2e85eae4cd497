//! Energy Interpretation
//!
//! Classifies a raw telemetry table into one of two sensor families and
//! derives a single [`EnergySummary`] with consistent semantics:
//!
//! - **Counter format**: a cumulative energy column in joules; energy over
//!   the window is the difference of its endpoints.
//! - **Power format**: an instantaneous power column in watts; energy over
//!   the window is the discretized integral of power over time.
//!
//! Interpretation is deterministic: the same rows always produce a
//! bit-identical summary, with no dependence on wall-clock time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::table::RawTable;

/// Cumulative energy (joules) column names, checked before any heuristics.
/// Spellings vary by sampler backend.
const ENERGY_COLUMNS: &[&str] = &[
    "PACKAGE_ENERGY (J)",
    "CPU_ENERGY (J)",
    "package_energy",
    "Package Energy (J)",
    "CPU Energy (J)",
    "energy",
    "total_energy",
];

/// Instantaneous power (watts) column names, consulted when no energy
/// counter column exists.
const POWER_COLUMNS: &[&str] = &[
    "SYSTEM_POWER (Watts)",
    "SYSTEM_POWER",
    "CPU_POWER (Watts)",
    "CPU_POWER",
    "PACKAGE_POWER (Watts)",
];

/// Where per-row timing comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBasis {
    /// `Delta` column: cumulative milliseconds since sampling started.
    DeltaMillis(usize),
    /// `Time` column: Unix epoch milliseconds.
    EpochMillis(usize),
    /// No usable timing column; assume a uniform sampling interval.
    Interval,
}

/// Classified telemetry format, carrying the typed extraction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryFormat {
    /// Monotonic cumulative-energy counter column present.
    Counter {
        /// Index of the energy column.
        energy_col: usize,
        /// Timing source for elapsed-time computation.
        time: TimeBasis,
    },
    /// Instantaneous power column present, no energy counter.
    Power {
        /// Index of the power column.
        power_col: usize,
        /// Timing source for per-interval Δt.
        time: TimeBasis,
    },
    /// Neither an energy-style nor a power-style column was found.
    Unrecognized,
}

/// Derived per-trial energy summary. Never directly observed; computed once
/// from the raw rows and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergySummary {
    /// Number of raw sample rows the summary was computed from.
    pub sample_count: usize,
    /// Total energy over the measurement window, in joules.
    pub total_energy_joules: f64,
    /// Mean power over the measurement window, in watts.
    pub mean_power_watts: f64,
}

impl EnergySummary {
    /// Summary for an empty row sequence. Absence of data never manufactures
    /// energy.
    pub fn zero() -> Self {
        Self {
            sample_count: 0,
            total_energy_joules: 0.0,
            mean_power_watts: 0.0,
        }
    }
}

/// Outcome of interpreting one raw table.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    /// The derived energy summary.
    pub summary: EnergySummary,
    /// Set when data rows were present but no recognized column was found.
    /// Non-fatal: the trial is still recorded, flagged for operator
    /// follow-up.
    pub format_flagged: bool,
    /// Name of the column the computation used, for logging and follow-up.
    pub column_used: Option<String>,
}

fn find_named(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| headers.iter().position(|h| h == c))
}

fn find_containing(headers: &[String], needle: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.to_lowercase().contains(needle))
}

fn time_basis(headers: &[String]) -> TimeBasis {
    if let Some(idx) = headers.iter().position(|h| h == "Delta") {
        TimeBasis::DeltaMillis(idx)
    } else if let Some(idx) = headers.iter().position(|h| h == "Time") {
        TimeBasis::EpochMillis(idx)
    } else {
        TimeBasis::Interval
    }
}

/// Classify a column set into exactly one telemetry format.
///
/// Exact known names win over substring heuristics, and an energy counter
/// wins over a power column when both are present.
pub fn classify(headers: &[String]) -> TelemetryFormat {
    let time = time_basis(headers);

    if let Some(energy_col) = find_named(headers, ENERGY_COLUMNS) {
        return TelemetryFormat::Counter { energy_col, time };
    }
    if let Some(power_col) = find_named(headers, POWER_COLUMNS) {
        return TelemetryFormat::Power { power_col, time };
    }
    if let Some(energy_col) = find_containing(headers, "energy") {
        return TelemetryFormat::Counter { energy_col, time };
    }
    if let Some(power_col) = find_containing(headers, "power") {
        return TelemetryFormat::Power { power_col, time };
    }
    TelemetryFormat::Unrecognized
}

/// Interpret a raw table into an [`Interpretation`].
///
/// `fallback_interval` is the assumed sampling period when the table carries
/// no usable timing column.
pub fn interpret(table: &RawTable, fallback_interval: Duration) -> Interpretation {
    let rows = table.row_count();
    if rows == 0 {
        return Interpretation {
            summary: EnergySummary::zero(),
            format_flagged: false,
            column_used: None,
        };
    }

    match classify(table.headers()) {
        TelemetryFormat::Counter { energy_col, time } => {
            let summary = interpret_counter(table, energy_col, time, fallback_interval);
            Interpretation {
                summary,
                format_flagged: false,
                column_used: table.headers().get(energy_col).cloned(),
            }
        }
        TelemetryFormat::Power { power_col, time } => {
            let summary = interpret_power(table, power_col, time, fallback_interval);
            Interpretation {
                summary,
                format_flagged: false,
                column_used: table.headers().get(power_col).cloned(),
            }
        }
        TelemetryFormat::Unrecognized => Interpretation {
            summary: EnergySummary {
                sample_count: rows,
                total_energy_joules: 0.0,
                mean_power_watts: 0.0,
            },
            format_flagged: true,
            column_used: None,
        },
    }
}

/// Cumulative-counter mode: total = last valid value − first valid value.
///
/// Malformed rows are treated as missing, so the endpoints naturally fall
/// back to the nearest valid row. A column that is not monotonically
/// non-decreasing holds per-sample joules instead and is summed.
fn interpret_counter(
    table: &RawTable,
    energy_col: usize,
    time: TimeBasis,
    fallback_interval: Duration,
) -> EnergySummary {
    let rows = table.row_count();
    let values: Vec<f64> = table
        .column_numbers(energy_col)
        .into_iter()
        .flatten()
        .collect();

    let total = match (values.first(), values.last()) {
        (Some(first), Some(last)) if is_non_decreasing(&values) => last - first,
        (Some(_), Some(_)) => values.iter().sum(),
        _ => 0.0,
    }
    .max(0.0);

    let elapsed = elapsed_seconds(table, time, rows, fallback_interval);
    let mean_power = if elapsed > 0.0 { total / elapsed } else { 0.0 };

    EnergySummary {
        sample_count: rows,
        total_energy_joules: total,
        mean_power_watts: mean_power.max(0.0),
    }
}

/// Instantaneous-power mode: discretized integral over consecutive row pairs.
///
/// Each interval contributes `power_i × Δt_i`; Δt comes from the timing
/// column when both endpoints parse, else the fallback interval. Mean power
/// is the arithmetic mean of all valid power samples.
fn interpret_power(
    table: &RawTable,
    power_col: usize,
    time: TimeBasis,
    fallback_interval: Duration,
) -> EnergySummary {
    let rows = table.row_count();
    let powers = table.column_numbers(power_col);
    let fallback_secs = fallback_interval.as_secs_f64();

    let mut total = 0.0;
    for i in 0..rows.saturating_sub(1) {
        let Some(power) = powers[i] else { continue };
        let dt = interval_seconds(table, time, i).unwrap_or(fallback_secs);
        if dt > 0.0 {
            total += power * dt;
        }
    }

    let valid: Vec<f64> = powers.into_iter().flatten().collect();
    let mean_power = if valid.is_empty() {
        0.0
    } else {
        valid.iter().sum::<f64>() / valid.len() as f64
    };

    EnergySummary {
        sample_count: rows,
        total_energy_joules: total.max(0.0),
        mean_power_watts: mean_power.max(0.0),
    }
}

fn is_non_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}

/// Total elapsed seconds for the whole table.
fn elapsed_seconds(
    table: &RawTable,
    time: TimeBasis,
    rows: usize,
    fallback_interval: Duration,
) -> f64 {
    let fallback = rows as f64 * fallback_interval.as_secs_f64();
    let explicit = match time {
        TimeBasis::DeltaMillis(col) => {
            // Delta is cumulative ms since sampling started.
            last_valid(table, col).map(|last| last / 1000.0)
        }
        TimeBasis::EpochMillis(col) => match (first_valid(table, col), last_valid(table, col)) {
            (Some(first), Some(last)) if last > first => Some((last - first) / 1000.0),
            _ => None,
        },
        TimeBasis::Interval => None,
    };
    explicit.filter(|e| *e > 0.0).unwrap_or(fallback)
}

/// Δt in seconds between rows `i` and `i + 1`, when the timing column has
/// valid values at both endpoints.
fn interval_seconds(table: &RawTable, time: TimeBasis, i: usize) -> Option<f64> {
    let col = match time {
        TimeBasis::DeltaMillis(col) | TimeBasis::EpochMillis(col) => col,
        TimeBasis::Interval => return None,
    };
    let a = table.number(i, col)?;
    let b = table.number(i + 1, col)?;
    Some(((b - a) / 1000.0).max(0.0))
}

fn first_valid(table: &RawTable, col: usize) -> Option<f64> {
    (0..table.row_count()).find_map(|r| table.number(r, col))
}

fn last_valid(table: &RawTable, col: usize) -> Option<f64> {
    (0..table.row_count()).rev().find_map(|r| table.number(r, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_classify_counter_over_power() {
        let headers = vec![
            "Time".to_string(),
            "PACKAGE_ENERGY (J)".to_string(),
            "SYSTEM_POWER (Watts)".to_string(),
        ];
        assert!(matches!(
            classify(&headers),
            TelemetryFormat::Counter {
                energy_col: 1,
                time: TimeBasis::EpochMillis(0)
            }
        ));
    }

    #[test]
    fn test_classify_substring_fallback() {
        let headers = vec!["ts".to_string(), "GPU Energy Total".to_string()];
        assert!(matches!(
            classify(&headers),
            TelemetryFormat::Counter { energy_col: 1, .. }
        ));

        let headers = vec!["ts".to_string(), "core_power_w".to_string()];
        assert!(matches!(
            classify(&headers),
            TelemetryFormat::Power { power_col: 1, .. }
        ));
    }

    #[test]
    fn test_classify_unrecognized() {
        let headers = vec!["Time".to_string(), "TEMPERATURE".to_string()];
        assert_eq!(classify(&headers), TelemetryFormat::Unrecognized);
    }

    #[test]
    fn test_power_mode_integral_with_time_column() {
        // 3 rows [{t:0, power:10}, {t:500, power:12}, {t:1000, power:8}]
        // → total = 10×0.5 + 12×0.5 = 11.0, mean = (10+12+8)/3 = 10.0
        let table = RawTable::parse("Time,SYSTEM_POWER (Watts)\n0,10\n500,12\n1000,8\n");
        let out = interpret(&table, ms(999));
        assert!(!out.format_flagged);
        assert_eq!(out.summary.sample_count, 3);
        assert!((out.summary.total_energy_joules - 11.0).abs() < 1e-9);
        assert!((out.summary.mean_power_watts - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_counter_mode_fallback_elapsed() {
        // [{energy:100.0}, {energy:100.0}, {energy:512.5}], fallback 500ms
        // → elapsed = 1.5s, total = 412.5, mean = 275.0
        let table = RawTable::parse("PACKAGE_ENERGY (J)\n100.0\n100.0\n512.5\n");
        let out = interpret(&table, ms(500));
        assert_eq!(out.summary.sample_count, 3);
        assert!((out.summary.total_energy_joules - 412.5).abs() < 1e-9);
        assert!((out.summary.mean_power_watts - 275.0).abs() < 1e-9);
        assert_eq!(out.column_used.as_deref(), Some("PACKAGE_ENERGY (J)"));
    }

    #[test]
    fn test_counter_mode_endpoint_difference() {
        let table = RawTable::parse("Time,CPU_ENERGY (J)\n0,100\n1000,150\n2000,220\n");
        let out = interpret(&table, ms(500));
        assert!((out.summary.total_energy_joules - 120.0).abs() < 1e-9);
        // Explicit Time column: elapsed = 2s → mean = 60 W
        assert!((out.summary.mean_power_watts - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_counter_mode_malformed_boundary_rows() {
        // Endpoints fall back to the nearest valid rows; interior garbage is
        // invariant for the total.
        let table = RawTable::parse("CPU_ENERGY (J)\nnan-ish\n100\nbad\n300\n\u{20}\n");
        let out = interpret(&table, ms(500));
        assert!((out.summary.total_energy_joules - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_counter_mode_non_monotonic_sums_per_sample() {
        let table = RawTable::parse("energy\n5.0\n3.0\n4.0\n");
        let out = interpret(&table, ms(1000));
        assert!((out.summary.total_energy_joules - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_power_mode_single_row() {
        let table = RawTable::parse("CPU_POWER\n42.0\n");
        let out = interpret(&table, ms(500));
        assert_eq!(out.summary.sample_count, 1);
        assert_eq!(out.summary.total_energy_joules, 0.0);
        assert!((out.summary.mean_power_watts - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_power_mode_fallback_interval() {
        let table = RawTable::parse("CPU_POWER\n10\n10\n10\n");
        let out = interpret(&table, ms(500));
        // 2 intervals × 10 W × 0.5 s
        assert!((out.summary.total_energy_joules - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_rows_zero_summary() {
        let out = interpret(&RawTable::parse(""), ms(500));
        assert_eq!(out.summary, EnergySummary::zero());
        assert!(!out.format_flagged);

        let out = interpret(&RawTable::parse("Time,CPU_POWER\n"), ms(500));
        assert_eq!(out.summary, EnergySummary::zero());
        assert!(!out.format_flagged);
    }

    #[test]
    fn test_unrecognized_flagged_not_fatal() {
        let table = RawTable::parse("Time,FAN_RPM\n0,1200\n500,1210\n");
        let out = interpret(&table, ms(500));
        assert!(out.format_flagged);
        assert_eq!(out.summary.sample_count, 2);
        assert_eq!(out.summary.total_energy_joules, 0.0);
        assert_eq!(out.summary.mean_power_watts, 0.0);
    }

    #[test]
    fn test_interpretation_idempotent() {
        let table = RawTable::parse("Delta,SYSTEM_POWER (Watts)\n0,9.5\n480,10.5\n1010,11.5\n");
        let a = interpret(&table, ms(500));
        let b = interpret(&table, ms(500));
        assert_eq!(a, b);
    }

    #[test]
    fn test_delta_column_preferred_over_time() {
        let table =
            RawTable::parse("Time,Delta,CPU_ENERGY (J)\n1700000000000,0,10\n1700000000500,500,20\n");
        // Delta basis: elapsed = 0.5s → mean = 20 W
        let out = interpret(&table, ms(999));
        assert!((out.summary.total_energy_joules - 10.0).abs() < 1e-9);
        assert!((out.summary.mean_power_watts - 20.0).abs() < 1e-9);
    }
}
