#![warn(missing_docs)]
//! Joulecast Telemetry Engine
//!
//! Turns the raw tabular output of the external energy sampler into a
//! platform-agnostic energy summary:
//! - Header-defined raw tables, no fixed schema assumed
//! - Explicit format classification (cumulative counter vs instantaneous power)
//! - Numerically correct energy integration for both formats
//! - Cross-trial summary statistics for reporting

mod interpret;
mod summary;
mod table;

pub use interpret::{
    EnergySummary, Interpretation, TelemetryFormat, TimeBasis, classify, interpret,
};
pub use summary::{SummaryStatistics, compute_summary};
pub use table::RawTable;

/// Default sampling interval assumed when the raw table carries no timing column
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 500;
