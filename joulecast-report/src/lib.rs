#![warn(missing_docs)]
//! Joulecast Report - Run Aggregation and Output
//!
//! Aggregates persisted trial records into per-condition statistics and
//! renders them as:
//! - JSON (machine-readable)
//! - CSV (spreadsheet-compatible)
//! - Human-readable terminal table

mod csv;
mod human;
mod json;
mod report;

pub use csv::generate_csv_report;
pub use human::format_human_report;
pub use json::generate_json_report;
pub use report::{ConditionReport, EnergyMetrics, RunMeta, RunReport, RunSummary};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON with full schema
    Json,
    /// CSV for spreadsheets
    Csv,
    /// Human-readable terminal output
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
