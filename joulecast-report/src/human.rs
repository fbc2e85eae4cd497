//! Human-Readable Output

use crate::report::RunReport;

/// Render the report as a terminal table with a totals footer.
pub fn format_human_report(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Run report: target {} successful trials per condition, {}s window\n\n",
        report.meta.runs_target, report.meta.measurement_seconds
    ));
    out.push_str(&format!(
        "{:<22} {:>4} {:>5} {:>10} {:>10} {:>8} {:>7} {:>9}  status\n",
        "condition", "ok", "tries", "mean J", "median J", "std J", "cv %", "mean W"
    ));

    for condition in &report.conditions {
        let status = if condition.incomplete { "incomplete" } else { "complete" };
        match &condition.energy {
            Some(e) => out.push_str(&format!(
                "{:<22} {:>4} {:>5} {:>10.1} {:>10.1} {:>8.1} {:>7.2} {:>9.2}  {}\n",
                condition.condition,
                condition.successes,
                condition.attempts,
                e.mean_joules,
                e.median_joules,
                e.std_dev_joules,
                e.cv_percent,
                e.mean_power_watts,
                status,
            )),
            None => out.push_str(&format!(
                "{:<22} {:>4} {:>5} {:>10} {:>10} {:>8} {:>7} {:>9}  {}\n",
                condition.condition,
                condition.successes,
                condition.attempts,
                "-",
                "-",
                "-",
                "-",
                "-",
                status,
            )),
        }
        if condition.flagged_trials > 0 {
            out.push_str(&format!(
                "{:<22} ({} trial(s) with unrecognized telemetry format)\n",
                "", condition.flagged_trials
            ));
        }
    }

    out.push_str(&format!(
        "\n{} condition(s): {} complete, {} incomplete; {}/{} trials successful\n",
        report.summary.total_conditions,
        report.summary.completed,
        report.summary.incomplete,
        report.summary.total_successes,
        report.summary.total_attempts,
    ));
    out
}
