//! Condition Planner
//!
//! Selects and orders the conditions a run covers.
//!
//! Filtering: an optional regex matched against condition names. Ordering is
//! the stable matrix order, so interrupted runs resume deterministically.

use joulecast_core::Condition;

/// Execution plan for a run
pub struct ExecutionPlan {
    /// Ordered list of conditions to run
    pub conditions: Vec<Condition>,
}

/// Build the execution plan from the condition matrix.
pub fn build_plan(filter: Option<&regex::Regex>) -> ExecutionPlan {
    let conditions = Condition::matrix()
        .into_iter()
        .filter(|c| filter.map(|re| re.is_match(&c.name())).unwrap_or(true))
        .collect();
    ExecutionPlan { conditions }
}
