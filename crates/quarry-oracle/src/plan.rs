//! The plan-estimation oracle.
//!
//! Flipping an optimizer session variable must not regress the root row
//! estimate beyond a relative tolerance. Catches estimation paths that
//! only misbehave under a non-default optimizer switch.

use std::collections::BTreeMap;

use tracing::debug;

use quarry_sql::{plan_rows, plan_signature};
use quarry_types::{DbExecutor, Deadline};

use crate::classify::{Classification, classify_db_error};
use crate::replay::{ReplaySpec, SessionVar};
use crate::{Mismatch, Outcome, Result};

/// Compares EXPLAIN row estimates with and without a session variable.
#[derive(Debug, Clone)]
pub struct PlanOracle {
    pub session_var: SessionVar,
    /// Relative tolerance; 0.2 means a 20% regression is allowed.
    pub tolerance: f64,
}

impl PlanOracle {
    pub fn new(name: impl Into<String>, value: impl Into<String>, tolerance: f64) -> Self {
        Self {
            session_var: SessionVar {
                name: name.into(),
                value: value.into(),
            },
            tolerance,
        }
    }

    pub fn name(&self) -> &'static str {
        "plan_rows"
    }

    pub fn check(
        &self,
        sql: &str,
        db: &mut dyn DbExecutor,
        deadline: Deadline,
    ) -> Result<Outcome> {
        let explain = format!("EXPLAIN {sql}");

        let baseline = match db.query(&explain, deadline) {
            Ok(rows) => rows,
            Err(e) => return Ok(skip_or_report(&e)),
        };
        let Some(expected) = plan_rows(&baseline) else {
            return Ok(Outcome::skipped("no plan estimate in EXPLAIN output"));
        };

        let set = format!(
            "SET SESSION {} = {}",
            self.session_var.name, self.session_var.value
        );
        if let Err(e) = db.exec(&set, deadline) {
            return Ok(skip_or_report(&e));
        }
        // Capture first, reset unconditionally, judge after: the session
        // must not leak the variable on any path.
        let varied = db.query(&explain, deadline);
        let reset = format!("SET SESSION {} = DEFAULT", self.session_var.name);
        let reset_result = db.exec(&reset, deadline);

        let varied = match varied {
            Ok(rows) => rows,
            Err(e) => return Ok(skip_or_report(&e)),
        };
        if let Err(e) = reset_result {
            return Ok(skip_or_report(&e));
        }
        let Some(actual) = plan_rows(&varied) else {
            return Ok(Outcome::skipped("no plan estimate under session var"));
        };

        debug!(expected, actual, var = %self.session_var.name, "plan estimate check");
        if actual <= expected * (1.0 + self.tolerance) {
            return Ok(Outcome::Ok);
        }

        let mut details = BTreeMap::new();
        details.insert("expected_rows".to_string(), serde_json::json!(expected));
        details.insert("actual_rows".to_string(), serde_json::json!(actual));
        details.insert("tolerance".to_string(), serde_json::json!(self.tolerance));
        details.insert(
            "baseline_plan".to_string(),
            serde_json::json!(plan_signature(&baseline)),
        );
        details.insert(
            "varied_plan".to_string(),
            serde_json::json!(plan_signature(&varied)),
        );

        Ok(Outcome::Mismatch(Box::new(Mismatch {
            oracle: self.name().to_string(),
            sql: vec![sql.to_string()],
            expected: expected.to_string(),
            actual: actual.to_string(),
            error: String::new(),
            details,
            replay: ReplaySpec::plan_rows(
                explain.clone(),
                explain,
                Some(self.session_var.clone()),
                self.tolerance,
            ),
            ground_truth: None,
        })))
    }
}

fn skip_or_report(error: &quarry_types::DbError) -> Outcome {
    match classify_db_error(error) {
        Classification::Skip(reason) | Classification::Execution(reason) => {
            Outcome::skipped(reason)
        }
        Classification::SchemaDrift(msg) | Classification::Panic(msg) => Outcome::skipped(msg),
    }
}
