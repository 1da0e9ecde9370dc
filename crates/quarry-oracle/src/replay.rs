//! Replay specifications.
//!
//! A replay spec records *why* a case failed, as the comparison the
//! minimizer must re-run to decide whether a reduced input still fails.
//! It is derived from the oracle result before minimization starts and
//! never changes afterwards.

use serde::{Deserialize, Serialize};

/// The comparison a replay re-checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayKind {
    /// Row signatures (count + checksum) of two queries differ.
    Signature,
    /// Integer results of two count queries differ.
    Count,
    /// The actual plan's row estimate exceeds the expected plan's by more
    /// than the tolerance.
    PlanRows,
    /// A DML's affected-row count differs from a pre-computed value.
    RowsAffected,
    /// Executing the statement sequence reproduces the original error.
    CaseError,
}

impl ReplayKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplayKind::Signature => "signature",
            ReplayKind::Count => "count",
            ReplayKind::PlanRows => "plan_rows",
            ReplayKind::RowsAffected => "rows_affected",
            ReplayKind::CaseError => "case_error",
        }
    }
}

/// What the minimizer replays and how it judges the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySpec {
    pub kind: ReplayKind,
    /// The reference side (a query, a count query, an EXPLAIN, or a
    /// scalar depending on `kind`).
    pub expected_sql: String,
    /// The side under suspicion.
    pub actual_sql: String,
    /// Session variable set before `actual_sql` and reset to DEFAULT
    /// afterwards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_var: Option<SessionVar>,
    /// Relative tolerance for `plan_rows`.
    pub tolerance: f64,
    /// The original error text for `case_error`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// A `SET SESSION` assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionVar {
    pub name: String,
    pub value: String,
}

impl ReplaySpec {
    pub fn count(expected_sql: impl Into<String>, actual_sql: impl Into<String>) -> Self {
        Self {
            kind: ReplayKind::Count,
            expected_sql: expected_sql.into(),
            actual_sql: actual_sql.into(),
            session_var: None,
            tolerance: 0.0,
            error: String::new(),
        }
    }

    pub fn signature(expected_sql: impl Into<String>, actual_sql: impl Into<String>) -> Self {
        Self {
            kind: ReplayKind::Signature,
            expected_sql: expected_sql.into(),
            actual_sql: actual_sql.into(),
            session_var: None,
            tolerance: 0.0,
            error: String::new(),
        }
    }

    pub fn plan_rows(
        expected_sql: impl Into<String>,
        actual_sql: impl Into<String>,
        session_var: Option<SessionVar>,
        tolerance: f64,
    ) -> Self {
        Self {
            kind: ReplayKind::PlanRows,
            expected_sql: expected_sql.into(),
            actual_sql: actual_sql.into(),
            session_var,
            tolerance,
            error: String::new(),
        }
    }

    pub fn rows_affected(expected_count: u64, dml_sql: impl Into<String>) -> Self {
        Self {
            kind: ReplayKind::RowsAffected,
            expected_sql: expected_count.to_string(),
            actual_sql: dml_sql.into(),
            session_var: None,
            tolerance: 0.0,
            error: String::new(),
        }
    }

    pub fn case_error(failing_sql: impl Into<String>, error: impl Into<String>) -> Self {
        let failing = failing_sql.into();
        Self {
            kind: ReplayKind::CaseError,
            expected_sql: failing.clone(),
            actual_sql: failing,
            session_var: None,
            tolerance: 0.0,
            error: error.into(),
        }
    }

    pub fn with_session_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.session_var = Some(SessionVar {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_render_snake_case() {
        assert_eq!(ReplayKind::PlanRows.as_str(), "plan_rows");
        assert_eq!(ReplayKind::CaseError.as_str(), "case_error");
    }

    #[test]
    fn non_empty_kind_populates_sql_fields() {
        let spec = ReplaySpec::count("SELECT COUNT(*) FROM a", "SELECT COUNT(*) FROM b");
        assert!(!spec.expected_sql.is_empty());
        assert!(!spec.actual_sql.is_empty());
    }

    #[test]
    fn serde_round_trip() {
        let spec = ReplaySpec::plan_rows("EXPLAIN SELECT 1", "EXPLAIN SELECT 2", None, 0.2)
            .with_session_var("tidb_opt_agg_push_down", "1");
        let json = serde_json::to_string(&spec).unwrap();
        let back: ReplaySpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ReplayKind::PlanRows);
        assert_eq!(back.session_var.unwrap().name, "tidb_opt_agg_push_down");
    }
}
