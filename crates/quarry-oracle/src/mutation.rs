//! The mutation oracle.
//!
//! Normalizes a generated SELECT, enumerates direction-tagged mutants,
//! and holds the database to the implied partial order: an upper mutant
//! may not return fewer rows than the baseline, a lower mutant may not
//! return more.

use std::collections::BTreeMap;

use tracing::debug;

use quarry_mutate::{MutateError, NormalizeOptions, apply, enumerate, normalize};
use quarry_types::{DbExecutor, Deadline};

use crate::classify::{Classification, classify_db_error};
use crate::replay::ReplaySpec;
use crate::{Mismatch, Outcome, Result};

/// Wraps a query so its row count can be read with `query_count`.
pub fn count_wrap(sql: &str) -> String {
    format!("SELECT COUNT(*) FROM ({sql}) AS q")
}

/// Runs the mutation partial-order check over one generated query.
#[derive(Debug, Default)]
pub struct MutationOracle {
    pub options: NormalizeOptions,
}

impl MutationOracle {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    pub fn name(&self) -> &'static str {
        "mutation"
    }

    /// Checks every enumerated mutant; returns the first violation.
    pub fn check(
        &self,
        sql: &str,
        db: &mut dyn DbExecutor,
        deadline: Deadline,
    ) -> Result<Outcome> {
        let normalized = match normalize(sql, &self.options) {
            Ok(n) => n,
            Err(MutateError::Sql(e)) => {
                return Ok(Outcome::skipped(format!("parse: {e}")));
            }
            Err(MutateError::RecursiveCte) => {
                return Ok(Outcome::skipped("unsupported: recursive cte"));
            }
            Err(MutateError::Unsupported(what)) => {
                return Ok(Outcome::skipped(format!("unsupported: {what}")));
            }
            Err(e) => return Err(e.into()),
        };

        let baseline_sql = count_wrap(&normalized.sql);
        let baseline = match db.query_count(&baseline_sql, deadline) {
            Ok(n) => n,
            Err(e) => return Ok(self.judge_error(&normalized.sql, &baseline_sql, &e)),
        };

        let mut statement = normalized.statement;
        let candidates = enumerate(&statement)?;
        debug!(candidates = candidates.len(), baseline, "mutation oracle run");

        for candidate in &candidates {
            if deadline.expired() {
                return Ok(Outcome::skipped("cancelled"));
            }
            let mutant_sql = apply(&mut statement, candidate)?;
            let mutant_count_sql = count_wrap(&mutant_sql);
            let mutant = match db.query_count(&mutant_count_sql, deadline) {
                Ok(n) => n,
                Err(e) => match classify_db_error(&e) {
                    // A mutant is semantically valid whenever the baseline
                    // was; an execution error here is a guardrail miss, not
                    // a bug. Drift and panics are still findings.
                    Classification::Execution(_) => continue,
                    _ => return Ok(self.judge_error(&normalized.sql, &mutant_count_sql, &e)),
                },
            };

            let violated = if candidate.is_upper() {
                mutant < baseline
            } else {
                mutant > baseline
            };
            if !violated {
                continue;
            }

            let bound = if candidate.is_upper() { ">=" } else { "<=" };
            let mut details = BTreeMap::new();
            details.insert(
                "mutation".to_string(),
                serde_json::json!(candidate.kind.name()),
            );
            details.insert("is_upper".to_string(), serde_json::json!(candidate.is_upper()));
            details.insert("flag".to_string(), serde_json::json!(candidate.flag));
            details.insert("baseline_count".to_string(), serde_json::json!(baseline));
            details.insert("mutant_count".to_string(), serde_json::json!(mutant));

            return Ok(Outcome::Mismatch(Box::new(Mismatch {
                oracle: self.name().to_string(),
                sql: vec![normalized.sql.clone(), mutant_sql],
                expected: format!("mutant count {bound} {baseline}"),
                actual: mutant.to_string(),
                error: String::new(),
                details,
                replay: ReplaySpec::count(baseline_sql, mutant_count_sql),
                ground_truth: None,
            })));
        }

        Ok(Outcome::Ok)
    }

    /// Folds a database error on the baseline or a mutant into an outcome.
    fn judge_error(&self, baseline_sql: &str, failing_sql: &str, error: &quarry_types::DbError) -> Outcome {
        match classify_db_error(error) {
            Classification::SchemaDrift(msg) => Outcome::Mismatch(Box::new(Mismatch {
                oracle: self.name().to_string(),
                sql: vec![baseline_sql.to_string(), failing_sql.to_string()],
                expected: "schema state matches the database".to_string(),
                actual: msg.clone(),
                error: msg.clone(),
                details: BTreeMap::new(),
                replay: ReplaySpec::case_error(failing_sql, msg),
                ground_truth: None,
            })),
            Classification::Panic(msg) => Outcome::Mismatch(Box::new(Mismatch {
                oracle: self.name().to_string(),
                sql: vec![baseline_sql.to_string(), failing_sql.to_string()],
                expected: "no server crash".to_string(),
                actual: msg.clone(),
                error: msg.clone(),
                details: BTreeMap::new(),
                replay: ReplaySpec::case_error(failing_sql, msg),
                ground_truth: None,
            })),
            Classification::Skip(reason) | Classification::Execution(reason) => {
                Outcome::skipped(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplayKind;
    use crate::testing::ScriptedDb;
    use quarry_types::DbError;

    /// Scripts a database that honors one mutant and violates another.
    #[test]
    fn upper_mutant_losing_rows_is_a_mismatch() {
        let baseline = "SELECT a FROM t0 WHERE a < 1";
        // Baseline count 5; the WhereTrueU mutant (WHERE 1) returns 3,
        // which an upper mutation may never do.
        let mut db = ScriptedDb::new()
            .with_count(&count_wrap(baseline), 5)
            .with_count(&count_wrap("SELECT a FROM t0 WHERE 1"), 3)
            .with_count(&count_wrap("SELECT a FROM t0 WHERE 0"), 0)
            .with_count(&count_wrap("SELECT a FROM t0 WHERE a <= 1"), 5)
            .with_count(&count_wrap("SELECT DISTINCT a FROM t0 WHERE a < 1"), 5);

        let oracle = MutationOracle::default();
        let outcome = oracle.check(baseline, &mut db, Deadline::none()).unwrap();
        let Outcome::Mismatch(mismatch) = outcome else {
            panic!("expected mismatch");
        };
        assert_eq!(mismatch.oracle, "mutation");
        assert_eq!(mismatch.replay.kind, ReplayKind::Count);
        assert_eq!(
            mismatch.details.get("mutation").unwrap(),
            &serde_json::json!("WhereTrueU")
        );
    }

    #[test]
    fn order_respected_is_ok() {
        let baseline = "SELECT a FROM t0 WHERE a < 1";
        let mut db = ScriptedDb::new()
            .with_count(&count_wrap(baseline), 5)
            .with_count(&count_wrap("SELECT a FROM t0 WHERE 1"), 9)
            .with_count(&count_wrap("SELECT a FROM t0 WHERE 0"), 0)
            .with_count(&count_wrap("SELECT a FROM t0 WHERE a <= 1"), 6)
            .with_count(&count_wrap("SELECT DISTINCT a FROM t0 WHERE a < 1"), 4);

        let oracle = MutationOracle::default();
        let outcome = oracle.check(baseline, &mut db, Deadline::none()).unwrap();
        assert!(matches!(outcome, Outcome::Ok));
    }

    #[test]
    fn schema_drift_is_a_confirmed_mismatch() {
        let baseline = "SELECT a FROM t0 WHERE a < 1";
        let mut db = ScriptedDb::new().with_error(
            &count_wrap(baseline),
            DbError::SchemaColumnMissing("t0.a".to_string()),
        );
        let oracle = MutationOracle::default();
        let outcome = oracle.check(baseline, &mut db, Deadline::none()).unwrap();
        let Outcome::Mismatch(mismatch) = outcome else {
            panic!("expected mismatch");
        };
        assert_eq!(mismatch.replay.kind, ReplayKind::CaseError);
    }

    #[test]
    fn transient_baseline_failure_skips() {
        let baseline = "SELECT a FROM t0 WHERE a < 1";
        let mut db = ScriptedDb::new().with_error(
            &count_wrap(baseline),
            DbError::Transient("connection reset".to_string()),
        );
        let oracle = MutationOracle::default();
        let outcome = oracle.check(baseline, &mut db, Deadline::none()).unwrap();
        assert!(matches!(outcome, Outcome::Skipped { .. }));
    }

    #[test]
    fn mutant_execution_error_is_tolerated() {
        let baseline = "SELECT a FROM t0 WHERE a < 1";
        let mut db = ScriptedDb::new()
            .with_count(&count_wrap(baseline), 5)
            .with_error(
                &count_wrap("SELECT a FROM t0 WHERE 1"),
                DbError::Execution("unsupported rewrite".to_string()),
            )
            .with_count(&count_wrap("SELECT a FROM t0 WHERE 0"), 0)
            .with_count(&count_wrap("SELECT a FROM t0 WHERE a <= 1"), 5)
            .with_count(&count_wrap("SELECT DISTINCT a FROM t0 WHERE a < 1"), 5);

        let oracle = MutationOracle::default();
        let outcome = oracle.check(baseline, &mut db, Deadline::none()).unwrap();
        assert!(matches!(outcome, Outcome::Ok));
    }

    #[test]
    fn dml_input_is_skipped_not_fatal() {
        let mut db = ScriptedDb::new();
        let oracle = MutationOracle::default();
        let outcome = oracle
            .check("INSERT INTO t0 VALUES (1)", &mut db, Deadline::none())
            .unwrap();
        assert!(matches!(outcome, Outcome::Skipped { .. }));
    }
}
