//! The affected-rows oracle.
//!
//! Before running a DML, the engine counts the rows its predicate
//! matches; the DML must then report exactly that many affected rows.

use std::collections::BTreeMap;

use quarry_types::{DbExecutor, Deadline};

use crate::classify::{Classification, classify_db_error};
use crate::replay::ReplaySpec;
use crate::{Mismatch, Outcome, Result};

/// Checks a DML's reported affected-row count.
#[derive(Debug, Default)]
pub struct AffectedRowsOracle;

impl AffectedRowsOracle {
    pub fn name(&self) -> &'static str {
        "rows_affected"
    }

    /// `count_sql` counts the rows the DML's predicate matches;
    /// `dml_sql` is the DELETE/UPDATE under test.
    pub fn check(
        &self,
        count_sql: &str,
        dml_sql: &str,
        db: &mut dyn DbExecutor,
        deadline: Deadline,
    ) -> Result<Outcome> {
        let expected = match db.query_count(count_sql, deadline) {
            Ok(n) => n,
            Err(e) => return Ok(self.judge_error(count_sql, dml_sql, &e)),
        };
        let result = match db.exec(dml_sql, deadline) {
            Ok(r) => r,
            Err(e) => return Ok(self.judge_error(count_sql, dml_sql, &e)),
        };

        if result.rows_affected == expected {
            return Ok(Outcome::Ok);
        }

        let mut details = BTreeMap::new();
        details.insert("expected_affected".to_string(), serde_json::json!(expected));
        details.insert(
            "reported_affected".to_string(),
            serde_json::json!(result.rows_affected),
        );

        Ok(Outcome::Mismatch(Box::new(Mismatch {
            oracle: self.name().to_string(),
            sql: vec![count_sql.to_string(), dml_sql.to_string()],
            expected: expected.to_string(),
            actual: result.rows_affected.to_string(),
            error: String::new(),
            details,
            replay: ReplaySpec::rows_affected(expected, dml_sql),
            ground_truth: None,
        })))
    }

    fn judge_error(
        &self,
        count_sql: &str,
        dml_sql: &str,
        error: &quarry_types::DbError,
    ) -> Outcome {
        match classify_db_error(error) {
            Classification::Skip(reason) | Classification::Execution(reason) => {
                Outcome::skipped(reason)
            }
            Classification::SchemaDrift(msg) | Classification::Panic(msg) => {
                Outcome::Mismatch(Box::new(Mismatch {
                    oracle: self.name().to_string(),
                    sql: vec![count_sql.to_string(), dml_sql.to_string()],
                    expected: "statement executes".to_string(),
                    actual: msg.clone(),
                    error: msg.clone(),
                    details: BTreeMap::new(),
                    replay: ReplaySpec::case_error(dml_sql, msg),
                    ground_truth: None,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplayKind;
    use crate::testing::ScriptedDb;

    #[test]
    fn exact_count_is_ok() {
        let mut db = ScriptedDb::new()
            .with_count("SELECT COUNT(*) FROM t0 WHERE a < 5", 3)
            .with_affected("DELETE FROM t0 WHERE a < 5", 3);
        let outcome = AffectedRowsOracle
            .check(
                "SELECT COUNT(*) FROM t0 WHERE a < 5",
                "DELETE FROM t0 WHERE a < 5",
                &mut db,
                Deadline::none(),
            )
            .unwrap();
        assert!(matches!(outcome, Outcome::Ok));
    }

    #[test]
    fn shortfall_is_a_mismatch() {
        let mut db = ScriptedDb::new()
            .with_count("SELECT COUNT(*) FROM t0 WHERE a < 5", 3)
            .with_affected("DELETE FROM t0 WHERE a < 5", 2);
        let outcome = AffectedRowsOracle
            .check(
                "SELECT COUNT(*) FROM t0 WHERE a < 5",
                "DELETE FROM t0 WHERE a < 5",
                &mut db,
                Deadline::none(),
            )
            .unwrap();
        let Outcome::Mismatch(mismatch) = outcome else {
            panic!("expected mismatch");
        };
        assert_eq!(mismatch.replay.kind, ReplayKind::RowsAffected);
        assert_eq!(mismatch.replay.expected_sql, "3");
    }
}
