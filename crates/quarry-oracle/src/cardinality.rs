//! The ground-truth cardinality oracle.
//!
//! Rebuilds the schema truth from the generator's inserted rows, recovers
//! join edges from the typed tree (refined against the SQL), evaluates
//! the join row count independently, and cross-checks the database.

use std::collections::BTreeMap;

use tracing::debug;

use quarry_extract::{extract_tree, refine};
use quarry_truth::{EvalCaps, JoinCount, SchemaTruth, bitmap_count, exact_count};
use quarry_types::{DbExecutor, Deadline, GenQuery, JoinEdge, JoinKind, SchemaState, TypedValue};

use crate::classify::{Classification, classify_db_error};
use crate::mutation::count_wrap;
use crate::replay::ReplaySpec;
use crate::summary::GroundTruthRecord;
use crate::{Mismatch, Outcome, Result};

/// One generated row as the truth store ingests it.
#[derive(Debug, Clone)]
pub struct TruthRow {
    pub table: String,
    /// Wide-table row id; shared across tables projected from the same
    /// wide row.
    pub row_id: u32,
    pub columns: BTreeMap<String, TypedValue>,
}

/// Cross-checks reported join cardinality against computed truth.
#[derive(Debug, Default)]
pub struct CardinalityOracle {
    pub caps: EvalCaps,
}

impl CardinalityOracle {
    pub fn new(caps: EvalCaps) -> Self {
        Self { caps }
    }

    pub fn name(&self) -> &'static str {
        "cardinality"
    }

    pub fn check(
        &self,
        schema: &SchemaState,
        query: &GenQuery,
        sql: &str,
        rows: &[TruthRow],
        db: &mut dyn DbExecutor,
        deadline: Deadline,
    ) -> Result<Outcome> {
        if query.from.joins.is_empty() {
            return Ok(Outcome::skipped("no joins"));
        }

        let mut truth = SchemaTruth::new();
        for row in rows {
            truth.add_row(
                &row.table,
                row.row_id,
                row.columns.iter().map(|(k, v)| (k.as_str(), v)),
            );
            truth.add_row_data(&row.table, row.columns.clone());
        }

        let edges = refine(schema, sql, extract_tree(schema, query));
        if edges.iter().any(JoinEdge::missing_keys) {
            let reasons: Vec<&str> = edges
                .iter()
                .filter(|e| e.missing_keys())
                .map(|e| e.reason.as_str())
                .collect();
            return Ok(Outcome::skipped(format!(
                "unresolved edges: {}",
                reasons.join(",")
            )));
        }

        let computed = match exact_count(&truth, &edges, &self.caps) {
            JoinCount::Count(n) => n,
            JoinCount::Skipped(reason) => {
                // Bitmap mode is only trustworthy for INNER joins on
                // simple keys; anything else stays skipped.
                if edges
                    .iter()
                    .all(|e| e.kind == JoinKind::Inner && e.left_keys.len() == 1)
                {
                    match bitmap_count(&truth, &edges) {
                        JoinCount::Count(n) => n,
                        JoinCount::Skipped(r) => return Ok(Outcome::skipped(r.as_str())),
                    }
                } else {
                    return Ok(Outcome::skipped(reason.as_str()));
                }
            }
        };

        let count_sql = count_wrap(sql);
        let reported = match db.query_count(&count_sql, deadline) {
            Ok(n) => n,
            Err(e) => {
                return Ok(match classify_db_error(&e) {
                    Classification::SchemaDrift(msg) | Classification::Panic(msg) => {
                        Outcome::Mismatch(Box::new(Mismatch {
                            oracle: self.name().to_string(),
                            sql: vec![sql.to_string()],
                            expected: computed.to_string(),
                            actual: msg.clone(),
                            error: msg.clone(),
                            details: BTreeMap::new(),
                            replay: ReplaySpec::case_error(&count_sql, msg),
                            ground_truth: None,
                        }))
                    }
                    Classification::Skip(reason) | Classification::Execution(reason) => {
                        Outcome::skipped(reason)
                    }
                });
            }
        };

        debug!(computed, reported, joins = edges.len(), "cardinality check");
        if reported == computed {
            return Ok(Outcome::Ok);
        }

        let mut details = BTreeMap::new();
        details.insert(
            "edges".to_string(),
            serde_json::to_value(&edges).unwrap_or_default(),
        );
        details.insert("computed_count".to_string(), serde_json::json!(computed));
        details.insert("reported_count".to_string(), serde_json::json!(reported));

        Ok(Outcome::Mismatch(Box::new(Mismatch {
            oracle: self.name().to_string(),
            sql: vec![sql.to_string()],
            expected: computed.to_string(),
            actual: reported.to_string(),
            error: String::new(),
            details,
            replay: ReplaySpec::count(format!("SELECT {computed}"), count_sql),
            ground_truth: Some(GroundTruthRecord {
                mismatch: true,
                join_signature: query.join_signature(),
                row_count: computed,
            }),
        })))
    }
}
