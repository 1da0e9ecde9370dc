//! The per-case summary record.
//!
//! One summary is written per case, to `summary.json` and `report.json`.
//! Encoding is byte-stable under re-encoding: field order is fixed by the
//! struct, the details map is a `BTreeMap`, and the reporter serializes
//! with sorted keys, two-space indent, and no HTML escaping.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::Mismatch;

/// Ground-truth context attached to cardinality mismatches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    /// Whether the database disagreed with the computed truth.
    pub mismatch: bool,
    /// Base table plus ordered `joinType:rightTable` entries.
    pub join_signature: String,
    /// The computed truth row count.
    pub row_count: u64,
}

/// The summary record for one case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub oracle: String,
    /// Statements involved, baseline first.
    pub sql: Vec<String>,
    pub expected: String,
    pub actual: String,
    pub error: String,
    pub error_reason: String,
    pub replay_sql: String,
    /// Minimizer status: `disabled`, `reduced`, `timeout`, or `failed`.
    pub minimize: String,
    pub seed: u64,
    pub case_id: String,
    pub case_dir: String,
    pub archive: String,
    pub archive_codec: String,
    pub details: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groundtruth: Option<GroundTruthRecord>,
    pub timestamp: String,
    pub server_version: String,
    pub plan_signature: String,
}

impl Summary {
    /// Builds a summary skeleton from a mismatch; case/reporting fields
    /// are filled in by the reporter.
    pub fn from_mismatch(mismatch: &Mismatch, seed: u64, now: DateTime<Utc>) -> Self {
        Self {
            oracle: mismatch.oracle.clone(),
            sql: mismatch.sql.clone(),
            expected: mismatch.expected.clone(),
            actual: mismatch.actual.clone(),
            error: mismatch.error.clone(),
            error_reason: String::new(),
            replay_sql: mismatch.replay.actual_sql.clone(),
            minimize: "disabled".to_string(),
            seed,
            case_id: String::new(),
            case_dir: String::new(),
            archive: String::new(),
            archive_codec: String::new(),
            details: mismatch.details.clone(),
            groundtruth: mismatch.ground_truth.clone(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            server_version: String::new(),
            plan_signature: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplaySpec;

    #[test]
    fn details_map_keys_are_sorted() {
        let mut summary = Summary::default();
        summary.details.insert("zeta".to_string(), serde_json::json!(1));
        summary.details.insert("alpha".to_string(), serde_json::json!(2));
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.find("alpha").unwrap() < json.find("zeta").unwrap());
    }

    #[test]
    fn groundtruth_absent_when_none() {
        let summary = Summary::default();
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("groundtruth"));
    }

    #[test]
    fn encode_decode_encode_is_stable() {
        let mismatch = Mismatch {
            oracle: "cardinality".to_string(),
            sql: vec!["SELECT 1".to_string()],
            expected: "4".to_string(),
            actual: "5".to_string(),
            error: String::new(),
            details: BTreeMap::from([("b".to_string(), serde_json::json!("x"))]),
            replay: ReplaySpec::count("SELECT 4", "SELECT 5"),
            ground_truth: Some(GroundTruthRecord {
                mismatch: true,
                join_signature: "t0|inner:t1".to_string(),
                row_count: 4,
            }),
        };
        let summary = Summary::from_mismatch(&mismatch, 42, Utc::now());
        let first = serde_json::to_vec(&summary).unwrap();
        let decoded: Summary = serde_json::from_slice(&first).unwrap();
        let second = serde_json::to_vec(&decoded).unwrap();
        assert_eq!(first, second);
    }
}
