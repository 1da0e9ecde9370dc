//! Case directory lifecycle.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};
use tracing::info;
use uuid::{NoContext, Timestamp, Uuid};

use quarry_oracle::Summary;

use crate::archive::write_archive;
use crate::data_tsv::{TableData, write_data_tsv};
use crate::json::write_json_file;
use crate::schema_sql::{SchemaDdl, write_schema_sql};
use crate::{ReportError, Result};

const ARCHIVE_NAME: &str = "case.tar.zst";
const ARCHIVE_CODEC: &str = "tar+zstd";

/// A case identifier: UUIDv7 when the clock permits, UUIDv4 otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseId(Uuid);

impl CaseId {
    pub fn new() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(epoch) => Self(Uuid::new_v7(Timestamp::from_unix(
                NoContext,
                epoch.as_secs(),
                epoch.subsec_nanos(),
            ))),
            Err(_) => Self(Uuid::new_v4()),
        }
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Everything the reporter persists for one case.
#[derive(Debug, Clone)]
pub struct CaseMaterials {
    /// Summary with oracle fields filled; the reporter completes the
    /// case/archive fields.
    pub summary: Summary,
    pub schema: Vec<SchemaDdl>,
    /// Database name stripped from qualifiers in `schema.sql`.
    pub database: String,
    pub data: Vec<TableData>,
    pub inserts: Vec<String>,
    /// The (possibly minimized) failing statement sequence.
    pub case_sql: Vec<String>,
}

/// Where a persisted case landed.
#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub case_id: String,
    pub dir: PathBuf,
    pub archive: PathBuf,
}

/// Writes case directories under a root.
///
/// One reporter belongs to one worker; the sequence counter needs no
/// locking.
#[derive(Debug)]
pub struct Reporter {
    root: PathBuf,
    sequence_names: bool,
    data_row_cap: usize,
    sequence: u64,
}

impl Reporter {
    pub fn new(root: impl Into<PathBuf>, sequence_names: bool, data_row_cap: usize) -> Self {
        Self {
            root: root.into(),
            sequence_names,
            data_row_cap,
            sequence: 0,
        }
    }

    /// Persists one case: directory, artifact files, summary, archive.
    ///
    /// The archive is written last; a consumer that requires both the
    /// summary and the archive can treat the directory atomically.
    pub fn persist(&mut self, mut materials: CaseMaterials) -> Result<CaseRecord> {
        let case_id = CaseId::new();
        let dir_name = if self.sequence_names {
            self.sequence += 1;
            format!("case_{}_{case_id}", self.sequence)
        } else {
            case_id.to_string()
        };
        let dir = self.root.join(&dir_name);
        fs::create_dir_all(&dir).map_err(ReportError::io(dir.display().to_string()))?;

        materials.summary.case_id = case_id.to_string();
        materials.summary.case_dir = dir_name;
        materials.summary.archive = ARCHIVE_NAME.to_string();
        materials.summary.archive_codec = ARCHIVE_CODEC.to_string();
        if materials.summary.timestamp.is_empty() {
            materials.summary.timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        }

        write_text(
            &dir.join("schema.sql"),
            &write_schema_sql(&materials.schema, &materials.database),
        )?;
        write_text(
            &dir.join("data.tsv"),
            &write_data_tsv(&materials.data, self.data_row_cap),
        )?;
        write_text(&dir.join("inserts.sql"), &statements_file(&materials.inserts))?;
        write_text(&dir.join("case.sql"), &statements_file(&materials.case_sql))?;
        write_text(&dir.join("README.md"), &readme(&materials.summary))?;

        write_json_file(&dir.join("summary.json"), &materials.summary)?;
        write_json_file(&dir.join("report.json"), &materials.summary)?;

        write_archive(&dir, ARCHIVE_NAME)?;

        info!(case_id = %case_id, dir = %dir.display(), "case persisted");
        Ok(CaseRecord {
            case_id: case_id.to_string(),
            archive: dir.join(ARCHIVE_NAME),
            dir,
        })
    }
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(ReportError::io(path.display().to_string()))
}

fn statements_file(statements: &[String]) -> String {
    let mut out = String::new();
    for statement in statements {
        out.push_str(statement.trim_end_matches(';'));
        out.push_str(";\n");
    }
    out
}

fn readme(summary: &Summary) -> String {
    format!(
        "# Case {id}\n\n\
         Oracle: `{oracle}`\n\n\
         Expected: `{expected}`\n\
         Actual: `{actual}`\n\n\
         ## Reproduce\n\n\
         1. Apply `schema.sql` to an empty database.\n\
         2. Apply `inserts.sql`.\n\
         3. Run `case.sql` and compare with `summary.json`.\n",
        id = summary.case_id,
        oracle = summary.oracle,
        expected = summary.expected,
        actual = summary.actual,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn materials() -> CaseMaterials {
        let mut summary = Summary::default();
        summary.oracle = "cardinality".to_string();
        summary.expected = "6".to_string();
        summary.actual = "5".to_string();
        CaseMaterials {
            summary,
            schema: vec![SchemaDdl {
                name: "t0".to_string(),
                create_sql: "CREATE TABLE t0 (a INT)".to_string(),
                is_view: false,
            }],
            database: "test".to_string(),
            data: vec![TableData {
                name: "t0".to_string(),
                columns: vec!["a".to_string()],
                rows: vec![vec![Some("1".to_string())]],
            }],
            inserts: vec!["INSERT INTO t0 VALUES (1)".to_string()],
            case_sql: vec!["SELECT * FROM t0".to_string()],
        }
    }

    #[test]
    fn persists_the_full_artifact_set() {
        let root = tempfile::tempdir().unwrap();
        let mut reporter = Reporter::new(root.path(), false, 100);
        let record = reporter.persist(materials()).unwrap();

        for file in [
            "schema.sql",
            "data.tsv",
            "inserts.sql",
            "case.sql",
            "README.md",
            "summary.json",
            "report.json",
            "case.tar.zst",
        ] {
            assert!(record.dir.join(file).exists(), "missing {file}");
        }
    }

    #[test]
    fn summary_carries_case_identity() {
        let root = tempfile::tempdir().unwrap();
        let mut reporter = Reporter::new(root.path(), false, 100);
        let record = reporter.persist(materials()).unwrap();

        let bytes = fs::read(record.dir.join("summary.json")).unwrap();
        let summary: Summary = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(summary.case_id, record.case_id);
        assert_eq!(summary.archive, "case.tar.zst");
        assert_eq!(summary.archive_codec, "tar+zstd");
        assert!(!summary.timestamp.is_empty());
    }

    #[test]
    fn sequence_naming_prefixes_directories() {
        let root = tempfile::tempdir().unwrap();
        let mut reporter = Reporter::new(root.path(), true, 100);
        let first = reporter.persist(materials()).unwrap();
        let second = reporter.persist(materials()).unwrap();

        let first_name = first.dir.file_name().unwrap().to_string_lossy().to_string();
        let second_name = second.dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(first_name.starts_with("case_1_"));
        assert!(second_name.starts_with("case_2_"));
    }

    #[test]
    fn case_ids_are_unique_and_parseable() {
        let a = CaseId::new();
        let b = CaseId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 7);
    }

    #[test]
    fn statements_gain_terminators() {
        assert_eq!(
            statements_file(&["SELECT 1".to_string(), "SELECT 2;".to_string()]),
            "SELECT 1;\nSELECT 2;\n"
        );
    }
}
