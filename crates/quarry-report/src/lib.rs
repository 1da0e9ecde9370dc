//! # quarry-report: case persistence
//!
//! Turns a confirmed mismatch into a reproducible artifact on disk: a
//! case directory holding `summary.json` / `report.json`, `schema.sql`,
//! `data.tsv`, `case.sql`, `inserts.sql`, and a `README.md`, plus a
//! `case.tar.zst` archive of the lot. Writes are arranged so a consumer
//! never observes a half-written case: the archive lands under a `.tmp`
//! name and is renamed into place last.

mod archive;
mod case;
mod data_tsv;
mod json;
mod schema_sql;

pub use archive::write_archive;
pub use case::{CaseId, CaseMaterials, CaseRecord, Reporter};
pub use data_tsv::{TableData, write_data_tsv};
pub use json::{encode_stable, write_json_file};
pub use schema_sql::{SchemaDdl, write_schema_sql};

/// Errors from case persistence.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    pub(crate) fn io(path: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ReportError::Io { path, source }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
