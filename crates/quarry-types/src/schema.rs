//! The generator's view of the schema under test.
//!
//! Oracles never introspect the live database; they trust this state and
//! treat a disagreement (schema-column-missing at execution time) as a
//! finding in its own right.

use serde::{Deserialize, Serialize};

use crate::value::TypeFamily;

/// One column of a generated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnState {
    pub name: String,
    pub family: TypeFamily,
    pub nullable: bool,
    pub indexed: bool,
}

impl ColumnState {
    pub fn new(name: impl Into<String>, family: TypeFamily) -> Self {
        Self {
            name: name.into(),
            family,
            nullable: true,
            indexed: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// One index of a generated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexState {
    pub name: String,
    pub columns: Vec<String>,
}

/// One generated table (or view).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableState {
    pub name: String,
    pub columns: Vec<ColumnState>,
    pub indexes: Vec<IndexState>,
    pub has_primary_key: bool,
    pub partitioned: bool,
    pub is_view: bool,
}

impl TableState {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnState>) -> Self {
        Self {
            name: name.into(),
            columns,
            indexes: Vec::new(),
            has_primary_key: false,
            partitioned: false,
            is_view: false,
        }
    }

    /// Whether the table has a column with the given name (case-insensitive,
    /// matching MySQL identifier semantics).
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Looks up a column by name (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&ColumnState> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Ordered set of generated tables.
///
/// Order matters: `schema.sql` emission drops in reverse creation order so
/// views fall before the tables they read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaState {
    pub tables: Vec<TableState>,
}

impl SchemaState {
    pub fn new(tables: Vec<TableState>) -> Self {
        Self { tables }
    }

    /// Looks up a table by name (case-insensitive).
    pub fn table(&self, name: &str) -> Option<&TableState> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Base tables only (views excluded).
    pub fn base_tables(&self) -> impl Iterator<Item = &TableState> {
        self.tables.iter().filter(|t| !t.is_view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SchemaState {
        SchemaState::new(vec![
            TableState::new(
                "t0",
                vec![
                    ColumnState::new("id", TypeFamily::Number).not_null(),
                    ColumnState::new("c0", TypeFamily::String),
                ],
            ),
            TableState::new("t1", vec![ColumnState::new("id", TypeFamily::Number)]),
        ])
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let schema = sample();
        let t0 = schema.table("T0").unwrap();
        assert!(t0.has_column("C0"));
        assert!(!t0.has_column("c9"));
    }

    #[test]
    fn base_tables_skip_views() {
        let mut schema = sample();
        schema.tables[1].is_view = true;
        let names: Vec<_> = schema.base_tables().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t0"]);
    }
}
