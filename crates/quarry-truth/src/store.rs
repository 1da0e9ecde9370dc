//! The schema-truth store.
//!
//! Row ids live in one wide universe shared by every table: the generator
//! materializes tables as projections of a single wide dataset, so the
//! same row id can appear in several tables and a bitmap AND across two
//! tables' column maps is meaningful. The store is write-only during
//! ingestion and read-only during evaluation; it lives for exactly one
//! oracle invocation.

use std::collections::BTreeMap;

use quarry_types::TypedValue;

use crate::bitmap::Bitmap;

/// A type-tagged value → bitmap map.
///
/// Keys are family-prefixed (`number:1` vs `string:1`), so values from
/// different families never collide.
#[derive(Debug, Clone, Default)]
pub struct RowIdMap {
    entries: BTreeMap<String, Bitmap>,
}

impl RowIdMap {
    /// Sets `row_id` under the value's key.
    pub fn add(&mut self, value: &TypedValue, row_id: u32) {
        self.entries.entry(value.key()).or_default().set(row_id);
    }

    /// The bitmap stored for a value key, if any.
    pub fn get(&self, key: &str) -> Option<&Bitmap> {
        self.entries.get(key)
    }

    /// Iterates `(value key, bitmap)` entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bitmap)> {
        self.entries.iter().map(|(k, b)| (k.as_str(), b))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of every bitmap in the map.
    pub fn union_all(&self) -> Bitmap {
        let mut all = Bitmap::new();
        for bitmap in self.entries.values() {
            all.or_with(bitmap);
        }
        all
    }
}

/// Truth data for one table.
#[derive(Debug, Clone, Default)]
pub struct TableRows {
    /// Per-column value maps, when column granularity is known.
    columns: BTreeMap<String, RowIdMap>,
    /// Row-level fallback map for values not attributed to a column.
    fallback: RowIdMap,
    /// Typed tuples for exact multiplicity evaluation; no row ids.
    row_data: Vec<BTreeMap<String, TypedValue>>,
}

impl TableRows {
    /// The value map to consult for a column: the column's own map when
    /// ingestion recorded one, the row-level fallback otherwise.
    pub fn values_for(&self, column: &str) -> &RowIdMap {
        self.columns.get(column).unwrap_or(&self.fallback)
    }

    /// Every row id known for this table.
    pub fn all_rows(&self) -> Bitmap {
        let mut all = self.fallback.union_all();
        for map in self.columns.values() {
            all.or_with(&map.union_all());
        }
        all
    }

    /// The stored tuples, in insertion order.
    pub fn tuples(&self) -> &[BTreeMap<String, TypedValue>] {
        &self.row_data
    }

    pub fn has_tuples(&self) -> bool {
        !self.row_data.is_empty()
    }
}

/// The whole truth for one oracle invocation.
#[derive(Debug, Clone, Default)]
pub struct SchemaTruth {
    row_count: u32,
    tables: BTreeMap<String, TableRows>,
}

impl SchemaTruth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table; idempotent.
    pub fn add_table(&mut self, table: &str) {
        self.tables.entry(table.to_string()).or_default();
    }

    /// Records `row_id` under `table.column = value`.
    pub fn add_column_value(&mut self, table: &str, column: &str, value: &TypedValue, row_id: u32) {
        self.bump_row_count(row_id);
        self.tables
            .entry(table.to_string())
            .or_default()
            .columns
            .entry(column.to_string())
            .or_default()
            .add(value, row_id);
    }

    /// Records `row_id` under a table value without column attribution.
    pub fn add_row_value(&mut self, table: &str, value: &TypedValue, row_id: u32) {
        self.bump_row_count(row_id);
        self.tables
            .entry(table.to_string())
            .or_default()
            .fallback
            .add(value, row_id);
    }

    /// Records a full row: one `add_column_value` per column, registering
    /// the table on first sight.
    pub fn add_row<'a>(
        &mut self,
        table: &str,
        row_id: u32,
        columns: impl IntoIterator<Item = (&'a str, &'a TypedValue)>,
    ) {
        self.add_table(table);
        for (column, value) in columns {
            self.add_column_value(table, column, value, row_id);
        }
    }

    /// Appends a typed tuple for exact multiplicity evaluation. No row id
    /// is assigned.
    pub fn add_row_data(&mut self, table: &str, row: BTreeMap<String, TypedValue>) {
        self.tables.entry(table.to_string()).or_default().row_data.push(row);
    }

    /// Truth for one table, if registered.
    pub fn table(&self, name: &str) -> Option<&TableRows> {
        self.tables.get(name)
    }

    /// Size of the wide row universe: one past the highest row id seen.
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    fn bump_row_count(&mut self, row_id: u32) {
        self.row_count = self.row_count.max(row_id + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_types::TypeFamily;

    #[test]
    fn add_table_is_idempotent() {
        let mut truth = SchemaTruth::new();
        truth.add_table("t0");
        truth.add_column_value("t0", "a", &TypedValue::number(1), 0);
        truth.add_table("t0");
        assert_eq!(truth.table("t0").unwrap().all_rows().count(), 1);
    }

    #[test]
    fn row_count_tracks_max_row_id() {
        let mut truth = SchemaTruth::new();
        truth.add_column_value("t0", "a", &TypedValue::number(1), 7);
        truth.add_row_value("t1", &TypedValue::string("x"), 3);
        assert_eq!(truth.row_count(), 8);
    }

    #[test]
    fn families_do_not_collide() {
        let mut truth = SchemaTruth::new();
        truth.add_column_value("t0", "a", &TypedValue::number(1), 0);
        truth.add_column_value("t0", "a", &TypedValue::string("1"), 1);
        let map = truth.table("t0").unwrap().values_for("a");
        assert_eq!(map.get("number:1").unwrap().count(), 1);
        assert_eq!(map.get("string:1").unwrap().count(), 1);
    }

    #[test]
    fn fallback_serves_unknown_columns() {
        let mut truth = SchemaTruth::new();
        truth.add_row_value("t0", &TypedValue::number(5), 2);
        let rows = truth.table("t0").unwrap();
        assert!(rows.values_for("anything").get("number:5").unwrap().has(2));
    }

    #[test]
    fn null_values_key_by_family() {
        let mut truth = SchemaTruth::new();
        truth.add_column_value("t0", "a", &TypedValue::null(TypeFamily::Number), 0);
        let map = truth.table("t0").unwrap().values_for("a");
        assert!(map.get("number:NULL").unwrap().has(0));
    }
}
