//! `data.tsv` emission.
//!
//! One block per table: a `# table: <name>` header, the tab-joined
//! column names, then rows. Rows are ordered by the `id` column when the
//! table has one, by the first column otherwise, and capped so a huge
//! table cannot bloat the case directory. SQL NULL renders as the
//! literal `NULL`.

/// One table's rows, as read back from the database.
#[derive(Debug, Clone)]
pub struct TableData {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Renders the full `data.tsv` content.
pub fn write_data_tsv(tables: &[TableData], row_cap: usize) -> String {
    let mut out = String::new();

    for table in tables {
        out.push_str(&format!("# table: {}\n", table.name));
        out.push_str(&table.columns.join("\t"));
        out.push('\n');

        let order_col = table
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case("id"))
            .unwrap_or(0);

        let mut rows: Vec<&Vec<Option<String>>> = table.rows.iter().collect();
        rows.sort_by(|a, b| cell_key(a, order_col).cmp(&cell_key(b, order_col)));

        let capped = rows.len().min(row_cap);
        for row in &rows[..capped] {
            let line: Vec<&str> = row
                .iter()
                .map(|cell| cell.as_deref().unwrap_or("NULL"))
                .collect();
            out.push_str(&line.join("\t"));
            out.push('\n');
        }
        if rows.len() > capped {
            out.push_str(&format!("# {} rows truncated\n", rows.len() - capped));
        }
        out.push('\n');
    }

    out
}

/// Sort key: numeric when the cell parses as an integer, textual
/// otherwise; NULLs first.
fn cell_key<'a>(row: &'a [Option<String>], col: usize) -> (u8, i128, &'a str) {
    match row.get(col).and_then(Option::as_deref) {
        None => (0, 0, ""),
        Some(text) => match text.parse::<i128>() {
            Ok(n) => (1, n, ""),
            Err(_) => (2, 0, text),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableData {
        TableData {
            name: "t0".to_string(),
            columns: vec!["id".to_string(), "c0".to_string()],
            rows: vec![
                vec![Some("10".to_string()), Some("b".to_string())],
                vec![Some("2".to_string()), None],
                vec![Some("1".to_string()), Some("a".to_string())],
            ],
        }
    }

    #[test]
    fn rows_sort_numerically_by_id() {
        let tsv = write_data_tsv(&[table()], 100);
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines[0], "# table: t0");
        assert_eq!(lines[1], "id\tc0");
        assert_eq!(lines[2], "1\ta");
        assert_eq!(lines[3], "2\tNULL");
        assert_eq!(lines[4], "10\tb");
    }

    #[test]
    fn cap_truncates_with_a_marker() {
        let tsv = write_data_tsv(&[table()], 2);
        assert!(tsv.contains("# 1 rows truncated"));
        assert!(!tsv.contains("10\tb"));
    }

    #[test]
    fn null_renders_literally() {
        let tsv = write_data_tsv(&[table()], 100);
        assert!(tsv.contains("2\tNULL"));
    }
}
