//! `schema.sql` emission.
//!
//! Drops run in reverse creation order so views fall before the tables
//! they read; creates run in creation order. View DDL as MySQL reports it
//! carries a `DEFINER` clause and `SQL SECURITY DEFINER`, neither of
//! which replays on another server, so both are normalized away, along
//! with database qualifiers.

/// One table or view as the generator created it.
#[derive(Debug, Clone)]
pub struct SchemaDdl {
    pub name: String,
    /// The CREATE statement, as issued or as reported by SHOW CREATE.
    pub create_sql: String,
    pub is_view: bool,
}

/// Renders the full `schema.sql` content.
pub fn write_schema_sql(tables: &[SchemaDdl], database: &str) -> String {
    let mut out = String::new();

    for table in tables.iter().rev() {
        let object = if table.is_view { "VIEW" } else { "TABLE" };
        out.push_str(&format!("DROP {object} IF EXISTS {};\n", table.name));
    }
    out.push('\n');

    for table in tables {
        let mut ddl = strip_qualifiers(&table.create_sql, database);
        if table.is_view {
            ddl = normalize_view_ddl(&ddl);
        }
        out.push_str(ddl.trim_end_matches(';'));
        out.push_str(";\n");
    }

    out
}

/// Removes `DEFINER=...` and demotes `SQL SECURITY DEFINER` to INVOKER.
fn normalize_view_ddl(ddl: &str) -> String {
    let without_definer: String = ddl
        .split_whitespace()
        .filter(|token| !token.starts_with("DEFINER="))
        .collect::<Vec<_>>()
        .join(" ");
    without_definer.replace("SQL SECURITY DEFINER", "SQL SECURITY INVOKER")
}

/// Strips `db.` and `` `db`. `` qualifiers.
fn strip_qualifiers(ddl: &str, database: &str) -> String {
    if database.is_empty() {
        return ddl.to_string();
    }
    ddl.replace(&format!("`{database}`."), "")
        .replace(&format!("{database}."), "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<SchemaDdl> {
        vec![
            SchemaDdl {
                name: "t0".to_string(),
                create_sql: "CREATE TABLE test.t0 (a INT, b TEXT)".to_string(),
                is_view: false,
            },
            SchemaDdl {
                name: "v0".to_string(),
                create_sql:
                    "CREATE ALGORITHM=UNDEFINED DEFINER=`root`@`%` SQL SECURITY DEFINER \
                     VIEW `test`.`v0` AS SELECT a FROM `test`.`t0`"
                        .to_string(),
                is_view: true,
            },
        ]
    }

    #[test]
    fn drops_run_in_reverse_order() {
        let sql = write_schema_sql(&sample(), "test");
        let drop_view = sql.find("DROP VIEW IF EXISTS v0").unwrap();
        let drop_table = sql.find("DROP TABLE IF EXISTS t0").unwrap();
        assert!(drop_view < drop_table);
    }

    #[test]
    fn view_ddl_is_normalized() {
        let sql = write_schema_sql(&sample(), "test");
        assert!(!sql.contains("DEFINER="));
        assert!(sql.contains("SQL SECURITY INVOKER"));
    }

    #[test]
    fn database_qualifiers_are_stripped() {
        let sql = write_schema_sql(&sample(), "test");
        assert!(!sql.contains("test."));
        assert!(!sql.contains("`test`."));
        assert!(sql.contains("CREATE TABLE t0"));
    }

    #[test]
    fn statements_are_terminated() {
        let sql = write_schema_sql(&sample(), "test");
        assert!(sql.contains("(a INT, b TEXT);"));
    }
}
