//! Per-thread parser pool.
//!
//! Parsers are stateless but carry a recursion guard; one lives per thread
//! of execution and each checkout is scoped to a single parse. The pool is
//! never shared across concurrent extractions.

use std::cell::RefCell;

use sqlparser::ast::{Query, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::{Result, SqlError};

/// Nesting bound for pathological input; generated queries stay far below.
const RECURSION_LIMIT: usize = 200;

struct PooledParser {
    dialect: MySqlDialect,
}

impl PooledParser {
    fn parse(&self, sql: &str) -> Result<Vec<Statement>> {
        Parser::new(&self.dialect)
            .with_recursion_limit(RECURSION_LIMIT)
            .try_with_sql(sql)
            .map_err(|e| SqlError::Parse(e.to_string()))?
            .parse_statements()
            .map_err(|e| SqlError::Parse(e.to_string()))
    }
}

thread_local! {
    static POOL: RefCell<PooledParser> = RefCell::new(PooledParser {
        dialect: MySqlDialect {},
    });
}

/// Parses a SQL text into its statements.
pub fn parse_statements(sql: &str) -> Result<Vec<Statement>> {
    POOL.with(|p| p.borrow().parse(sql))
}

/// Parses a SQL text expected to hold exactly one statement.
pub fn parse_statement(sql: &str) -> Result<Statement> {
    let mut statements = parse_statements(sql)?;
    if statements.len() != 1 {
        return Err(SqlError::NotSingleStatement(statements.len()));
    }
    Ok(statements.remove(0))
}

/// Parses a SQL text expected to hold exactly one SELECT or set operation.
pub fn parse_query(sql: &str) -> Result<Box<Query>> {
    match parse_statement(sql)? {
        Statement::Query(query) => Ok(query),
        other => Err(SqlError::Unsupported(format!(
            "expected a query, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_select() {
        let stmt = parse_statement("SELECT 1").unwrap();
        assert!(matches!(stmt, Statement::Query(_)));
    }

    #[test]
    fn rejects_multiple_statements() {
        let err = parse_statement("SELECT 1; SELECT 2").unwrap_err();
        assert!(matches!(err, SqlError::NotSingleStatement(2)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_statements("SELEKT 1"),
            Err(SqlError::Parse(_))
        ));
    }

    #[test]
    fn parse_query_rejects_dml() {
        let err = parse_query("INSERT INTO t0 VALUES (1)").unwrap_err();
        assert!(matches!(err, SqlError::Unsupported(_)));
    }

    #[test]
    fn mysql_null_safe_equal_parses() {
        // `<=>` is MySQL-only; the pool must use the MySQL dialect.
        assert!(parse_query("SELECT * FROM t0 JOIN t1 ON t0.a <=> t1.a").is_ok());
    }
}
