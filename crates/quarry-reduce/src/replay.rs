//! Replay execution and the per-kind reproduction predicates.

use tracing::debug;

use quarry_oracle::{ReplayKind, ReplaySpec, row_signature};
use quarry_sql::{plan_rows, validate};
use quarry_types::{DbError, DbExecutor, Deadline};

/// The reducible reproducer: schema DDL, insert log, case statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReproCase {
    pub schema_sql: Vec<String>,
    pub inserts: Vec<String>,
    /// The failing statement sequence; empty for comparison-kind replays
    /// whose SQL lives in the replay spec.
    pub statements: Vec<String>,
}

impl ReproCase {
    /// Total statement count, the quantity minimization drives down.
    pub fn len(&self) -> usize {
        self.schema_sql.len() + self.inserts.len() + self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Replays candidate reductions against a scratch database.
///
/// The scratch database is dropped and re-created for every attempt; the
/// drop is `IF EXISTS`, so a cancelled previous attempt cannot poison the
/// next one. A replay that errors in any unforeseen way reports "not
/// reproduced" rather than failing the reduction.
pub struct Replayer<'a> {
    db: &'a mut dyn DbExecutor,
    scratch: String,
    deadline: Deadline,
}

impl<'a> Replayer<'a> {
    pub fn new(db: &'a mut dyn DbExecutor, scratch: impl Into<String>, deadline: Deadline) -> Self {
        Self {
            db,
            scratch: scratch.into(),
            deadline,
        }
    }

    /// Whether the case still fails the way the spec records.
    pub fn reproduces(&mut self, case: &ReproCase, spec: &ReplaySpec) -> bool {
        if self.deadline.expired() {
            return false;
        }

        // Everything replayed must pass the validator first.
        for sql in case
            .schema_sql
            .iter()
            .chain(&case.inserts)
            .chain(&case.statements)
        {
            if validate(sql).is_err() {
                return false;
            }
        }

        match self.run(case, spec) {
            Ok(reproduced) => reproduced,
            Err(e) => {
                debug!(error = %e, "replay attempt errored; treated as not reproduced");
                false
            }
        }
    }

    fn run(&mut self, case: &ReproCase, spec: &ReplaySpec) -> Result<bool, DbError> {
        self.reset_database()?;
        for sql in case.schema_sql.iter().chain(&case.inserts) {
            self.db.exec(sql, self.deadline)?;
        }

        match spec.kind {
            ReplayKind::CaseError => self.replay_case_error(case, spec),
            ReplayKind::Signature => self.replay_signature(spec),
            ReplayKind::Count => {
                let expected = self.db.query_count(&spec.expected_sql, self.deadline)?;
                let actual = self.db.query_count(&spec.actual_sql, self.deadline)?;
                Ok(expected != actual)
            }
            ReplayKind::PlanRows => self.replay_plan_rows(spec),
            ReplayKind::RowsAffected => {
                let expected: u64 = spec
                    .expected_sql
                    .trim()
                    .parse()
                    .map_err(|_| DbError::Execution("malformed expected count".to_string()))?;
                let result = self.db.exec(&spec.actual_sql, self.deadline)?;
                Ok(result.rows_affected != expected)
            }
        }
    }

    fn reset_database(&mut self) -> Result<(), DbError> {
        let scratch = self.scratch.clone();
        self.db
            .exec(&format!("DROP DATABASE IF EXISTS {scratch}"), self.deadline)?;
        self.db
            .exec(&format!("CREATE DATABASE {scratch}"), self.deadline)?;
        self.db.exec(&format!("USE {scratch}"), self.deadline)?;
        Ok(())
    }

    /// Signature replay: (count, checksum) pairs of expected vs actual,
    /// with the optional session variable around the actual side.
    fn replay_signature(&mut self, spec: &ReplaySpec) -> Result<bool, DbError> {
        let expected = row_signature(&self.db.query(&spec.expected_sql, self.deadline)?);

        if let Some(var) = &spec.session_var {
            self.db.exec(
                &format!("SET SESSION {} = {}", var.name, var.value),
                self.deadline,
            )?;
        }
        let actual_rows = self.db.query(&spec.actual_sql, self.deadline);
        if let Some(var) = &spec.session_var {
            // Reset before judging so no path leaks the variable.
            self.db.exec(
                &format!("SET SESSION {} = DEFAULT", var.name),
                self.deadline,
            )?;
        }
        let actual = row_signature(&actual_rows?);

        Ok(expected != actual)
    }

    fn replay_plan_rows(&mut self, spec: &ReplaySpec) -> Result<bool, DbError> {
        let expected_rows = self.db.query(&spec.expected_sql, self.deadline)?;

        if let Some(var) = &spec.session_var {
            self.db.exec(
                &format!("SET SESSION {} = {}", var.name, var.value),
                self.deadline,
            )?;
        }
        let actual_rows = self.db.query(&spec.actual_sql, self.deadline);
        if let Some(var) = &spec.session_var {
            self.db.exec(
                &format!("SET SESSION {} = DEFAULT", var.name),
                self.deadline,
            )?;
        }
        let actual_rows = actual_rows?;

        let (Some(expected), Some(actual)) = (plan_rows(&expected_rows), plan_rows(&actual_rows))
        else {
            return Ok(false);
        };
        Ok(actual > expected * (1.0 + spec.tolerance))
    }

    /// Error replay: the sequence must emit an error matching the
    /// original (case-insensitive substring either way), or both the
    /// original and the replay must be panic-class.
    fn replay_case_error(&mut self, case: &ReproCase, spec: &ReplaySpec) -> Result<bool, DbError> {
        let original_was_panic = spec.error.to_lowercase().contains("panic");
        for sql in &case.statements {
            match self.db.exec(sql, self.deadline) {
                Ok(_) => {}
                Err(DbError::Panic(_)) => return Ok(original_was_panic),
                Err(DbError::Cancelled) => return Ok(false),
                Err(e) => {
                    return Ok(errors_match(&spec.error, &e.to_string()));
                }
            }
        }
        Ok(false)
    }
}

/// Case-insensitive substring match, either way around.
fn errors_match(original: &str, replayed: &str) -> bool {
    let original = original.to_lowercase();
    let replayed = replayed.to_lowercase();
    !original.is_empty() && (original.contains(&replayed) || replayed.contains(&original))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_oracle::testing::ScriptedDb;

    fn case() -> ReproCase {
        ReproCase {
            schema_sql: vec!["CREATE TABLE t0 (a INT)".to_string()],
            inserts: vec!["INSERT INTO t0 VALUES (1)".to_string()],
            statements: vec![],
        }
    }

    #[test]
    fn count_replay_reproduces_on_difference() {
        let mut db = ScriptedDb::new()
            .with_count("SELECT 6", 6)
            .with_count("SELECT COUNT(*) FROM (SELECT * FROM t0) AS q", 5);
        let spec = ReplaySpec::count("SELECT 6", "SELECT COUNT(*) FROM (SELECT * FROM t0) AS q");
        let mut replayer = Replayer::new(&mut db, "quarry_replay", Deadline::none());
        assert!(replayer.reproduces(&case(), &spec));
    }

    #[test]
    fn count_replay_fails_on_agreement() {
        let mut db = ScriptedDb::new()
            .with_count("SELECT 6", 6)
            .with_count("SELECT COUNT(*) FROM (SELECT * FROM t0) AS q", 6);
        let spec = ReplaySpec::count("SELECT 6", "SELECT COUNT(*) FROM (SELECT * FROM t0) AS q");
        let mut replayer = Replayer::new(&mut db, "quarry_replay", Deadline::none());
        assert!(!replayer.reproduces(&case(), &spec));
    }

    #[test]
    fn database_is_reset_before_each_attempt() {
        let mut db = ScriptedDb::new().with_count("SELECT 1", 1).with_count("SELECT 2", 2);
        let spec = ReplaySpec::count("SELECT 1", "SELECT 2");
        let mut replayer = Replayer::new(&mut db, "quarry_replay", Deadline::none());
        assert!(replayer.reproduces(&case(), &spec));
        drop(replayer);
        assert_eq!(db.executed[0], "DROP DATABASE IF EXISTS quarry_replay");
        assert_eq!(db.executed[1], "CREATE DATABASE quarry_replay");
        assert_eq!(db.executed[2], "USE quarry_replay");
    }

    #[test]
    fn invalid_statement_never_reaches_the_database() {
        let mut db = ScriptedDb::new();
        let mut broken = case();
        broken.inserts.push("INSERT INTO VALUES oops".to_string());
        let spec = ReplaySpec::count("SELECT 1", "SELECT 2");
        let mut replayer = Replayer::new(&mut db, "quarry_replay", Deadline::none());
        assert!(!replayer.reproduces(&broken, &spec));
        drop(replayer);
        assert!(db.executed.is_empty());
    }

    #[test]
    fn expired_deadline_short_circuits() {
        let mut db = ScriptedDb::new();
        let spec = ReplaySpec::count("SELECT 1", "SELECT 2");
        let deadline = Deadline::after(std::time::Duration::ZERO);
        let mut replayer = Replayer::new(&mut db, "quarry_replay", deadline);
        assert!(!replayer.reproduces(&case(), &spec));
        drop(replayer);
        assert!(db.executed.is_empty());
    }

    #[test]
    fn case_error_matches_substring_both_ways() {
        let failing = "SELECT * FROM t0 WHERE a = 1";
        let mut db = ScriptedDb::new().with_error(
            failing,
            DbError::Execution("Unknown column 'a' in 'where clause'".to_string()),
        );
        let mut repro = case();
        repro.statements.push(failing.to_string());
        let spec = ReplaySpec::case_error(failing, "unknown column 'a'");
        let mut replayer = Replayer::new(&mut db, "quarry_replay", Deadline::none());
        assert!(replayer.reproduces(&repro, &spec));
    }

    #[test]
    fn case_error_requires_an_error() {
        let failing = "SELECT 1";
        let mut repro = case();
        repro.statements.push(failing.to_string());
        let mut db = ScriptedDb::new();
        let spec = ReplaySpec::case_error(failing, "some error");
        let mut replayer = Replayer::new(&mut db, "quarry_replay", Deadline::none());
        assert!(!replayer.reproduces(&repro, &spec));
    }

    #[test]
    fn panic_matches_panic_class_only() {
        let failing = "SELECT * FROM t0";
        let mut repro = case();
        repro.statements.push(failing.to_string());

        let mut db = ScriptedDb::new()
            .with_error(failing, DbError::Panic("runtime error: index out of range".to_string()));
        let spec = ReplaySpec::case_error(failing, "panic: invalid memory address");
        let mut replayer = Replayer::new(&mut db, "quarry_replay", Deadline::none());
        assert!(replayer.reproduces(&repro, &spec));

        let mut db = ScriptedDb::new()
            .with_error(failing, DbError::Panic("runtime error".to_string()));
        let spec = ReplaySpec::case_error(failing, "ordinary error text");
        let mut replayer = Replayer::new(&mut db, "quarry_replay", Deadline::none());
        assert!(!replayer.reproduces(&repro, &spec));
    }
}
