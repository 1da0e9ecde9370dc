//! The minimizer: pass orchestration.

use std::mem;
use std::time::Duration;

use tracing::{debug, info};

use quarry_oracle::{ReplayKind, ReplaySpec};
use quarry_types::{DbExecutor, Deadline};

use crate::ddmin::ddmin;
use crate::passes::{dedup_statements, explode_inserts, filter_inserts, merge_inserts};
use crate::replay::{Replayer, ReproCase};
use crate::shrink::shrink_candidates;

/// Minimizer configuration.
#[derive(Debug, Clone)]
pub struct MinimizeConfig {
    pub enabled: bool,
    /// Wall-clock budget for the whole reduction.
    pub timeout: Duration,
    /// Replay budget per ddmin run and shrink-iteration bound.
    pub max_rounds: usize,
    /// Merge single-row INSERT runs back together at the end.
    pub merge_back: bool,
    /// Name of the scratch database replays run in.
    pub scratch_db: String,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(30),
            max_rounds: 64,
            merge_back: true,
            scratch_db: "quarry_replay".to_string(),
        }
    }
}

/// How a reduction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimizeStatus {
    Disabled,
    Reduced,
    Timeout,
    /// The original case never reproduced; it is returned untouched.
    NotReproduced,
}

impl MinimizeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MinimizeStatus::Disabled => "disabled",
            MinimizeStatus::Reduced => "reduced",
            MinimizeStatus::Timeout => "timeout",
            MinimizeStatus::NotReproduced => "not_reproduced",
        }
    }
}

/// The committed reduction.
#[derive(Debug, Clone)]
pub struct MinimizeOutcome {
    pub case: ReproCase,
    pub spec: ReplaySpec,
    pub status: MinimizeStatus,
}

/// Replay-driven reducer.
#[derive(Debug, Default)]
pub struct Minimizer {
    config: MinimizeConfig,
}

impl Minimizer {
    pub fn new(config: MinimizeConfig) -> Self {
        Self { config }
    }

    /// Reduces `case` while preserving the failure recorded in `spec`.
    ///
    /// Every pass is validated by replay; a pass that loses the failure
    /// is reverted, so the returned case always still reproduces (unless
    /// the original never did).
    pub fn minimize(
        &self,
        case: ReproCase,
        spec: &ReplaySpec,
        db: &mut dyn DbExecutor,
    ) -> MinimizeOutcome {
        let mut spec = spec.clone();
        if !self.config.enabled {
            return MinimizeOutcome {
                case,
                spec,
                status: MinimizeStatus::Disabled,
            };
        }

        let original_len = case.len();
        let deadline = Deadline::after(self.config.timeout);
        let mut replayer = Replayer::new(db, self.config.scratch_db.clone(), deadline);
        let mut current = case;

        if !replayer.reproduces(&current, &spec) {
            let status = if deadline.expired() {
                MinimizeStatus::Timeout
            } else {
                MinimizeStatus::NotReproduced
            };
            return MinimizeOutcome {
                case: current,
                spec,
                status,
            };
        }

        // Pass 1: drop inserts into tables the failing SQL never touches.
        let mut failing = current.statements.clone();
        failing.push(spec.expected_sql.clone());
        failing.push(spec.actual_sql.clone());
        self.adopt_if_reproduces(&mut replayer, &mut current, &spec, |case| {
            case.inserts = filter_inserts(&case.inserts, &failing);
        });

        // Pass 2: explode multi-row inserts so ddmin sees single rows.
        self.adopt_if_reproduces(&mut replayer, &mut current, &spec, |case| {
            case.inserts = explode_inserts(&case.inserts);
        });

        // Pass 3: dedup inserts and case statements.
        self.adopt_if_reproduces(&mut replayer, &mut current, &spec, |case| {
            case.inserts = dedup_statements(&case.inserts);
            case.statements = dedup_statements(&case.statements);
        });

        // Pass 4: ddmin over the insert log.
        {
            let schema_sql = current.schema_sql.clone();
            let statements = current.statements.clone();
            let inserts = mem::take(&mut current.inserts);
            current.inserts = ddmin(inserts, self.config.max_rounds, |subset| {
                let candidate = ReproCase {
                    schema_sql: schema_sql.clone(),
                    inserts: subset.to_vec(),
                    statements: statements.clone(),
                };
                replayer.reproduces(&candidate, &spec)
            });
        }

        // Pass 5: ddmin over case statements, error-class cases only.
        if spec.kind == ReplayKind::CaseError && current.statements.len() > 1 {
            let schema_sql = current.schema_sql.clone();
            let inserts = current.inserts.clone();
            let statements = mem::take(&mut current.statements);
            current.statements = ddmin(statements, self.config.max_rounds, |subset| {
                let candidate = ReproCase {
                    schema_sql: schema_sql.clone(),
                    inserts: inserts.clone(),
                    statements: subset.to_vec(),
                };
                replayer.reproduces(&candidate, &spec)
            });
        }

        // Pass 6: AST shrinking to a fixed point.
        self.shrink_statements(&mut replayer, &mut current, &mut spec, deadline);

        // Pass 7: merge exploded inserts back together.
        if self.config.merge_back {
            self.adopt_if_reproduces(&mut replayer, &mut current, &spec, |case| {
                case.inserts = merge_inserts(&case.inserts);
            });
        }

        let status = if deadline.expired() {
            MinimizeStatus::Timeout
        } else {
            MinimizeStatus::Reduced
        };
        info!(
            from = original_len,
            to = current.len(),
            status = status.as_str(),
            "minimization finished"
        );
        MinimizeOutcome {
            case: current,
            spec,
            status,
        }
    }

    /// Applies `transform` to a copy; commits it only when the failure
    /// survives.
    fn adopt_if_reproduces(
        &self,
        replayer: &mut Replayer<'_>,
        current: &mut ReproCase,
        spec: &ReplaySpec,
        transform: impl FnOnce(&mut ReproCase),
    ) {
        let mut candidate = current.clone();
        transform(&mut candidate);
        if candidate == *current {
            return;
        }
        if replayer.reproduces(&candidate, spec) {
            debug!(from = current.len(), to = candidate.len(), "pass adopted");
            *current = candidate;
        }
    }

    /// Shrinks each case statement, and the comparison SQL itself for
    /// count/signature replays, until nothing improves.
    fn shrink_statements(
        &self,
        replayer: &mut Replayer<'_>,
        current: &mut ReproCase,
        spec: &mut ReplaySpec,
        deadline: Deadline,
    ) {
        for _ in 0..self.config.max_rounds {
            if deadline.expired() {
                return;
            }
            let mut changed = false;

            for idx in 0..current.statements.len() {
                for candidate_sql in shrink_candidates(&current.statements[idx]) {
                    let mut candidate = current.clone();
                    candidate.statements[idx] = candidate_sql;
                    if replayer.reproduces(&candidate, spec) {
                        *current = candidate;
                        changed = true;
                        break;
                    }
                }
            }

            if matches!(spec.kind, ReplayKind::Count | ReplayKind::Signature) {
                for candidate_sql in shrink_candidates(&spec.actual_sql) {
                    let mut candidate_spec = spec.clone();
                    candidate_spec.actual_sql = candidate_sql;
                    if replayer.reproduces(current, &candidate_spec) {
                        *spec = candidate_spec;
                        changed = true;
                        break;
                    }
                }
            }

            if !changed {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_types::{DbError, ExecResult, Rows};

    /// A database whose failure depends on one poisoned insert: the
    /// count replay differs exactly when a row with value 42 is present.
    #[derive(Default)]
    struct PoisonDb {
        poisoned: bool,
        statements: Vec<String>,
    }

    impl DbExecutor for PoisonDb {
        fn exec(&mut self, sql: &str, _deadline: Deadline) -> Result<ExecResult, DbError> {
            self.statements.push(sql.to_string());
            if sql.starts_with("DROP DATABASE") {
                self.poisoned = false;
            }
            if sql.starts_with("INSERT") && sql.contains("42") {
                self.poisoned = true;
            }
            Ok(ExecResult::default())
        }

        fn query(&mut self, _sql: &str, _deadline: Deadline) -> Result<Rows, DbError> {
            Ok(Rows::default())
        }

        fn query_row(
            &mut self,
            _sql: &str,
            _deadline: Deadline,
        ) -> Result<Option<Vec<Option<String>>>, DbError> {
            Ok(None)
        }

        fn query_count(&mut self, sql: &str, _deadline: Deadline) -> Result<u64, DbError> {
            if sql == "SELECT 0" {
                Ok(0)
            } else {
                Ok(u64::from(self.poisoned))
            }
        }

        fn server_version(&mut self) -> Result<String, DbError> {
            Ok("test".to_string())
        }
    }

    fn spec() -> ReplaySpec {
        ReplaySpec::count("SELECT 0", "SELECT COUNT(*) FROM (SELECT * FROM t0) AS q")
    }

    fn big_case() -> ReproCase {
        ReproCase {
            schema_sql: vec!["CREATE TABLE t0 (a INT)".to_string()],
            inserts: vec![
                "INSERT INTO t0 (a) VALUES (1), (2)".to_string(),
                "INSERT INTO t0 (a) VALUES (3)".to_string(),
                "INSERT INTO t0 (a) VALUES (3)".to_string(),
                "INSERT INTO t0 (a) VALUES (42)".to_string(),
                "INSERT INTO t1 (a) VALUES (9)".to_string(),
            ],
            statements: vec![],
        }
    }

    #[test]
    fn reduces_to_the_poisoned_insert() {
        let mut db = PoisonDb::default();
        let minimizer = Minimizer::default();
        let outcome = minimizer.minimize(big_case(), &spec(), &mut db);

        assert_eq!(outcome.status, MinimizeStatus::Reduced);
        assert_eq!(
            outcome.case.inserts,
            vec!["INSERT INTO t0 (a) VALUES (42)".to_string()]
        );
        // Schema and the replay spec survive.
        assert_eq!(outcome.case.schema_sql.len(), 1);
    }

    #[test]
    fn disabled_minimizer_returns_unchanged() {
        let mut db = PoisonDb::default();
        let minimizer = Minimizer::new(MinimizeConfig {
            enabled: false,
            ..MinimizeConfig::default()
        });
        let case = big_case();
        let outcome = minimizer.minimize(case.clone(), &spec(), &mut db);
        assert_eq!(outcome.status, MinimizeStatus::Disabled);
        assert_eq!(outcome.case, case);
    }

    #[test]
    fn unreproducible_case_is_kept() {
        let mut db = PoisonDb::default();
        let minimizer = Minimizer::default();
        let mut case = big_case();
        // Remove the poison: the failure cannot reproduce.
        case.inserts.retain(|i| !i.contains("42"));
        let expected = case.clone();
        let outcome = minimizer.minimize(case, &spec(), &mut db);
        assert_eq!(outcome.status, MinimizeStatus::NotReproduced);
        assert_eq!(outcome.case, expected);
    }

    #[test]
    fn zero_budget_times_out_and_commits_best() {
        let mut db = PoisonDb::default();
        let minimizer = Minimizer::new(MinimizeConfig {
            timeout: Duration::ZERO,
            ..MinimizeConfig::default()
        });
        let case = big_case();
        let outcome = minimizer.minimize(case.clone(), &spec(), &mut db);
        assert_eq!(outcome.status, MinimizeStatus::Timeout);
        assert_eq!(outcome.case, case);
    }

    #[test]
    fn case_error_statements_are_delta_debugged() {
        /// Errors only on the poisoned statement.
        #[derive(Default)]
        struct ErrDb;
        impl DbExecutor for ErrDb {
            fn exec(&mut self, sql: &str, _d: Deadline) -> Result<ExecResult, DbError> {
                if sql.contains("poison") {
                    Err(DbError::Execution("Unknown column 'poison'".to_string()))
                } else {
                    Ok(ExecResult::default())
                }
            }
            fn query(&mut self, _s: &str, _d: Deadline) -> Result<Rows, DbError> {
                Ok(Rows::default())
            }
            fn query_row(
                &mut self,
                _s: &str,
                _d: Deadline,
            ) -> Result<Option<Vec<Option<String>>>, DbError> {
                Ok(None)
            }
            fn query_count(&mut self, _s: &str, _d: Deadline) -> Result<u64, DbError> {
                Ok(0)
            }
            fn server_version(&mut self) -> Result<String, DbError> {
                Ok("test".to_string())
            }
        }

        let case = ReproCase {
            schema_sql: vec!["CREATE TABLE t0 (a INT)".to_string()],
            inserts: vec![],
            statements: vec![
                "SELECT a FROM t0".to_string(),
                "SELECT poison FROM t0".to_string(),
                "SELECT a + 1 FROM t0".to_string(),
            ],
        };
        let spec = ReplaySpec::case_error("SELECT poison FROM t0", "unknown column 'poison'");

        let mut db = ErrDb;
        let outcome = Minimizer::default().minimize(case, &spec, &mut db);
        assert_eq!(outcome.status, MinimizeStatus::Reduced);
        assert_eq!(outcome.case.statements, vec!["SELECT poison FROM t0".to_string()]);
    }
}
