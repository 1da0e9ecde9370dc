//! The per-worker pipeline.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use quarry_config::QuarryConfig;
use quarry_mutate::NormalizeOptions;
use quarry_oracle::{
    CardinalityOracle, MutationOracle, Outcome, PlanOracle, ReplayKind, Summary, TruthRow,
};
use quarry_reduce::{MinimizeConfig, Minimizer, ReproCase};
use quarry_report::{CaseMaterials, CaseRecord, Reporter, SchemaDdl, TableData};
use quarry_sql::plan_signature;
use quarry_truth::EvalCaps;
use quarry_types::{DbExecutor, Deadline, GenQuery, SchemaState};

/// Everything one generator emission hands the worker.
#[derive(Debug, Clone)]
pub struct CaseInput {
    pub schema: SchemaState,
    pub query: GenQuery,
    /// The SQL the generator rendered for `query`.
    pub sql: String,
    pub seed: u64,
    /// Rows as the truth store ingests them.
    pub truth_rows: Vec<TruthRow>,
    /// DDL for the reporter's `schema.sql`.
    pub schema_ddl: Vec<SchemaDdl>,
    /// Database name, stripped from qualifiers in reports.
    pub database: String,
    /// The worker's insert log, for the minimizer and `inserts.sql`.
    pub inserts: Vec<String>,
    /// Current table contents for `data.tsv`.
    pub data: Vec<TableData>,
}

/// Errors the pipeline cannot absorb.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Oracle(#[from] quarry_oracle::OracleError),

    #[error(transparent)]
    Report(#[from] quarry_report::ReportError),
}

/// One worker: its oracles, its minimizer, its reporter.
///
/// Owns no connection; the harness passes the worker's executor into
/// every call. Never shared across threads.
pub struct Worker {
    mutation: Option<MutationOracle>,
    cardinality: Option<CardinalityOracle>,
    plan: Option<PlanOracle>,
    minimizer: Minimizer,
    reporter: Reporter,
}

impl Worker {
    pub fn from_config(config: &QuarryConfig) -> Self {
        let options = NormalizeOptions {
            rewrite_outer_joins: config.oracle.rewrite_outer_joins,
        };
        let caps = EvalCaps {
            table_cap: config.truth.table_cap,
            join_cap: config.truth.join_cap,
        };
        Self {
            mutation: config.oracle.mutation.then(|| MutationOracle::new(options)),
            cardinality: config.oracle.cardinality.then(|| CardinalityOracle::new(caps)),
            plan: config.oracle.plan.then(|| {
                PlanOracle::new(
                    config.oracle.plan_session_var.clone(),
                    config.oracle.plan_session_value.clone(),
                    config.oracle.plan_tolerance,
                )
            }),
            minimizer: Minimizer::new(MinimizeConfig {
                enabled: config.minimize.enabled,
                timeout: Duration::from_secs(config.minimize.timeout_secs),
                max_rounds: config.minimize.max_rounds,
                merge_back: config.minimize.merge_back,
                scratch_db: config.minimize.scratch_db.clone(),
            }),
            reporter: Reporter::new(
                config.report.dir.clone(),
                config.report.sequence_names,
                config.report.data_row_cap,
            ),
        }
    }

    /// Runs the enabled oracles over one generated query; on the first
    /// mismatch, minimizes and persists the case.
    ///
    /// The sequence oracle-eval → minimize → report is strictly ordered;
    /// a mismatch short-circuits the remaining oracles.
    pub fn run_case(
        &mut self,
        input: &CaseInput,
        db: &mut dyn DbExecutor,
    ) -> Result<Option<CaseRecord>, WorkerError> {
        let deadline = Deadline::none();

        if let Some(oracle) = &self.mutation {
            let outcome = oracle.check(&input.sql, db, deadline)?;
            if let Some(record) = self.settle(input, outcome, db)? {
                return Ok(Some(record));
            }
        }

        if let Some(oracle) = &self.cardinality {
            let outcome = oracle.check(
                &input.schema,
                &input.query,
                &input.sql,
                &input.truth_rows,
                db,
                deadline,
            )?;
            if let Some(record) = self.settle(input, outcome, db)? {
                return Ok(Some(record));
            }
        }

        if let Some(oracle) = &self.plan {
            let outcome = oracle.check(&input.sql, db, deadline)?;
            if let Some(record) = self.settle(input, outcome, db)? {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    /// Folds one oracle outcome: mismatches go through minimization and
    /// reporting, skips are logged and dropped.
    fn settle(
        &mut self,
        input: &CaseInput,
        outcome: Outcome,
        db: &mut dyn DbExecutor,
    ) -> Result<Option<CaseRecord>, WorkerError> {
        let mismatch = match outcome {
            Outcome::Ok => return Ok(None),
            Outcome::Skipped { reason } => {
                debug!(seed = input.seed, reason, "case skipped");
                return Ok(None);
            }
            Outcome::Mismatch(mismatch) => mismatch,
        };
        info!(
            seed = input.seed,
            oracle = %mismatch.oracle,
            "oracle mismatch; minimizing"
        );

        let case = ReproCase {
            schema_sql: input.schema_ddl.iter().map(|d| d.create_sql.clone()).collect(),
            inserts: input.inserts.clone(),
            statements: if mismatch.replay.kind == ReplayKind::CaseError {
                mismatch.sql.clone()
            } else {
                Vec::new()
            },
        };
        let reduced = self.minimizer.minimize(case, &mismatch.replay, db);

        let mut summary = Summary::from_mismatch(&mismatch, input.seed, Utc::now());
        summary.minimize = reduced.status.as_str().to_string();
        summary.replay_sql = reduced.spec.actual_sql.clone();
        summary.server_version = db.server_version().unwrap_or_else(|e| {
            warn!(error = %e, "server version unavailable");
            String::new()
        });
        summary.plan_signature = db
            .query(&format!("EXPLAIN {}", input.sql), Deadline::none())
            .map(|rows| plan_signature(&rows))
            .unwrap_or_default();

        let case_sql = if reduced.case.statements.is_empty() {
            vec![
                reduced.spec.expected_sql.clone(),
                reduced.spec.actual_sql.clone(),
            ]
        } else {
            reduced.case.statements.clone()
        };

        let record = self.reporter.persist(CaseMaterials {
            summary,
            schema: input.schema_ddl.clone(),
            database: input.database.clone(),
            data: input.data.clone(),
            inserts: reduced.case.inserts,
            case_sql,
        })?;
        Ok(Some(record))
    }
}
