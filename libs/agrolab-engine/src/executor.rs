/// Grading Executor - End-to-End Orchestration
///
/// **Responsibility:**
/// Turn one `Submission` into one `Report`.
///
/// **Flow:**
/// 1. Catalog lookup (unknown exercise is the only lookup error)
/// 2. Admission through the worker pool
/// 3. Sandbox executor binds the submission under the time budget
/// 4. Assertion runner drives the exercise's checks
/// 5. Reporter aggregates, worker is torn down on every path
///
/// Compile errors, timeouts and lost workers are report data, never errors.

use agrolab_common::config::{BackendKind, GraderConfig};
use agrolab_common::types::{ErrorKind, Outcome, RequiredSymbol, Report, Submission};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use crate::catalog::Catalog;
use crate::context::BoundContext;
use crate::error::{DeadlineExceeded, GradeError, LoadError};
use crate::pool::WorkerPool;
use crate::reporter;
use crate::runner;
use crate::sandbox::{DockerSandbox, ProcessSandbox, Sandbox, WorkerLimits};

/// Why `execute` produced no context, plus whatever was printed before that
#[derive(Debug)]
pub struct LoadFailure {
    pub error: LoadError,
    pub captured_output: String,
}

/// Sandbox Executor: start a fresh worker and bind `source_text` in it
///
/// The wall-clock budget starts once the worker is ready, so slow container
/// startup does not eat into the submission's time.
pub async fn execute(
    sandbox: &dyn Sandbox,
    source_text: &str,
    required_symbols: &[RequiredSymbol],
    limits: &WorkerLimits,
    time_budget: Duration,
) -> Result<BoundContext, LoadFailure> {
    let session = sandbox.open(limits).await.map_err(|e| LoadFailure {
        error: LoadError::Sandbox(e.to_string()),
        captured_output: String::new(),
    })?;

    let deadline = tokio::time::Instant::now() + time_budget;
    let mut ctx = BoundContext::new(session, deadline, limits.max_output_bytes);
    match ctx.load(source_text, required_symbols).await {
        Ok(()) => Ok(ctx),
        Err(error) => Err(LoadFailure {
            error,
            captured_output: ctx.take_output(),
        }),
    }
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    time_budget: Duration,
    memory_limit_mb: u32,
    max_source_bytes: usize,
    max_output_bytes: usize,
}

#[derive(Clone)]
pub struct GradingEngine {
    catalog: Arc<Catalog>,
    sandbox: Arc<dyn Sandbox>,
    pool: WorkerPool,
    limits: Limits,
}

impl GradingEngine {
    /// Build the engine with the backend named in the config
    pub fn from_config(config: &GraderConfig) -> Result<Self> {
        let sandbox: Arc<dyn Sandbox> = match config.backend {
            BackendKind::Process => Arc::new(ProcessSandbox::new(
                config.python.clone(),
                config.startup_timeout(),
            )),
            BackendKind::Docker => Arc::new(
                DockerSandbox::new(
                    config.image.clone(),
                    config.memory_limit_mb,
                    f64::from(config.cpu_limit),
                    config.startup_timeout(),
                )
                .context("Failed to connect to Docker daemon")?,
            ),
        };
        Ok(Self::with_sandbox(config, sandbox))
    }

    pub fn with_sandbox(config: &GraderConfig, sandbox: Arc<dyn Sandbox>) -> Self {
        Self {
            catalog: Arc::new(Catalog::builtin()),
            sandbox,
            pool: WorkerPool::new(config.max_concurrent, config.backpressure),
            limits: Limits {
                time_budget: config.time_budget(),
                memory_limit_mb: config.memory_limit_mb,
                max_source_bytes: config.max_source_bytes,
                max_output_bytes: config.max_output_bytes,
            },
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn backend(&self) -> &'static str {
        self.sandbox.name()
    }

    #[instrument(
        skip_all,
        fields(submission_id = %submission.id, exercise_id = %submission.exercise_id)
    )]
    pub async fn grade(&self, submission: &Submission) -> Result<Report, GradeError> {
        let started = Instant::now();
        let spec = self.catalog.get(&submission.exercise_id)?;
        let case_names = spec.case_names();

        let source_len = submission.source_text.len();
        if source_len > self.limits.max_source_bytes {
            warn!(source_len, limit = self.limits.max_source_bytes, "submission too large");
            let outcome = Outcome::errored(
                ErrorKind::CompileError,
                format!(
                    "submission is {} bytes, the limit is {} bytes",
                    source_len, self.limits.max_source_bytes
                ),
            );
            return Ok(reporter::uniform(&spec.exercise_id, &case_names, outcome, String::new()));
        }

        let _permit = self.pool.acquire().await?;

        let budget = spec.time_budget.unwrap_or(self.limits.time_budget);
        let limits = WorkerLimits::new(budget, self.limits.memory_limit_mb, self.limits.max_output_bytes);
        let timeout = || {
            Outcome::errored(
                ErrorKind::Timeout,
                format!("time budget of {} ms exhausted", budget.as_millis()),
            )
        };

        let report = match execute(
            self.sandbox.as_ref(),
            &submission.source_text,
            &spec.required_symbols,
            &limits,
            budget,
        )
        .await
        {
            Err(failure) => {
                let outcome = match failure.error {
                    LoadError::Compile(message) => Outcome::errored(ErrorKind::CompileError, message),
                    LoadError::Deadline => timeout(),
                    LoadError::Sandbox(message) => {
                        warn!(backend = self.sandbox.name(), error = %message, "sandbox failure");
                        Outcome::errored(ErrorKind::SandboxFailure, message)
                    }
                };
                reporter::uniform(&spec.exercise_id, &case_names, outcome, failure.captured_output)
            }
            Ok(mut ctx) => match runner::run_cases(&mut ctx, &spec.test_cases).await {
                Ok(outcomes) => reporter::build(&spec.exercise_id, outcomes, ctx.take_output()),
                Err(DeadlineExceeded) => {
                    reporter::uniform(&spec.exercise_id, &case_names, timeout(), ctx.take_output())
                }
            },
        };

        info!(
            verdict = %report.overall,
            passed = report.passed(),
            total = report.total(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "submission graded"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSandbox, Reply};
    use agrolab_common::config::Backpressure;
    use agrolab_common::types::Verdict;
    use serde_json::{json, Value};

    fn config() -> GraderConfig {
        GraderConfig {
            time_budget_ms: 500,
            ..GraderConfig::default()
        }
    }

    fn engine(sandbox: FakeSandbox) -> GradingEngine {
        GradingEngine::with_sandbox(&config(), Arc::new(sandbox))
    }

    fn correct_worker(request: &Value) -> Reply {
        match request["op"].as_str() {
            Some("load") => Reply::line(json!({ "ok": true, "value": null, "output": "wczytano\n" })),
            _ => Reply::ok(json!(42.5)),
        }
    }

    #[tokio::test]
    async fn test_unknown_exercise_is_hard_error() {
        let sandbox = FakeSandbox::new(correct_worker);
        let engine = engine(sandbox.clone());
        let result = engine.grade(&Submission::new("nie_istnieje", "x = 1")).await;
        assert!(matches!(result, Err(GradeError::NotFound(_))));
        assert_eq!(sandbox.opened(), 0);
    }

    #[tokio::test]
    async fn test_passing_submission() {
        let engine = engine(FakeSandbox::new(correct_worker));
        let report = engine
            .grade(&Submission::new("yield_calc", "def szacowany_plon(a, b): return a * b"))
            .await
            .unwrap();
        assert_eq!(report.overall, Verdict::Pass);
        assert_eq!(report.per_case[0].name, "basic");
        assert_eq!(report.captured_output, "wczytano\n");
    }

    #[tokio::test]
    async fn test_oversized_source_never_starts_a_worker() {
        let sandbox = FakeSandbox::new(correct_worker);
        let engine = GradingEngine::with_sandbox(
            &GraderConfig {
                max_source_bytes: 16,
                ..config()
            },
            Arc::new(sandbox.clone()),
        );
        let report = engine
            .grade(&Submission::new("pole_uprawne", "#".repeat(17)))
            .await
            .unwrap();

        assert_eq!(sandbox.opened(), 0);
        assert_eq!(report.total(), 3);
        assert!(report.per_case.iter().all(|c| matches!(
            c.outcome,
            Outcome::Errored { kind: ErrorKind::CompileError, .. }
        )));
    }

    #[tokio::test]
    async fn test_compile_error_is_uniform() {
        let engine = engine(FakeSandbox::new(|_: &Value| {
            Reply::line(json!({
                "ok": false,
                "error": {"type": "SyntaxError", "message": "invalid syntax", "mro": [],
                          "phase": "compile", "line": 1},
                "output": ""
            }))
        }));
        let report = engine
            .grade(&Submission::new("nawadnianie", "def decyzja_nawadniania(:"))
            .await
            .unwrap();

        assert_eq!(report.overall, Verdict::Fail);
        assert_eq!(report.total(), 4);
        for case in &report.per_case {
            assert_eq!(
                case.outcome,
                Outcome::errored(ErrorKind::CompileError, "SyntaxError: invalid syntax (line 1)")
            );
        }
    }

    #[tokio::test]
    async fn test_hang_becomes_uniform_timeout() {
        let engine = engine(FakeSandbox::new(|request: &Value| match request["op"].as_str() {
            Some("load") => Reply::ok(Value::Null),
            _ => Reply::Hang,
        }));
        let report = engine
            .grade(&Submission::new("pole_uprawne", "class PoleUprawne: ..."))
            .await
            .unwrap();

        assert_eq!(report.total(), 3);
        for case in &report.per_case {
            assert_eq!(
                case.outcome,
                Outcome::errored(ErrorKind::Timeout, "time budget of 500 ms exhausted")
            );
        }
    }

    #[tokio::test]
    async fn test_broken_backend_is_sandbox_failure() {
        let engine = engine(FakeSandbox::broken());
        let report = engine
            .grade(&Submission::new("yield_calc", "def szacowany_plon(a, b): return a * b"))
            .await
            .unwrap();
        assert!(matches!(
            report.per_case[0].outcome,
            Outcome::Errored { kind: ErrorKind::SandboxFailure, .. }
        ));
    }

    #[tokio::test]
    async fn test_each_request_gets_its_own_worker() {
        let sandbox = FakeSandbox::new(correct_worker);
        let engine = engine(sandbox.clone());
        for _ in 0..3 {
            let submission = Submission::new("yield_calc", "def szacowany_plon(a, b): return a * b");
            engine.grade(&submission).await.unwrap();
        }
        assert_eq!(sandbox.opened(), 3);
        assert_eq!(engine.pool().available(), engine.pool().capacity());
    }

    #[tokio::test]
    async fn test_saturated_pool_rejects() {
        let engine = GradingEngine::with_sandbox(
            &GraderConfig {
                max_concurrent: 1,
                backpressure: Backpressure::Reject { max_waiting: 0 },
                ..config()
            },
            Arc::new(FakeSandbox::new(correct_worker)),
        );
        let _held = engine.pool().acquire().await.unwrap();

        let result = engine
            .grade(&Submission::new("yield_calc", "def szacowany_plon(a, b): return a * b"))
            .await;
        assert!(matches!(result, Err(GradeError::Saturated { .. })));
    }
}
