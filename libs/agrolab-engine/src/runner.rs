//! Assertion Runner
//!
//! Runs an exercise's checks in catalog order against one bound context.
//! A failing, erroring or panicking case never stops the cases after it;
//! only the request deadline aborts the run.

use agrolab_common::types::{ErrorKind, Outcome};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

use crate::catalog::TestCase;
use crate::context::BoundContext;
use crate::error::{CaseError, DeadlineExceeded};

/// Named outcome of every case, in the order given
pub async fn run_cases(
    ctx: &mut BoundContext,
    cases: &[TestCase],
) -> Result<Vec<(String, Outcome)>, DeadlineExceeded> {
    let mut outcomes = Vec::with_capacity(cases.len());

    for case in cases {
        let deadline = ctx.deadline();
        let run = AssertUnwindSafe((case.run)(ctx)).catch_unwind();

        let outcome = match tokio::time::timeout_at(deadline, run).await {
            Err(_) => return Err(DeadlineExceeded),
            Ok(Err(panic)) => {
                warn!(case = case.name, "check panicked");
                Outcome::errored(
                    ErrorKind::RuntimeError,
                    format!("internal check error: {}", panic_message(&*panic)),
                )
            }
            Ok(Ok(Ok(()))) => Outcome::Pass,
            Ok(Ok(Err(err))) => match err {
                CaseError::Assertion(message) => Outcome::failed(message),
                CaseError::Raised(raised) => {
                    Outcome::errored(ErrorKind::RuntimeError, raised.to_string())
                }
                CaseError::Sandbox(message) => Outcome::errored(ErrorKind::SandboxFailure, message),
                CaseError::Deadline => return Err(DeadlineExceeded),
            },
        };

        debug!(case = case.name, pass = outcome.is_pass(), "case finished");
        outcomes.push((case.name.to_string(), outcome));
    }

    Ok(outcomes)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaseResult;
    use crate::expect::expect_close;
    use crate::sandbox::{Sandbox, WorkerLimits};
    use crate::testing::{FakeSandbox, Reply};
    use crate::value::PyValue;
    use futures_util::future::BoxFuture;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::time::Instant;

    fn plon(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
        Box::pin(async move {
            let value = ctx.call("szacowany_plon", crate::args![5.0, 8.5]).await?;
            expect_close(&value, 42.5, 1e-6)
        })
    }

    fn raises(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
        Box::pin(async move {
            ctx.call("dzielenie", vec![]).await?;
            Ok(())
        })
    }

    fn panics(_ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
        Box::pin(async move {
            let plony: Vec<f64> = Vec::new();
            expect_close(&PyValue::Float(plony[3]), 1.0, 0.1)
        })
    }

    fn hangs(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
        Box::pin(async move {
            ctx.call("petla", vec![]).await?;
            Ok(())
        })
    }

    fn crashes(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
        Box::pin(async move {
            ctx.call("crash", vec![]).await?;
            Ok(())
        })
    }

    fn worker(request: &Value) -> Reply {
        match request["target"].as_str() {
            Some("szacowany_plon") => Reply::ok(json!(42.5)),
            Some("dzielenie") => Reply::line(json!({
                "ok": false,
                "error": {"type": "ZeroDivisionError", "message": "division by zero",
                          "mro": ["ZeroDivisionError"], "phase": "call", "line": 3},
                "output": ""
            })),
            Some("petla") => Reply::Hang,
            _ => Reply::Exit,
        }
    }

    async fn context(budget: Duration) -> BoundContext {
        let sandbox = FakeSandbox::new(worker);
        let session = sandbox
            .open(&WorkerLimits::new(budget, 128, 1024))
            .await
            .unwrap();
        BoundContext::new(session, Instant::now() + budget, 1024)
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_cases() {
        let mut ctx = context(Duration::from_secs(2)).await;
        let cases = [
            TestCase::new("raises", raises),
            TestCase::new("panics", panics),
            TestCase::new("basic", plon),
        ];

        let outcomes = run_cases(&mut ctx, &cases).await.unwrap();
        let names: Vec<&str> = outcomes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["raises", "panics", "basic"]);

        assert_eq!(
            outcomes[0].1,
            Outcome::errored(ErrorKind::RuntimeError, "ZeroDivisionError: division by zero (line 3)")
        );
        match &outcomes[1].1 {
            Outcome::Errored { kind, message } => {
                assert_eq!(*kind, ErrorKind::RuntimeError);
                assert!(message.contains("index out of bounds"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(outcomes[2].1, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_lost_worker_fails_remaining_cases() {
        let mut ctx = context(Duration::from_secs(2)).await;
        let cases = [
            TestCase::new("basic", plon),
            TestCase::new("crashes", crashes),
            TestCase::new("after", plon),
        ];

        let outcomes = run_cases(&mut ctx, &cases).await.unwrap();
        assert_eq!(outcomes[0].1, Outcome::Pass);
        for (_, outcome) in &outcomes[1..] {
            assert!(matches!(
                outcome,
                Outcome::Errored { kind: ErrorKind::SandboxFailure, .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_deadline_aborts_run() {
        let mut ctx = context(Duration::from_millis(150)).await;
        let cases = [TestCase::new("basic", plon), TestCase::new("hangs", hangs)];

        assert_eq!(run_cases(&mut ctx, &cases).await, Err(DeadlineExceeded));
    }
}
