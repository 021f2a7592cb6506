// Scripted in-memory sandbox for tests that must not depend on an interpreter

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::error::SandboxError;
use crate::sandbox::{Sandbox, Session, WorkerLimits, RESPONSE_BUFFER};

/// What the fake worker does with one request
pub enum Reply {
    /// Send this exact line back
    Raw(String),
    /// Never answer
    Hang,
    /// Close the response channel, as a crashed worker would
    Exit,
}

impl Reply {
    pub fn line(value: Value) -> Self {
        Reply::Raw(value.to_string())
    }

    pub fn ok(value: Value) -> Self {
        Reply::line(json!({ "ok": true, "value": value, "output": "" }))
    }
}

type Script = dyn Fn(&Value) -> Reply + Send + Sync;

#[derive(Clone)]
pub struct FakeSandbox {
    script: Arc<Script>,
    opened: Arc<AtomicUsize>,
    fail_open: bool,
}

impl FakeSandbox {
    pub fn new(script: impl Fn(&Value) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            opened: Arc::new(AtomicUsize::new(0)),
            fail_open: false,
        }
    }

    /// A backend whose workers never start
    pub fn broken() -> Self {
        Self {
            fail_open: true,
            ..Self::new(|_: &Value| Reply::Exit)
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sandbox for FakeSandbox {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn open(&self, _limits: &WorkerLimits) -> Result<Session, SandboxError> {
        if self.fail_open {
            return Err(SandboxError::Spawn("fake backend refuses to start".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);

        let (engine_end, worker_end) = tokio::io::duplex(64 * 1024);
        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
        let script = Arc::clone(&self.script);

        tokio::spawn(async move {
            let ready = json!({ "ok": true, "value": "ready", "output": "" }).to_string();
            if tx.send(ready).await.is_err() {
                return;
            }
            let mut lines = BufReader::new(worker_end).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap_or(Value::Null);
                match script(&request) {
                    Reply::Raw(reply) => {
                        if tx.send(reply).await.is_err() {
                            return;
                        }
                    }
                    Reply::Hang => std::future::pending::<()>().await,
                    Reply::Exit => return,
                }
            }
        });

        let mut session = Session::new(Box::new(engine_end), rx, Box::new(()));
        session.handshake(std::time::Duration::from_secs(1)).await?;
        Ok(session)
    }
}
