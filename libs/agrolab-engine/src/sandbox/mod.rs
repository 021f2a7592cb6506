//! Sandbox Backends - Where Submissions Actually Run
//!
//! **Core Responsibility:**
//! Start one fresh, isolated worker per grading request and hand back a
//! duplex line channel to it.
//!
//! **Critical Architectural Boundary:**
//! - A backend knows HOW to isolate (child process, Docker container)
//! - A backend does NOT know the worker protocol beyond the ready handshake
//! - A backend does NOT know exercises, test cases or scoring
//!
//! Every worker runs the same harness (`harness.py`); teardown happens when
//! the returned `Session` is dropped, whatever state the worker is in.

mod docker;
mod lines;
mod process;

pub use docker::DockerSandbox;
pub use lines::LineBuffer;
pub use process::ProcessSandbox;

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

use crate::error::SandboxError;

/// Worker harness executed by every backend
pub const HARNESS: &str = include_str!("harness.py");

/// Responses buffered between the reader task and the bound context
pub(crate) const RESPONSE_BUFFER: usize = 16;

/// Per-worker resource limits applied by the backend and the harness
#[derive(Debug, Clone)]
pub struct WorkerLimits {
    pub cpu_seconds: u64,
    pub memory_bytes: u64,
    pub max_output_bytes: usize,
}

impl WorkerLimits {
    pub fn new(time_budget: Duration, memory_limit_mb: u32, max_output_bytes: usize) -> Self {
        Self {
            // CPU rlimit is a backstop behind the wall-clock deadline
            cpu_seconds: time_budget.as_secs() + 2,
            memory_bytes: u64::from(memory_limit_mb) * 1024 * 1024,
            max_output_bytes,
        }
    }

    pub(crate) fn harness_env(&self) -> Vec<(String, String)> {
        vec![
            ("AGROLAB_CPU_SECONDS".to_string(), self.cpu_seconds.to_string()),
            ("AGROLAB_MEMORY_BYTES".to_string(), self.memory_bytes.to_string()),
            ("AGROLAB_MAX_OUTPUT".to_string(), self.max_output_bytes.to_string()),
        ]
    }
}

/// A live worker. Dropping it tears the worker down.
pub struct Session {
    pub(crate) requests: Box<dyn AsyncWrite + Send + Unpin>,
    pub(crate) responses: mpsc::Receiver<String>,
    _teardown: Box<dyn Send>,
}

impl Session {
    pub fn new(
        requests: Box<dyn AsyncWrite + Send + Unpin>,
        responses: mpsc::Receiver<String>,
        teardown: Box<dyn Send>,
    ) -> Self {
        Self {
            requests,
            responses,
            _teardown: teardown,
        }
    }

    /// Wait for the harness's ready line
    pub(crate) async fn handshake(&mut self, timeout: Duration) -> Result<(), SandboxError> {
        match tokio::time::timeout(timeout, self.responses.recv()).await {
            Ok(Some(line)) if line.contains("\"ready\"") => Ok(()),
            Ok(Some(line)) => Err(SandboxError::Spawn(format!(
                "unexpected handshake from worker: {}",
                line.chars().take(200).collect::<String>()
            ))),
            Ok(None) => Err(SandboxError::Spawn(
                "worker exited before becoming ready".to_string(),
            )),
            Err(_) => Err(SandboxError::StartupTimeout(timeout.as_millis() as u64)),
        }
    }
}

/// Execution backend: produces one isolated worker per call
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Backend name for logs and metrics
    fn name(&self) -> &'static str;

    async fn open(&self, limits: &WorkerLimits) -> Result<Session, SandboxError>;
}
