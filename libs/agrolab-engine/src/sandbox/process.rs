use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{LineBuffer, Sandbox, Session, WorkerLimits, HARNESS, RESPONSE_BUFFER};
use crate::error::SandboxError;

/// Runs each worker as a local interpreter child process
///
/// The child gets an empty environment and a scratch working directory. The
/// harness caps CPU, memory, file size, descriptors and child processes with
/// rlimits, hands out module views instead of real modules, and installs an
/// audit hook that denies file, process, socket and import events once the
/// allowlisted modules are loaded. Use the Docker backend where untrusted code
/// needs a kernel-level boundary.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    python: String,
    startup_timeout: Duration,
}

impl ProcessSandbox {
    pub fn new(python: impl Into<String>, startup_timeout: Duration) -> Self {
        Self {
            python: python.into(),
            startup_timeout,
        }
    }
}

/// Owns the child and its scratch directory for the lifetime of a session
struct ProcessTeardown {
    _child: Child,
    workdir: PathBuf,
}

impl Drop for ProcessTeardown {
    fn drop(&mut self) {
        // Child is killed by kill_on_drop once this struct goes away
        if let Err(e) = std::fs::remove_dir_all(&self.workdir) {
            debug!(workdir = %self.workdir.display(), error = %e, "scratch dir cleanup failed");
        }
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    fn name(&self) -> &'static str {
        "process"
    }

    #[instrument(skip(self, limits), fields(python = %self.python))]
    async fn open(&self, limits: &WorkerLimits) -> Result<Session, SandboxError> {
        let workdir = std::env::temp_dir().join(format!("agrolab-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&workdir).await?;

        let mut command = Command::new(&self.python);
        command
            .args(["-I", "-S", "-B", "-c", HARNESS])
            .env_clear()
            .envs(limits.harness_env())
            .env("PYTHONIOENCODING", "utf-8")
            .current_dir(&workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = std::fs::remove_dir_all(&workdir);
                return Err(SandboxError::Spawn(format!("{}: {}", self.python, e)));
            }
        };

        let (stdin, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                let _ = std::fs::remove_dir_all(&workdir);
                return Err(SandboxError::Spawn("worker stdio was not captured".to_string()));
            }
        };
        debug!(pid = ?child.id(), "worker process spawned");

        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
        tokio::spawn(forward_lines(stdout, tx));
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "agrolab::worker", "{}", line);
            }
        });

        let teardown = ProcessTeardown {
            _child: child,
            workdir,
        };
        let mut session = Session::new(Box::new(stdin), rx, Box::new(teardown));
        session.handshake(self.startup_timeout).await?;
        Ok(session)
    }
}

/// Split worker stdout into response lines. Returns, dropping the sender, on
/// EOF, a read error or a line over `MAX_LINE_BYTES`.
async fn forward_lines<R>(mut stdout: R, tx: mpsc::Sender<String>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buffer = LineBuffer::new();
    let mut chunk = vec![0u8; 8192];
    loop {
        let read = match stdout.read(&mut chunk).await {
            Ok(0) => return,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "worker stdout read failed");
                return;
            }
        };
        match buffer.push(&chunk[..read]) {
            Ok(lines) => {
                for line in lines {
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "dropping worker stream");
                return;
            }
        }
    }
}
