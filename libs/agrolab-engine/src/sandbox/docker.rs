use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, AttachContainerResults, Config, CreateContainerOptions, LogOutput,
    RemoveContainerOptions, StartContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{LineBuffer, Sandbox, Session, WorkerLimits, HARNESS, RESPONSE_BUFFER};
use crate::error::SandboxError;

/// Unprivileged uid:gid the worker runs as inside the container
const WORKER_USER: &str = "65534:65534";
const PIDS_LIMIT: i64 = 32;

/// Removes the container when the session goes away
///
/// Drop cannot be async, so removal is spawned onto the runtime.
struct ContainerGuard {
    docker: Docker,
    container_id: String,
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let container_id = std::mem::take(&mut self.container_id);
        let docker = self.docker.clone();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(container = %container_id, "no runtime available, container left behind");
            return;
        };
        handle.spawn(async move {
            let remove_options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            if let Err(e) = docker.remove_container(&container_id, Some(remove_options)).await {
                warn!(container = %container_id, error = %e, "container cleanup failed");
            } else {
                debug!(container = %container_id, "container removed");
            }
        });
    }
}

/// Runs each worker in a fresh, network-less, read-only container
#[derive(Clone)]
pub struct DockerSandbox {
    docker: Docker,
    image: String,
    memory_limit_mb: u32,
    cpu_limit: f64,
    startup_timeout: Duration,
}

impl DockerSandbox {
    pub fn new(
        image: impl Into<String>,
        memory_limit_mb: u32,
        cpu_limit: f64,
        startup_timeout: Duration,
    ) -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self {
            docker,
            image: image.into(),
            memory_limit_mb,
            cpu_limit,
            startup_timeout,
        })
    }

    /// Pull the worker image if the local cache does not have it
    async fn ensure_image(&self) -> Result<(), SandboxError> {
        if self.docker.inspect_image(&self.image).await.is_ok() {
            debug!(image = %self.image, "image cache hit");
            return Ok(());
        }

        warn!(image = %self.image, "image cache miss, pulling");
        let options = Some(CreateImageOptions {
            from_image: self.image.as_str(),
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result?;
        }
        info!(image = %self.image, "image pulled");
        Ok(())
    }

    fn container_config(&self, limits: &WorkerLimits) -> Config<String> {
        let cmd = ["python3", "-I", "-S", "-B", "-c", HARNESS]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut env: Vec<String> = limits
            .harness_env()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        env.push("PYTHONIOENCODING=utf-8".to_string());

        Config {
            image: Some(self.image.clone()),
            cmd: Some(cmd),
            entrypoint: Some(vec![]),
            env: Some(env),
            user: Some(WORKER_USER.to_string()),
            working_dir: Some("/tmp".to_string()),
            open_stdin: Some(true),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            network_disabled: Some(true),
            host_config: Some(HostConfig {
                memory: Some(i64::from(self.memory_limit_mb) * 1024 * 1024),
                nano_cpus: Some((self.cpu_limit * 1_000_000_000.0) as i64),
                pids_limit: Some(PIDS_LIMIT),
                readonly_rootfs: Some(true),
                network_mode: Some("none".to_string()),
                cap_drop: Some(vec!["ALL".to_string()]),
                security_opt: Some(vec!["no-new-privileges".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    fn name(&self) -> &'static str {
        "docker"
    }

    #[instrument(skip(self, limits), fields(image = %self.image))]
    async fn open(&self, limits: &WorkerLimits) -> Result<Session, SandboxError> {
        self.ensure_image().await?;

        let container_name = format!("agrolab-{}", Uuid::new_v4());
        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };
        let container = self
            .docker
            .create_container(Some(create_options), self.container_config(limits))
            .await?;

        // Guard exists before anything else can fail
        let guard = ContainerGuard {
            docker: self.docker.clone(),
            container_id: container.id.clone(),
        };

        let attach_options = AttachContainerOptions::<String> {
            stdin: Some(true),
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            ..Default::default()
        };
        let AttachContainerResults { mut output, input } = self
            .docker
            .attach_container(&container.id, Some(attach_options))
            .await?;

        self.docker
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await?;
        debug!(container = %container.id, "worker container started");

        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
        tokio::spawn(async move {
            let mut buffer = LineBuffer::new();
            while let Some(frame) = output.next().await {
                match frame {
                    Ok(LogOutput::StdOut { message }) => match buffer.push(&message) {
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
                    },
                    Ok(LogOutput::StdErr { message }) => {
                        debug!(target: "agrolab::worker", "{}", String::from_utf8_lossy(&message).trim_end());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "worker attach stream failed");
                        return;
                    }
                }
            }
        });

        let mut session = Session::new(Box::new(input), rx, Box::new(guard));
        session.handshake(self.startup_timeout).await?;
        Ok(session)
    }
}
