// Grader configuration: config/grader.json plus environment overrides
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/grader.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Process,
    Docker,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "process" => Ok(BackendKind::Process),
            "docker" => Ok(BackendKind::Docker),
            other => bail!("Unknown sandbox backend '{}' (expected process or docker)", other),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Process => f.write_str("process"),
            BackendKind::Docker => f.write_str("docker"),
        }
    }
}

/// What happens when every sandbox slot is busy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum Backpressure {
    /// Wait in FIFO order for a free slot
    Queue,
    /// Refuse new requests once `max_waiting` callers are already queued
    Reject { max_waiting: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    pub backend: BackendKind,
    pub time_budget_ms: u64,
    pub startup_timeout_ms: u64,
    pub max_concurrent: usize,
    pub backpressure: Backpressure,
    pub max_source_bytes: usize,
    pub max_output_bytes: usize,
    pub memory_limit_mb: u32,
    pub cpu_limit: f32,
    pub python: String,
    pub image: String,
    pub bind_addr: String,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Process,
            time_budget_ms: 3_000,
            startup_timeout_ms: 10_000,
            max_concurrent: 4,
            backpressure: Backpressure::Queue,
            max_source_bytes: 64 * 1024,
            max_output_bytes: 64 * 1024,
            memory_limit_mb: 256,
            cpu_limit: 0.5,
            python: "python3".to_string(),
            image: "python:3.12-slim".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl GraderConfig {
    /// Load configuration from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Grader config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: GraderConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load config/grader.json if present (defaults otherwise), then apply env overrides
    pub fn load_default() -> Result<Self> {
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        let config = if default_path.exists() {
            Self::load(default_path)?
        } else {
            Self::default()
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `AGROLAB_*` overrides. The lookup is injected so tests don't touch the process env.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("AGROLAB_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(ms) = lookup("AGROLAB_TIME_BUDGET_MS") {
            self.time_budget_ms = ms
                .parse()
                .context("AGROLAB_TIME_BUDGET_MS must be an integer")?;
        }
        if let Some(n) = lookup("AGROLAB_MAX_CONCURRENT") {
            self.max_concurrent = n
                .parse()
                .context("AGROLAB_MAX_CONCURRENT must be an integer")?;
        }
        if let Some(n) = lookup("AGROLAB_MAX_WAITING") {
            let max_waiting = n
                .parse()
                .context("AGROLAB_MAX_WAITING must be an integer")?;
            self.backpressure = Backpressure::Reject { max_waiting };
        }
        if let Some(python) = lookup("AGROLAB_PYTHON") {
            self.python = python;
        }
        if let Some(image) = lookup("AGROLAB_IMAGE") {
            self.image = image;
        }
        if let Some(mb) = lookup("AGROLAB_MEMORY_MB") {
            self.memory_limit_mb = mb.parse().context("AGROLAB_MEMORY_MB must be an integer")?;
        }
        if let Some(addr) = lookup("AGROLAB_BIND") {
            self.bind_addr = addr;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            bail!("max_concurrent must be at least 1");
        }
        if self.time_budget_ms == 0 {
            bail!("time_budget_ms must be positive");
        }
        if self.memory_limit_mb < 32 {
            bail!("memory_limit_mb must be at least 32");
        }
        Ok(())
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = GraderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend, BackendKind::Process);
        assert_eq!(config.backpressure, Backpressure::Queue);
        assert_eq!(config.time_budget(), Duration::from_secs(3));
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: GraderConfig = serde_json::from_str(
            r#"{ "backend": "docker", "backpressure": { "policy": "reject", "max_waiting": 8 } }"#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Docker);
        assert_eq!(config.backpressure, Backpressure::Reject { max_waiting: 8 });
        assert_eq!(config.max_concurrent, 4);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AGROLAB_BACKEND", "Docker"),
            ("AGROLAB_TIME_BUDGET_MS", "1500"),
            ("AGROLAB_MAX_WAITING", "2"),
        ]);
        let config = GraderConfig::default()
            .with_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.backend, BackendKind::Docker);
        assert_eq!(config.time_budget_ms, 1500);
        assert_eq!(config.backpressure, Backpressure::Reject { max_waiting: 2 });
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let result = GraderConfig::default().with_env_overrides(|key| {
            (key == "AGROLAB_MAX_CONCURRENT").then(|| "0".to_string())
        });
        assert!(result.is_err());

        let result = GraderConfig::default()
            .with_env_overrides(|key| (key == "AGROLAB_BACKEND").then(|| "vm".to_string()));
        assert!(result.is_err());
    }
}
