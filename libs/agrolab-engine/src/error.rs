use thiserror::Error;

use crate::value::PyValue;

/// Hard errors returned to the caller. Everything else becomes report data.
#[derive(Debug, Error)]
pub enum GradeError {
    #[error("unknown exercise '{0}'")]
    NotFound(String),
    #[error("grading capacity exhausted ({waiting} requests already queued)")]
    Saturated { waiting: usize },
}

/// Failure to bring up or talk to a sandbox worker
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to start sandbox worker: {0}")]
    Spawn(String),
    #[error("sandbox worker did not become ready within {0} ms")]
    StartupTimeout(u64),
    #[error(transparent)]
    Docker(#[from] bollard::errors::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An exception raised by submission code inside the sandbox
#[derive(Debug, Clone, PartialEq)]
pub struct RaisedError {
    pub kind: String,
    pub message: String,
    /// Class names of the exception type's MRO, most derived first
    pub mro: Vec<String>,
    pub line: Option<u32>,
    /// Handle to the exception object, for inspecting its attributes
    pub exception: Option<PyValue>,
}

impl RaisedError {
    pub fn is_instance_of(&self, class: &str) -> bool {
        self.kind == class || self.mro.iter().any(|c| c == class)
    }
}

impl std::fmt::Display for RaisedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.kind)?;
        } else {
            write!(f, "{}: {}", self.kind, self.message)?;
        }
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        Ok(())
    }
}

/// Result of one request to the bound context
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("{0}")]
    Raised(RaisedError),
    #[error("time budget exhausted")]
    Deadline,
    #[error("sandbox worker lost: {0}")]
    Sandbox(String),
}

/// Why a submission could not be bound
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("{0}")]
    Compile(String),
    #[error("time budget exhausted while evaluating the submission")]
    Deadline,
    #[error("sandbox worker lost: {0}")]
    Sandbox(String),
}

/// Why a single test case did not pass
#[derive(Debug, Clone, Error)]
pub enum CaseError {
    #[error("{0}")]
    Assertion(String),
    #[error("{0}")]
    Raised(RaisedError),
    #[error("time budget exhausted")]
    Deadline,
    #[error("sandbox worker lost: {0}")]
    Sandbox(String),
}

impl From<CallError> for CaseError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Raised(raised) => CaseError::Raised(raised),
            CallError::Deadline => CaseError::Deadline,
            CallError::Sandbox(msg) => CaseError::Sandbox(msg),
        }
    }
}

pub type CaseResult = Result<(), CaseError>;

/// The request's wall-clock budget ran out mid-run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("time budget exhausted")]
pub struct DeadlineExceeded;

#[cfg(test)]
mod tests {
    use super::*;

    fn raised(kind: &str, message: &str, line: Option<u32>) -> RaisedError {
        RaisedError {
            kind: kind.to_string(),
            message: message.to_string(),
            mro: vec![kind.to_string(), "ArithmeticError".to_string(), "Exception".to_string()],
            line,
            exception: None,
        }
    }

    #[test]
    fn test_raised_error_display() {
        let err = raised("ZeroDivisionError", "division by zero", Some(2));
        assert_eq!(err.to_string(), "ZeroDivisionError: division by zero (line 2)");

        let bare = raised("StopIteration", "", None);
        assert_eq!(bare.to_string(), "StopIteration");
    }

    #[test]
    fn test_raised_error_mro_check() {
        let err = raised("ZeroDivisionError", "division by zero", None);
        assert!(err.is_instance_of("ArithmeticError"));
        assert!(err.is_instance_of("ZeroDivisionError"));
        assert!(!err.is_instance_of("ValueError"));
    }

    #[test]
    fn test_call_error_maps_into_case_error() {
        assert!(matches!(CaseError::from(CallError::Deadline), CaseError::Deadline));
        assert!(matches!(
            CaseError::from(CallError::Sandbox("eof".into())),
            CaseError::Sandbox(_)
        ));
    }
}
