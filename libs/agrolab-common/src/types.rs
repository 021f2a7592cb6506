use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Boundary input from the lesson UI: which exercise, and what the learner typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    pub exercise_id: String,
    pub source_text: String,
}

/// One learner attempt. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub exercise_id: String,
    pub source_text: String,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(exercise_id: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            exercise_id: exercise_id.into(),
            source_text: source_text.into(),
            submitted_at: Utc::now(),
        }
    }
}

impl From<GradeRequest> for Submission {
    fn from(request: GradeRequest) -> Self {
        Submission::new(request.exercise_id, request.source_text)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CompileError,
    Timeout,
    RuntimeError,
    SandboxFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::CompileError => "CompileError",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::SandboxFailure => "SandboxFailure",
        };
        f.write_str(name)
    }
}

/// Verdict of a single test case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Failed { message: String },
    Errored { kind: ErrorKind, message: String },
}

impl Outcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Outcome::Failed {
            message: message.into(),
        }
    }

    pub fn errored(kind: ErrorKind, message: impl Into<String>) -> Self {
        Outcome::Errored {
            kind,
            message: message.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Pass => None,
            Outcome::Failed { message } | Outcome::Errored { message, .. } => Some(message),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("pass"),
            Verdict::Fail => f.write_str("fail"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseReport {
    pub name: String,
    pub outcome: Outcome,
}

/// Aggregated result of grading one submission against one exercise.
///
/// `per_case` always mirrors the exercise's declared test cases, in order,
/// even when the submission never compiled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub exercise_id: String,
    pub overall: Verdict,
    pub per_case: Vec<CaseReport>,
    pub captured_output: String,
}

impl Report {
    pub fn passed(&self) -> usize {
        self.per_case.iter().filter(|c| c.outcome.is_pass()).count()
    }

    pub fn total(&self) -> usize {
        self.per_case.len()
    }

    pub fn is_pass(&self) -> bool {
        self.overall == Verdict::Pass
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Function => f.write_str("function"),
            SymbolKind::Class => f.write_str("class"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequiredSymbol {
    pub name: String,
    pub kind: SymbolKind,
}

/// Public description of an exercise (no hidden test logic)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseSummary {
    pub exercise_id: String,
    pub title: String,
    pub lesson: u32,
    pub required_symbols: Vec<RequiredSymbol>,
    pub test_cases: Vec<String>,
}
