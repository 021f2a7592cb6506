//! Grading engine for the AgroLab Python course.
//!
//! A submission is bound inside a fresh sandbox worker, the exercise's hidden
//! checks run against it in order, and the outcomes are folded into a
//! `Report`. See `GradingEngine::grade` for the end-to-end flow.

pub mod catalog;
pub mod context;
pub mod error;
pub mod executor;
pub mod expect;
pub mod pool;
pub mod protocol;
pub mod reporter;
pub mod runner;
pub mod sandbox;
pub mod value;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, ExerciseSpec, TestCase};
pub use context::BoundContext;
pub use error::{CallError, CaseError, CaseResult, GradeError, LoadError, SandboxError};
pub use executor::{execute, GradingEngine, LoadFailure};
pub use pool::WorkerPool;
pub use value::PyValue;
