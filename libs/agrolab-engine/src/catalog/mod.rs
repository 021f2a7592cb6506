//! Exercise Catalog
//!
//! Static definitions of every gradable exercise: the interface a submission
//! must expose and the ordered battery of hidden checks run against it.
//! Built once at startup and shared read-only between requests.

mod lesson1;
mod lesson2;
mod lesson4;
mod lesson5;

use agrolab_common::types::{ExerciseSummary, RequiredSymbol, SymbolKind};
use futures_util::future::BoxFuture;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::context::BoundContext;
use crate::error::{CaseResult, GradeError};

/// A check body: drives the bound submission and asserts on what comes back
pub type CaseFn = for<'a> fn(&'a mut BoundContext) -> BoxFuture<'a, CaseResult>;

#[derive(Clone, Copy)]
pub struct TestCase {
    pub name: &'static str,
    pub run: CaseFn,
}

impl TestCase {
    pub const fn new(name: &'static str, run: CaseFn) -> Self {
        Self { name, run }
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub struct ExerciseSpec {
    pub exercise_id: String,
    pub title: String,
    pub lesson: u32,
    pub required_symbols: Vec<RequiredSymbol>,
    pub test_cases: Vec<TestCase>,
    /// Overrides the configured budget for heavier exercises
    pub time_budget: Option<Duration>,
}

impl ExerciseSpec {
    pub fn new(exercise_id: &str, title: &str, lesson: u32) -> Self {
        Self {
            exercise_id: exercise_id.to_string(),
            title: title.to_string(),
            lesson,
            required_symbols: Vec::new(),
            test_cases: Vec::new(),
            time_budget: None,
        }
    }

    pub fn function(mut self, name: &str) -> Self {
        self.required_symbols.push(RequiredSymbol {
            name: name.to_string(),
            kind: SymbolKind::Function,
        });
        self
    }

    pub fn class(mut self, name: &str) -> Self {
        self.required_symbols.push(RequiredSymbol {
            name: name.to_string(),
            kind: SymbolKind::Class,
        });
        self
    }

    pub fn case(mut self, name: &'static str, run: CaseFn) -> Self {
        self.test_cases.push(TestCase::new(name, run));
        self
    }

    pub fn budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn case_names(&self) -> Vec<String> {
        self.test_cases.iter().map(|c| c.name.to_string()).collect()
    }

    pub fn summary(&self) -> ExerciseSummary {
        ExerciseSummary {
            exercise_id: self.exercise_id.clone(),
            title: self.title.clone(),
            lesson: self.lesson,
            required_symbols: self.required_symbols.clone(),
            test_cases: self.case_names(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    exercises: BTreeMap<String, ExerciseSpec>,
}

impl Catalog {
    /// Every exercise shipped with the course
    pub fn builtin() -> Self {
        let mut catalog = Catalog::default();
        for spec in lesson1::exercises()
            .into_iter()
            .chain(lesson2::exercises())
            .chain(lesson4::exercises())
            .chain(lesson5::exercises())
        {
            catalog.insert(spec);
        }
        catalog
    }

    /// Adds or replaces an exercise
    pub fn insert(&mut self, spec: ExerciseSpec) {
        self.exercises.insert(spec.exercise_id.clone(), spec);
    }

    pub fn get(&self, exercise_id: &str) -> Result<&ExerciseSpec, GradeError> {
        self.exercises
            .get(exercise_id)
            .ok_or_else(|| GradeError::NotFound(exercise_id.to_string()))
    }

    /// Exercises ordered by lesson, then id
    pub fn list(&self) -> Vec<&ExerciseSpec> {
        let mut specs: Vec<&ExerciseSpec> = self.exercises.values().collect();
        specs.sort_by(|a, b| (a.lesson, &a.exercise_id).cmp(&(b.lesson, &b.exercise_id)));
        specs
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }
}
