// CLI commands for grading and browsing exercises
use agrolab_common::config::{BackendKind, GraderConfig};
use agrolab_common::types::{ExerciseSummary, Submission};
use agrolab_engine::{reporter, Catalog, GradingEngine};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Grade `file` against `exercise_id`. Returns whether the submission passed.
pub async fn grade(
    exercise_id: &str,
    file: &Path,
    json: bool,
    backend: Option<BackendKind>,
) -> Result<bool> {
    let source = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut config = GraderConfig::load_default()?;
    if let Some(backend) = backend {
        config.backend = backend;
    }
    debug!(backend = %config.backend, time_budget_ms = config.time_budget_ms, "Using configuration");

    let engine = GradingEngine::from_config(&config)?;
    let submission = Submission::new(exercise_id, source);
    let report = engine.grade(&submission).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", reporter::render_text(&report));
    }

    Ok(report.is_pass())
}

pub fn list() -> Result<()> {
    let catalog = Catalog::builtin();
    println!("{:<16} {:>6}  {:>5}  TITLE", "EXERCISE", "LESSON", "CASES");
    for spec in catalog.list() {
        println!(
            "{:<16} {:>6}  {:>5}  {}",
            spec.exercise_id,
            spec.lesson,
            spec.test_cases.len(),
            spec.title
        );
    }
    Ok(())
}

pub fn show(exercise_id: &str) -> Result<()> {
    let catalog = Catalog::builtin();
    let spec = catalog.get(exercise_id)?;
    print!("{}", describe(&spec.summary()));
    Ok(())
}

fn describe(summary: &ExerciseSummary) -> String {
    let mut out = format!(
        "{} (lesson {})\n{}\n\nRequired symbols:\n",
        summary.exercise_id, summary.lesson, summary.title
    );
    for symbol in &summary.required_symbols {
        out.push_str(&format!("  {} {}\n", symbol.kind, symbol.name));
    }
    out.push_str("\nTest cases:\n");
    for case in &summary.test_cases {
        out.push_str(&format!("  {}\n", case));
    }
    out
}
