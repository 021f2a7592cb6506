//! Result Reporter
//!
//! Pure aggregation of per-case outcomes into a `Report`. No I/O.

use agrolab_common::types::{CaseReport, Outcome, Report, Verdict};
use std::fmt::Write;

/// Overall is `Pass` iff there is at least one case and every case passed
pub fn build(
    exercise_id: &str,
    case_outcomes: Vec<(String, Outcome)>,
    captured_output: String,
) -> Report {
    let per_case: Vec<CaseReport> = case_outcomes
        .into_iter()
        .map(|(name, outcome)| CaseReport { name, outcome })
        .collect();

    let overall = if !per_case.is_empty() && per_case.iter().all(|c| c.outcome.is_pass()) {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    Report {
        exercise_id: exercise_id.to_string(),
        overall,
        per_case,
        captured_output,
    }
}

/// Same outcome for every case: compile errors, timeouts, sandbox failures
pub fn uniform(
    exercise_id: &str,
    case_names: &[String],
    outcome: Outcome,
    captured_output: String,
) -> Report {
    let case_outcomes = case_names
        .iter()
        .map(|name| (name.clone(), outcome.clone()))
        .collect();
    build(exercise_id, case_outcomes, captured_output)
}

/// unittest-style text rendering for terminals
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();

    for case in &report.per_case {
        let status = match &case.outcome {
            Outcome::Pass => "ok",
            Outcome::Failed { .. } => "FAIL",
            Outcome::Errored { .. } => "ERROR",
        };
        let _ = writeln!(out, "{} ... {}", case.name, status);
    }

    for case in &report.per_case {
        let (label, detail) = match &case.outcome {
            Outcome::Pass => continue,
            Outcome::Failed { message } => ("FAIL", message.clone()),
            Outcome::Errored { kind, message } => ("ERROR", format!("{}: {}", kind, message)),
        };
        let _ = writeln!(out, "\n{}", "=".repeat(70));
        let _ = writeln!(out, "{}: {}", label, case.name);
        let _ = writeln!(out, "{}", "-".repeat(70));
        let _ = writeln!(out, "{}", detail);
    }

    if !report.captured_output.is_empty() {
        let _ = writeln!(out, "\n{}", "-".repeat(70));
        let _ = writeln!(out, "Captured output:");
        let _ = write!(out, "{}", report.captured_output);
        if !report.captured_output.ends_with('\n') {
            out.push('\n');
        }
    }

    let _ = writeln!(out, "\n{}", "-".repeat(70));
    let _ = writeln!(out, "Ran {} tests", report.total());
    let failures = report
        .per_case
        .iter()
        .filter(|c| matches!(c.outcome, Outcome::Failed { .. }))
        .count();
    let errors = report
        .per_case
        .iter()
        .filter(|c| matches!(c.outcome, Outcome::Errored { .. }))
        .count();
    if report.is_pass() {
        let _ = writeln!(out, "\nOK");
    } else {
        let _ = writeln!(out, "\nFAILED (failures={}, errors={})", failures, errors);
    }

    out
}
