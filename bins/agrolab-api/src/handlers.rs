// HTTP route handlers for the AgroLab grader API

use agrolab_common::types::{ExerciseSummary, GradeRequest, Submission};
use agrolab_engine::GradeError;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::metrics;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, err: impl ToString) -> Response {
    (status, Json(ErrorResponse { error: err.to_string() })).into_response()
}

/// POST /grade - Grade one submission synchronously
pub async fn grade(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GradeRequest>,
) -> Response {
    let submission = Submission::from(payload);
    info!(
        submission_id = %submission.id,
        exercise_id = %submission.exercise_id,
        source_bytes = submission.source_text.len(),
        "Grading request received"
    );

    let timer = metrics::GRADE_DURATION.start_timer();
    match state.engine.grade(&submission).await {
        Ok(report) => {
            timer.observe_duration();
            let verdict = report.overall.to_string();
            metrics::GRADES_TOTAL
                .with_label_values(&[report.exercise_id.as_str(), verdict.as_str()])
                .inc();
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(GradeError::NotFound(id)) => {
            timer.stop_and_discard();
            metrics::REJECTIONS_TOTAL.with_label_values(&["not_found"]).inc();
            warn!(exercise_id = %id, "Unknown exercise requested");
            error_response(StatusCode::NOT_FOUND, GradeError::NotFound(id))
        }
        Err(err @ GradeError::Saturated { .. }) => {
            timer.stop_and_discard();
            metrics::REJECTIONS_TOTAL.with_label_values(&["saturated"]).inc();
            warn!("Grading request rejected: {}", err);
            error_response(StatusCode::SERVICE_UNAVAILABLE, err)
        }
    }
}

/// GET /exercises - Public summaries of every catalog entry
pub async fn list_exercises(State(state): State<Arc<AppState>>) -> Json<Vec<ExerciseSummary>> {
    Json(
        state
            .engine
            .catalog()
            .list()
            .into_iter()
            .map(|spec| spec.summary())
            .collect(),
    )
}

/// GET /exercises/:exercise_id
pub async fn get_exercise(
    State(state): State<Arc<AppState>>,
    Path(exercise_id): Path<String>,
) -> Response {
    match state.engine.catalog().get(&exercise_id) {
        Ok(spec) => (StatusCode::OK, Json(spec.summary())).into_response(),
        Err(err) => error_response(StatusCode::NOT_FOUND, err),
    }
}

/// GET /health - Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let pool = state.engine.pool();
    Json(serde_json::json!({
        "status": "healthy",
        "service": "agrolab-api",
        "backend": state.engine.backend(),
        "exercises": state.engine.catalog().len(),
        "slots_available": pool.available(),
        "slots_total": pool.capacity(),
        "waiting": pool.waiting(),
    }))
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let pool = state.engine.pool();
    metrics::POOL_WAITING.set(pool.waiting() as i64);
    metrics::POOL_AVAILABLE.set(pool.available() as i64);

    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}
