use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/grade", post(handlers::grade))
        .route("/exercises", get(handlers::list_exercises))
        .route("/exercises/:exercise_id", get(handlers::get_exercise))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
}
