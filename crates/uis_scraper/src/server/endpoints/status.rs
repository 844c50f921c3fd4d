use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::server::types::{ApiErrorType, AppState};

/// GET /health
pub async fn get_health(State(s): State<Arc<AppState>>) -> Response {
    match s.db.faculties() {
        Ok(faculties) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "faculties": faculties.len() })),
        )
            .into_response(),
        Err(e) => ApiErrorType::from((
            StatusCode::SERVICE_UNAVAILABLE,
            "Database unavailable",
            Some(e.to_string()),
        ))
        .into_response(),
    }
}
