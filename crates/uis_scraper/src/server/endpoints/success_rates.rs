//! Read contract for persisted success rates.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::server::types::{ApiErrorType, AppState};

#[derive(Debug, Deserialize)]
pub struct SuccessRateQuery {
    /// Comma-separated course codes
    pub codes: Option<String>,
}

/// Trimmed, upper-cased, non-empty codes in request order without duplicates.
pub fn parse_codes(raw: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for code in raw.split(',').map(|c| c.trim().to_uppercase()) {
        if !code.is_empty() && !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

/// GET /api/success-rates?codes=EBC-ALG,EBC-MAT
///
/// Codes without persisted statistics are simply missing from `data`.
pub async fn get_success_rates(
    Query(query): Query<SuccessRateQuery>,
    State(s): State<Arc<AppState>>,
) -> Response {
    let codes = parse_codes(query.codes.as_deref().unwrap_or_default());
    if codes.is_empty() {
        return ApiErrorType::from((
            StatusCode::BAD_REQUEST,
            "Missing `codes` query parameter",
            None,
        ))
        .into_response();
    }

    info!(codes = codes.len(), "GET /api/success-rates");

    match s.db.success_rates_for(&codes) {
        Ok(data) => (
            StatusCode::OK,
            Json(json!({
                "lastUpdated": Utc::now().to_rfc3339(),
                "data": data,
            })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to read success rates");
            ApiErrorType::from((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read success rates",
                Some(e.to_string()),
            ))
            .into_response()
        }
    }
}
