use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::server::endpoints::{status, success_rates};

mod endpoints;
mod types;

pub use endpoints::success_rates::parse_codes;
pub use types::{ApiErrorType, AppState};

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new().route("/success-rates", get(success_rates::get_success_rates));

    Router::new()
        .route("/health", get(status::get_health))
        .nest("/api", api_router)
        .with_state(app_state)
}
