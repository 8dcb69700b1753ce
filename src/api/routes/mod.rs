//! API route modules.

pub mod health;
pub mod logging;
pub mod metrics;

use axum::{Router, http::Uri};

use crate::api::error::ApiError;
use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/metrics", metrics::router())
        .nest("/api/logging", logging::router())
        .nest("/health", health::router())
        .fallback(fallback)
        .with_state(state)
}

/// JSON 404 for unmatched paths.
async fn fallback(uri: Uri) -> ApiError {
    ApiError::not_found(format!("no route for {uri}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_unknown_path_maps_to_not_found() {
        let error = fallback("/api/nope".parse().unwrap()).await;
        assert_eq!(error.status, StatusCode::NOT_FOUND);
        assert!(error.message.contains("/api/nope"));
    }
}
