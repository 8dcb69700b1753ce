//! Logging API routes.
//!
//! View and modify the runtime log filter.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_log_filter).put(update_log_filter))
}

#[derive(Debug, Serialize)]
struct LoggingConfigResponse {
    filter: String,
}

#[derive(Debug, Deserialize)]
struct UpdateLogFilterRequest {
    filter: String,
}

async fn get_log_filter(State(state): State<AppState>) -> ApiResult<Json<LoggingConfigResponse>> {
    let logging = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::internal("Logging configuration not available"))?;
    Ok(Json(LoggingConfigResponse {
        filter: logging.get_filter(),
    }))
}

async fn update_log_filter(
    State(state): State<AppState>,
    Json(request): Json<UpdateLogFilterRequest>,
) -> ApiResult<Json<LoggingConfigResponse>> {
    let logging = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::internal("Logging configuration not available"))?;

    logging
        .set_filter(&request.filter)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(Json(LoggingConfigResponse {
        filter: logging.get_filter(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_deserialize() {
        let json = r#"{"filter": "sysscope=debug"}"#;
        let request: UpdateLogFilterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.filter, "sysscope=debug");
    }
}
