use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::Instrument;

/// API key authentication for the embedding and rerank routes.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    check_api_key(state.config.api_key.as_deref(), header)?;

    Ok(next.run(request).await)
}

/// Accept `Authorization: Bearer <key>` or the bare key.
pub fn presented_key(header: &str) -> &str {
    let header = header.trim();
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .unwrap_or(header)
}

pub fn check_api_key(configured: Option<&str>, header: Option<&str>) -> Result<()> {
    let expected = configured.ok_or_else(|| {
        AppError::ConfigurationError("API_KEY is not set on the server".to_string())
    })?;

    let provided = header.map(presented_key).filter(|k| !k.is_empty()).ok_or_else(|| {
        AppError::AuthenticationError(
            "API key required. Provide it as 'Authorization: Bearer <key>'".to_string(),
        )
    })?;

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(AppError::AuthenticationError("Invalid API key".to_string()))
    }
}

/// Propagate or mint an `x-request-id` and attach it to the tracing span.
pub async fn request_id(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}
