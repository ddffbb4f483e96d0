use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub initialized: bool,
    pub timestamp: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: String,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// GET /health - Liveness probe, reports whether the model is loaded
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        initialized: state.is_ready(),
        timestamp: now_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /ready - Readiness probe (checks model is loaded and warmed up)
pub async fn ready_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let readiness = state.readiness();
    let ready = state.is_ready();

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: readiness.as_str(),
            initialized: ready,
            timestamp: now_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// GET /models, GET /v1/models - Static descriptor of the served model
pub async fn models_handler(State(state): State<Arc<AppState>>) -> Json<ModelDescriptor> {
    let config = &state.config;
    Json(ModelDescriptor {
        id: config.model_id.clone(),
        object: "model",
        created: config.model_created,
        owned_by: config.model_owner.clone(),
    })
}
