use crate::handlers::{
    embed_handler, embeddings_handler, health_handler, models_handler, ready_handler,
    rerank_handler,
};
use crate::middleware::{request_id, require_api_key};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Request body limit for the embedding and rerank routes.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Build the service router. `/metrics` is added by the binary.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/v1/embeddings", post(embeddings_handler))
        .route("/embed", post(embed_handler))
        .route("/rerank", post(rerank_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/models", get(models_handler))
        .route("/v1/models", get(models_handler))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}
