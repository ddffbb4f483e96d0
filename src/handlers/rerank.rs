use crate::error::{AppError, Result};
use crate::handlers::extract::ValidJson;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RerankRequest {
    pub query: String,
    pub documents: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RerankResponse {
    /// Document indices, most relevant first. Always a full permutation.
    pub ranking: Vec<usize>,
}

/// POST /rerank - Rank documents by cosine similarity to the query.
///
/// # Flow
/// 1. Validate input (missing fields and non-array documents fail at extraction)
/// 2. Encode query and documents in one batch at native dimensionality
/// 3. Stable sort by descending similarity
pub async fn rerank_handler(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<RerankRequest>,
) -> Result<Json<RerankResponse>> {
    if request.query.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Query cannot be empty".to_string(),
        ));
    }
    if request.documents.is_empty() {
        return Err(AppError::ValidationError(
            "Documents list cannot be empty".to_string(),
        ));
    }
    let max_docs = state.config.max_documents;
    if request.documents.len() > max_docs {
        return Err(AppError::ValidationError(format!(
            "Maximum {} documents per request",
            max_docs
        )));
    }

    let batch_size = request.documents.len();

    let ranked = state
        .reranker
        .rerank(&request.query, &request.documents)
        .await?;

    if let Some(top) = ranked.first() {
        tracing::debug!(batch_size, top_index = top.index, top_score = top.score, "Rerank completed");
    }

    metrics::counter!("rerank_requests_total").increment(1);
    metrics::histogram!("rerank_documents").record(batch_size as f64);

    Ok(Json(RerankResponse {
        ranking: ranked.into_iter().map(|r| r.index).collect(),
    }))
}
