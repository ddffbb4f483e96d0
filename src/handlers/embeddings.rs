//! OpenAI-compatible `/v1/embeddings` and the legacy `/embed` endpoint.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::handlers::extract::ValidJson;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `input` may be a single string or a list of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbeddingInput {
    pub fn into_texts(self) -> Vec<String> {
        match self {
            EmbeddingInput::Single(text) => vec![text],
            EmbeddingInput::Batch(texts) => texts,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingsRequest {
    pub input: EmbeddingInput,
    pub model: String,
    #[serde(default)]
    pub dimensions: Option<usize>,
    #[serde(default)]
    pub encoding_format: Option<String>,
    /// Accepted for OpenAI SDK compatibility, unused.
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmbeddingsResponse {
    pub object: &'static str,
    pub data: Vec<EmbeddingData>,
    pub model: String,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct EmbeddingData {
    pub object: &'static str,
    pub index: usize,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Deserialize)]
pub struct LegacyEmbedRequest {
    pub input: EmbeddingInput,
    #[serde(default)]
    pub dimensions: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LegacyEmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub count: usize,
}

/// Rough token count: a quarter of the characters, rounded up, per input.
pub fn estimate_tokens(texts: &[String]) -> usize {
    texts.iter().map(|t| t.chars().count().div_ceil(4)).sum()
}

/// Checks shared by both endpoints; returns the texts to embed.
fn validate_input(input: EmbeddingInput, dimensions: Option<usize>, config: &Config) -> Result<Vec<String>> {
    let texts = input.into_texts();

    if texts.is_empty() {
        return Err(AppError::ValidationError(
            "input cannot be empty".to_string(),
        ));
    }
    if let Some(position) = texts.iter().position(|t| t.is_empty()) {
        return Err(AppError::ValidationError(format!(
            "input[{}] cannot be an empty string",
            position
        )));
    }
    if texts.len() > config.max_inputs {
        return Err(AppError::ValidationError(format!(
            "Maximum {} inputs per request",
            config.max_inputs
        )));
    }
    if let Some(dim) = dimensions {
        if dim == 0 || dim > config.embedding_dim {
            return Err(AppError::ValidationError(format!(
                "dimensions must be between 1 and {}",
                config.embedding_dim
            )));
        }
    }

    Ok(texts)
}

pub fn validate_embeddings_request(request: EmbeddingsRequest, config: &Config) -> Result<Vec<String>> {
    if request.model != config.model_id {
        return Err(AppError::ValidationError(format!(
            "Unknown model '{}'. Supported model: {}",
            request.model, config.model_id
        )));
    }
    if let Some(format) = request.encoding_format.as_deref() {
        if format != "float" {
            return Err(AppError::ValidationError(format!(
                "Unsupported encoding_format '{}'. Only 'float' is supported",
                format
            )));
        }
    }

    validate_input(request.input, request.dimensions, config)
}

/// POST /v1/embeddings - OpenAI-compatible embeddings.
///
/// # Flow
/// 1. Validate model id, encoding format, dimensions and input
/// 2. Embed as documents (MRL reduction when `dimensions` < native)
/// 3. Wrap vectors in the OpenAI list shape with estimated usage
pub async fn embeddings_handler(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<EmbeddingsRequest>,
) -> Result<Json<EmbeddingsResponse>> {
    let dimensions = request.dimensions;
    let texts = validate_embeddings_request(request, &state.config)?;

    let vectors = state.embedder.embed(&texts, dimensions).await?;
    let tokens = estimate_tokens(&texts);

    metrics::counter!("embedding_requests_total", "endpoint" => "v1").increment(1);
    metrics::histogram!("embedding_inputs").record(texts.len() as f64);

    let data = vectors
        .into_iter()
        .enumerate()
        .map(|(index, embedding)| EmbeddingData {
            object: "embedding",
            index,
            embedding,
        })
        .collect();

    Ok(Json(EmbeddingsResponse {
        object: "list",
        data,
        model: state.config.model_id.clone(),
        usage: Usage {
            prompt_tokens: tokens,
            total_tokens: tokens,
        },
    }))
}

/// POST /embed - Legacy endpoint returning bare vectors.
pub async fn embed_handler(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<LegacyEmbedRequest>,
) -> Result<Json<LegacyEmbedResponse>> {
    let texts = validate_input(request.input, request.dimensions, &state.config)?;

    let embeddings = state.embedder.embed(&texts, request.dimensions).await?;

    metrics::counter!("embedding_requests_total", "endpoint" => "legacy").increment(1);
    metrics::histogram!("embedding_inputs").record(texts.len() as f64);

    Ok(Json(LegacyEmbedResponse {
        count: embeddings.len(),
        embeddings,
    }))
}
