//! Text encoder capability and its ONNX Runtime adapter.
//!
//! Everything above this module depends only on [`TextEncoder`]: given N
//! strings it returns an N×D matrix. [`EncoderLoader`] is the expensive,
//! one-shot construction step that the lifecycle manager runs at most once.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::inference::model::EmbeddingModel;
use crate::inference::tokenize::TokenizerWrapper;
use ndarray::Array2;
use std::path::PathBuf;
use std::sync::Arc;

/// Batch text-to-vector capability.
///
/// Implementations must return one row per input, in input order, and give
/// the same row for a text whether it is encoded alone or inside a batch.
pub trait TextEncoder: Send + Sync {
    /// Native embedding dimensionality (columns of every `encode` result).
    fn dimension(&self) -> usize;

    /// Encode all texts in a single inference call.
    fn encode(&self, texts: &[String]) -> Result<Array2<f32>>;
}

/// Builds the encoder. Called from a blocking thread, at most once per process.
pub trait EncoderLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn TextEncoder>>;
}

/// Tokenizer plus pooled ONNX sessions.
pub struct OnnxTextEncoder {
    model: EmbeddingModel,
    tokenizer: TokenizerWrapper,
    dimension: usize,
}

impl OnnxTextEncoder {
    pub fn new(model: EmbeddingModel, tokenizer: TokenizerWrapper, dimension: usize) -> Self {
        Self {
            model,
            tokenizer,
            dimension,
        }
    }
}

impl TextEncoder for OnnxTextEncoder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, texts: &[String]) -> Result<Array2<f32>> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, self.dimension)));
        }

        let (input_ids, attention_mask, token_type_ids) = self.tokenizer.tokenize_batch(texts)?;
        let embeddings = self.model.embed(input_ids, attention_mask, token_type_ids)?;

        if embeddings.ncols() != self.dimension {
            return Err(AppError::ModelError(format!(
                "Model produced {} dimensions, expected {}",
                embeddings.ncols(),
                self.dimension
            )));
        }

        Ok(embeddings)
    }
}

/// Loads the ONNX model and tokenizer from the configured paths.
pub struct OnnxLoader {
    model_path: PathBuf,
    tokenizer_path: PathBuf,
    max_sequence_length: usize,
    dimension: usize,
    pool_size: usize,
    intra_threads: usize,
}

impl OnnxLoader {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model_path: config.model_path.clone(),
            tokenizer_path: config.tokenizer_path.clone(),
            max_sequence_length: config.max_sequence_length,
            dimension: config.embedding_dim,
            pool_size: config.effective_pool_size(),
            intra_threads: config.intra_threads,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }
}

impl EncoderLoader for OnnxLoader {
    fn load(&self) -> Result<Arc<dyn TextEncoder>> {
        let model = EmbeddingModel::load_pool(&self.model_path, self.pool_size, self.intra_threads)?;
        let tokenizer = TokenizerWrapper::load(&self.tokenizer_path, self.max_sequence_length)?;

        Ok(Arc::new(OnnxTextEncoder::new(model, tokenizer, self.dimension)))
    }
}
