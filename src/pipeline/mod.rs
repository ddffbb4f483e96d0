//! Request-level orchestration on top of the text encoder.

pub mod embed;
pub mod reduce;
pub mod rerank;

pub use embed::EmbeddingPipeline;
pub use reduce::reduce;
pub use rerank::{cosine_similarity, rank_by_score, RankedIndex, Reranker};

use crate::error::{AppError, Result};
use crate::inference::TextEncoder;
use ndarray::Array2;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Admission control in front of the encoder.
///
/// Each encode call holds one permit while its batch runs on the blocking
/// pool, so at most `permits` inferences are in flight. Waiting longer than
/// `permit_timeout` for a permit answers 503; a running inference is never
/// aborted.
pub struct InferenceGate {
    semaphore: Semaphore,
    permit_timeout: Duration,
}

impl InferenceGate {
    pub fn new(permits: usize, permit_timeout: Duration) -> Self {
        Self {
            semaphore: Semaphore::new(permits.max(1)),
            permit_timeout,
        }
    }

    pub async fn encode(
        &self,
        encoder: Arc<dyn TextEncoder>,
        texts: Vec<String>,
    ) -> Result<Array2<f32>> {
        let _permit = tokio::time::timeout(self.permit_timeout, self.semaphore.acquire())
            .await
            .map_err(|_| {
                AppError::ResourceError("Service temporarily overloaded, please retry".to_string())
            })?
            .map_err(|_| AppError::ResourceError("Semaphore closed".to_string()))?;

        let expected_rows = texts.len();
        let start = Instant::now();

        let output = tokio::task::spawn_blocking(move || encoder.encode(&texts))
            .await
            .map_err(|e| AppError::ModelError(format!("Task join error: {}", e)))??;

        metrics::histogram!("inference_duration_seconds").record(start.elapsed().as_secs_f64());

        if output.nrows() != expected_rows {
            return Err(AppError::ModelError(format!(
                "Encoder returned {} rows for {} inputs",
                output.nrows(),
                expected_rows
            )));
        }

        Ok(output)
    }
}
