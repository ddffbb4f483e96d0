use crate::error::{AppError, Result};
use crate::lifecycle::ModelLifecycle;
use crate::pipeline::{reduce, InferenceGate};
use crate::prefix::{prefix_all, TextRole};
use std::sync::Arc;

/// Text → embedding vectors, with optional Matryoshka truncation.
pub struct EmbeddingPipeline {
    lifecycle: Arc<ModelLifecycle>,
    gate: Arc<InferenceGate>,
}

impl EmbeddingPipeline {
    pub fn new(lifecycle: Arc<ModelLifecycle>, gate: Arc<InferenceGate>) -> Self {
        Self { lifecycle, gate }
    }

    /// Embed `texts` as documents, one vector per input in input order.
    ///
    /// `dimensions` other than the model's native size applies MRL reduction;
    /// `None` or the native size returns the encoder's vectors as-is.
    pub async fn embed(&self, texts: &[String], dimensions: Option<usize>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(AppError::ValidationError(
                "Input list cannot be empty".to_string(),
            ));
        }

        let encoder = self.lifecycle.ensure_ready().await?;
        let native_dim = encoder.dimension();

        if let Some(dim) = dimensions {
            if dim == 0 || dim > native_dim {
                return Err(AppError::ValidationError(format!(
                    "dimensions must be between 1 and {}",
                    native_dim
                )));
            }
        }

        let prefixed = prefix_all(TextRole::Document, texts);
        let full = self.gate.encode(encoder, prefixed).await?;

        let vectors = match dimensions {
            Some(dim) if dim != native_dim => reduce(full, dim)?,
            _ => full,
        };

        tracing::debug!(
            count = texts.len(),
            dimensions = vectors.ncols(),
            "Embedding completed"
        );

        Ok(vectors.outer_iter().map(|row| row.to_vec()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{EncoderLoader, TextEncoder};
    use ndarray::Array2;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Deterministic per-text vectors that record what they were asked to encode.
    struct RecordingEncoder {
        seen: Mutex<Vec<String>>,
    }

    impl TextEncoder for RecordingEncoder {
        fn dimension(&self) -> usize {
            32
        }

        fn encode(&self, texts: &[String]) -> Result<Array2<f32>> {
            self.seen.lock().unwrap().extend(texts.iter().cloned());
            Ok(Array2::from_shape_fn((texts.len(), 32), |(i, j)| {
                let seed = texts[i].bytes().map(u32::from).sum::<u32>() as f32;
                ((seed + j as f32) * 0.37).cos()
            }))
        }
    }

    struct Loader(Arc<RecordingEncoder>);

    impl EncoderLoader for Loader {
        fn load(&self) -> Result<Arc<dyn TextEncoder>> {
            let encoder: Arc<dyn TextEncoder> = self.0.clone();
            Ok(encoder)
        }
    }

    fn pipeline() -> (EmbeddingPipeline, Arc<RecordingEncoder>) {
        let encoder = Arc::new(RecordingEncoder {
            seen: Mutex::new(Vec::new()),
        });
        let lifecycle = Arc::new(ModelLifecycle::new(Arc::new(Loader(encoder.clone()))));
        let gate = Arc::new(InferenceGate::new(1, Duration::from_secs(1)));
        (EmbeddingPipeline::new(lifecycle, gate), encoder)
    }

    #[tokio::test]
    async fn test_encoder_only_sees_document_prefix() {
        let (pipeline, encoder) = pipeline();
        pipeline
            .embed(&["hello world".to_string()], None)
            .await
            .unwrap();

        let seen = encoder.seen.lock().unwrap();
        // First entry is the warmup text
        assert_eq!(seen.last().unwrap(), "search_document: hello world");
    }

    #[tokio::test]
    async fn test_reduced_vectors_have_requested_length_and_unit_norm() {
        let (pipeline, _) = pipeline();
        let vectors = pipeline
            .embed(&["a".to_string(), "b".to_string()], Some(8))
            .await
            .unwrap();

        assert_eq!(vectors.len(), 2);
        for v in &vectors {
            assert_eq!(v.len(), 8);
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4);
        }
    }

    #[tokio::test]
    async fn test_native_dimensions_returns_encoder_output() {
        let (pipeline, _) = pipeline();
        let a = pipeline.embed(&["x".to_string()], None).await.unwrap();
        let b = pipeline.embed(&["x".to_string()], Some(32)).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_embedding_is_idempotent() {
        let (pipeline, _) = pipeline();
        let first = pipeline.embed(&["same".to_string()], Some(16)).await.unwrap();
        let second = pipeline.embed(&["same".to_string()], Some(16)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_without_loading() {
        let (pipeline, encoder) = pipeline();
        let err = pipeline.embed(&[], None).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(encoder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimensions_above_native_rejected() {
        let (pipeline, _) = pipeline();
        let err = pipeline
            .embed(&["x".to_string()], Some(33))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
