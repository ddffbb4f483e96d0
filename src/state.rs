use crate::config::Config;
use crate::inference::EncoderLoader;
use crate::lifecycle::{ModelLifecycle, ReadinessState};
use crate::pipeline::{EmbeddingPipeline, InferenceGate, Reranker};
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all request handlers.
///
/// The lifecycle manager is the only owner of the model handle; the
/// embedding pipeline and reranker reach it through their own `Arc`.
pub struct AppState {
    pub config: Arc<Config>,
    pub lifecycle: Arc<ModelLifecycle>,
    pub embedder: EmbeddingPipeline,
    pub reranker: Reranker,
}

impl AppState {
    /// Wire up the pipeline. Nothing is loaded until
    /// `lifecycle.ensure_ready()` is first awaited.
    ///
    /// # Semaphore Strategy
    /// Permits default to the session pool size, so each permit holder
    /// finds a free ONNX session.
    pub fn new(config: Config, loader: Arc<dyn EncoderLoader>) -> Self {
        let permits = config.effective_permits();
        let gate = Arc::new(InferenceGate::new(
            permits,
            Duration::from_secs(config.permit_timeout_secs),
        ));
        let lifecycle = Arc::new(ModelLifecycle::new(loader));

        tracing::info!(permits, "Inference gate configured");

        Self {
            embedder: EmbeddingPipeline::new(Arc::clone(&lifecycle), Arc::clone(&gate)),
            reranker: Reranker::new(Arc::clone(&lifecycle), gate),
            lifecycle,
            config: Arc::new(config),
        }
    }

    /// Check if the model is loaded and warmed up.
    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    pub fn readiness(&self) -> ReadinessState {
        self.lifecycle.state()
    }
}
