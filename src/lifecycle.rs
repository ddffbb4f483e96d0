//! One-time model initialization shared by every request.
//!
//! [`ModelLifecycle`] owns the encoder handle. The first `ensure_ready` call
//! starts a detached task that runs the loader on the blocking pool; callers
//! arriving meanwhile, including ones after the first caller gave up, wait on
//! the same attempt. The outcome, success or failure, is cached for the life
//! of the process.

use crate::error::{AppError, Result};
use crate::inference::{EncoderLoader, TextEncoder};
use crate::prefix::{with_prefix, TextRole};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadinessState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Failed = 3,
}

impl ReadinessState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Initializing,
            2 => Self::Ready,
            3 => Self::Failed,
            _ => Self::Uninitialized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type LoadOutcome = std::result::Result<Arc<dyn TextEncoder>, AppError>;

pub struct ModelLifecycle {
    loader: Arc<dyn EncoderLoader>,
    outcome: Arc<OnceCell<LoadOutcome>>,
    state: Arc<AtomicU8>,
}

impl ModelLifecycle {
    pub fn new(loader: Arc<dyn EncoderLoader>) -> Self {
        Self {
            loader,
            outcome: Arc::new(OnceCell::new()),
            state: Arc::new(AtomicU8::new(ReadinessState::Uninitialized as u8)),
        }
    }

    /// Load the model if nobody has yet, and return the shared handle.
    ///
    /// A failed load is terminal: every later call returns the same error.
    /// The attempt runs on its own task, so dropping a waiting caller never
    /// abandons or restarts it.
    pub async fn ensure_ready(&self) -> Result<Arc<dyn TextEncoder>> {
        if let Some(outcome) = self.outcome.get() {
            return outcome.clone();
        }

        let outcome = Arc::clone(&self.outcome);
        let loader = Arc::clone(&self.loader);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let result = outcome.get_or_init(|| load(loader, state)).await.clone();
            result
        })
        .await
        .map_err(|e| AppError::InitializationError(format!("Model loading task failed: {}", e)))?
    }

    pub fn state(&self) -> ReadinessState {
        ReadinessState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ReadinessState::Ready
    }
}

async fn load(loader: Arc<dyn EncoderLoader>, state: Arc<AtomicU8>) -> LoadOutcome {
    state.store(ReadinessState::Initializing as u8, Ordering::SeqCst);
    tracing::info!("Loading embedding model");

    let start = Instant::now();

    let result = tokio::task::spawn_blocking(move || {
        let encoder = loader.load()?;
        warmup(encoder.as_ref())?;
        Ok::<_, AppError>(encoder)
    })
    .await
    .map_err(|e| AppError::InitializationError(format!("Model loading task failed: {}", e)))
    .and_then(|inner| inner.map_err(|e| AppError::InitializationError(e.detail().to_string())));

    match &result {
        Ok(encoder) => {
            state.store(ReadinessState::Ready as u8, Ordering::SeqCst);
            tracing::info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                dimension = encoder.dimension(),
                "Embedding model ready"
            );
        }
        Err(e) => {
            state.store(ReadinessState::Failed as u8, Ordering::SeqCst);
            tracing::error!(
                error = %e,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Embedding model failed to load"
            );
        }
    }

    result
}

/// Run one tiny inference so the first real request doesn't suffer
/// ONNX Runtime's lazy initialization.
fn warmup(encoder: &dyn TextEncoder) -> Result<()> {
    let texts = vec![with_prefix(TextRole::Document, "warmup")];
    let output = encoder.encode(&texts)?;

    if output.nrows() != 1 || output.ncols() != encoder.dimension() {
        return Err(AppError::ModelError(format!(
            "Warmup produced shape {:?}, expected [1, {}]",
            output.dim(),
            encoder.dimension()
        )));
    }

    tracing::debug!("Model warmup completed successfully");
    Ok(())
}
