//! Embedserve - embedding and reranking microservice
//!
//! This library exposes the core components of the service: the model
//! lifecycle, the embedding pipeline with Matryoshka reduction, the
//! cosine-similarity reranker and the HTTP surface, so integration tests can
//! drive them with a fake encoder.

pub mod config;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod lifecycle;
pub mod middleware;
pub mod pipeline;
pub mod prefix;
pub mod router;
pub mod state;
pub mod transport;

// Re-export key types for convenience
pub use config::Config;
pub use error::{AppError, Result};
pub use inference::{EncoderLoader, OnnxLoader, TextEncoder};
pub use lifecycle::{ModelLifecycle, ReadinessState};
pub use pipeline::{EmbeddingPipeline, RankedIndex, Reranker};
pub use router::build_router;
pub use state::AppState;
pub use transport::{resolve_transport, TransportMode, TransportResolution};
