pub mod embeddings;
pub mod extract;
pub mod health;
pub mod rerank;

pub use embeddings::{embed_handler, embeddings_handler};
pub use extract::ValidJson;
pub use health::{health_handler, models_handler, ready_handler};
pub use rerank::rerank_handler;
