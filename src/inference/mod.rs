pub mod encoder;
pub mod model;
pub mod tokenize;

pub use encoder::{EncoderLoader, OnnxLoader, OnnxTextEncoder, TextEncoder};
pub use model::EmbeddingModel;
pub use tokenize::TokenizerWrapper;
