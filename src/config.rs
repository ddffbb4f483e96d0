use std::env;
use std::path::PathBuf;

/// Operating mode for the embedding server.
/// Controls pool_size, permits, and intra_threads settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Optimized for single requests with low latency.
    /// pool_size=1, permits=1, intra_threads=8
    Single,
    /// Optimized for concurrent requests with high throughput.
    /// pool_size=4, permits=4, intra_threads=2
    Concurrent,
    /// Use individual environment variable settings.
    Custom,
}

impl OperatingMode {
    pub fn from_env() -> Self {
        Self::parse(&env::var("EMBEDSERVE_MODE").unwrap_or_default())
    }

    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "single" | "low-latency" | "single-request" => Self::Single,
            "concurrent" | "high-throughput" | "multi" => Self::Concurrent,
            _ => Self::Custom,
        }
    }
}

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    /// Model id clients must send in `/v1/embeddings` requests.
    pub model_id: String,
    pub model_owner: String,
    /// Unix timestamp reported in the model descriptor.
    pub model_created: i64,
    /// Native embedding dimensionality of the model.
    pub embedding_dim: usize,
    pub max_sequence_length: usize,
    /// Maximum inputs per embeddings request.
    pub max_inputs: usize,
    /// Maximum documents per rerank request.
    pub max_documents: usize,
    /// Shared secret for the `Authorization` header. Unset means every
    /// authenticated route answers 500.
    pub api_key: Option<String>,
    pub use_https: bool,
    pub ssl_cert_path: PathBuf,
    pub ssl_key_path: PathBuf,
    pub mode: OperatingMode,
    /// Optional override for session pool size. If None, uses physical cores.
    pub pool_size: Option<usize>,
    /// Number of threads per ONNX session for intra-op parallelism.
    pub intra_threads: usize,
    /// Optional override for semaphore permits. If None, matches the pool size.
    pub permits: Option<usize>,
    /// Seconds to wait for an inference permit before answering 503.
    pub permit_timeout_secs: u64,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            model_path: PathBuf::from("./models/model.onnx"),
            tokenizer_path: PathBuf::from("./models/tokenizer.json"),
            model_id: "nomic-embed-text-v1.5".to_string(),
            model_owner: "nomic-ai".to_string(),
            model_created: 1_708_041_600,
            embedding_dim: 768,
            max_sequence_length: 512,
            max_inputs: 2048,
            max_documents: 1000,
            api_key: None,
            use_https: false,
            ssl_cert_path: PathBuf::from("./certs/cert.pem"),
            ssl_key_path: PathBuf::from("./certs/key.pem"),
            mode: OperatingMode::Custom,
            pool_size: None,
            intra_threads: 4,
            permits: None,
            permit_timeout_secs: 5,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// The `EMBEDSERVE_MODE` environment variable controls preset configurations:
    /// - `single` / `low-latency`: one session using all intra-op threads
    /// - `concurrent` / `high-throughput`: several sessions with fewer threads each
    /// - Unset or other: Uses individual env vars or defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let mode = OperatingMode::from_env();

        let (pool_size, permits, intra_threads) = match mode {
            OperatingMode::Single => (Some(1), Some(1), 8),
            OperatingMode::Concurrent => (Some(4), Some(4), 2),
            OperatingMode::Custom => {
                let pool = env::var("POOL_SIZE").ok().and_then(|s| s.parse().ok());
                let perm = env::var("PERMITS").ok().and_then(|s| s.parse().ok());
                let threads = env::var("INTRA_THREADS")
                    .unwrap_or_else(|_| defaults.intra_threads.to_string())
                    .parse()?;
                (pool, perm, threads)
            }
        };

        let embedding_dim: usize = env::var("EMBEDDING_DIM")
            .unwrap_or_else(|_| defaults.embedding_dim.to_string())
            .parse()?;
        if embedding_dim == 0 {
            anyhow::bail!("EMBEDDING_DIM must be at least 1");
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()?,
            model_path: env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            tokenizer_path: env::var("TOKENIZER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.tokenizer_path),
            model_id: env::var("MODEL_ID").unwrap_or(defaults.model_id),
            model_owner: env::var("MODEL_OWNER").unwrap_or(defaults.model_owner),
            model_created: env::var("MODEL_CREATED")
                .unwrap_or_else(|_| defaults.model_created.to_string())
                .parse()?,
            embedding_dim,
            max_sequence_length: env::var("MAX_SEQ_LENGTH")
                .unwrap_or_else(|_| defaults.max_sequence_length.to_string())
                .parse()?,
            max_inputs: env::var("MAX_INPUTS")
                .unwrap_or_else(|_| defaults.max_inputs.to_string())
                .parse()?,
            max_documents: env::var("MAX_DOCUMENTS")
                .unwrap_or_else(|_| defaults.max_documents.to_string())
                .parse()?,
            api_key: env::var("API_KEY").ok().filter(|key| !key.is_empty()),
            use_https: parse_flag(&env::var("USE_HTTPS").unwrap_or_default()),
            ssl_cert_path: env::var("SSL_CERT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ssl_cert_path),
            ssl_key_path: env::var("SSL_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ssl_key_path),
            mode,
            pool_size,
            intra_threads,
            permits,
            permit_timeout_secs: env::var("PERMIT_TIMEOUT")
                .unwrap_or_else(|_| defaults.permit_timeout_secs.to_string())
                .parse()?,
            log_format: match env::var("LOG_FORMAT").unwrap_or_default().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            },
        })
    }

    /// Session pool size: the configured value, or one per available core.
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// Concurrent inference permits; defaults to the pool size so every
    /// permit holder finds a free session.
    pub fn effective_permits(&self) -> usize {
        self.permits
            .unwrap_or_else(|| self.effective_pool_size())
            .max(1)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
