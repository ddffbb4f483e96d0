use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
#[allow(clippy::enum_variant_names)]
pub enum AppError {
    #[error("Model inference failed: {0}")]
    ModelError(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Server misconfigured: {0}")]
    ConfigurationError(String),

    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Service temporarily unavailable: {0}")]
    ResourceError(String),

    #[error("Tokenization failed: {0}")]
    TokenizationError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
    code: u16,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::ConfigurationError(_)
            | AppError::ModelError(_)
            | AppError::TokenizationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InitializationError(_) | AppError::ResourceError(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// The message carried by the variant, without the variant's prefix.
    pub fn detail(&self) -> &str {
        match self {
            AppError::ModelError(msg)
            | AppError::ValidationError(msg)
            | AppError::AuthenticationError(msg)
            | AppError::ConfigurationError(msg)
            | AppError::InitializationError(msg)
            | AppError::ResourceError(msg)
            | AppError::TokenizationError(msg) => msg,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "invalid_request_error",
            AppError::AuthenticationError(_) => "authentication_error",
            AppError::ResourceError(_) | AppError::InitializationError(_) => {
                "service_unavailable"
            }
            _ => "server_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Server-side failures get a fixed message; the detail only goes to the log.
        let message = match &self {
            AppError::ModelError(e) => {
                tracing::error!(error = %e, "Model inference error");
                "Embedding inference failed".to_string()
            }
            AppError::ValidationError(msg) => {
                tracing::warn!(error = %msg, "Validation error");
                msg.clone()
            }
            AppError::AuthenticationError(msg) => {
                tracing::warn!(error = %msg, "Authentication error");
                msg.clone()
            }
            AppError::ConfigurationError(msg) => {
                tracing::error!(error = %msg, "Configuration error");
                "Server authentication is not configured".to_string()
            }
            AppError::InitializationError(msg) => {
                tracing::error!(error = %msg, "Model initialization error");
                "Model is not available".to_string()
            }
            AppError::ResourceError(msg) => {
                tracing::warn!(error = %msg, "Resource error");
                msg.clone()
            }
            AppError::TokenizationError(msg) => {
                tracing::error!(error = %msg, "Tokenization error");
                "Tokenization failed".to_string()
            }
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message,
                kind: self.kind(),
                code: status.as_u16(),
            },
        });

        (status, body).into_response()
    }
}

impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        AppError::ModelError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
