use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Ollama(#[from] OllamaError),

    #[error("Unknown tool requested by model: {name}")]
    UnknownTool { name: String },

    #[error("Model reply contained neither text nor tool calls")]
    EmptyModelReply,

    #[error("Turn failed: {message}")]
    TurnAborted { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error")]
    Io(#[source] std::io::Error),
}

/// Ollama client errors
#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("Connection failed to Ollama at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    #[error("Generation failed (status {status}): {message}")]
    Generation { status: u16, message: String },

    #[error("Invalid response from Ollama")]
    InvalidResponse {
        #[source]
        source: serde_json::Error,
    },

    #[error("Generation timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Product catalog loading errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to open catalog {path}")]
    Open {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to parse catalog row {line}")]
    Parse {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("Catalog {path} has no product_id column")]
    MissingIdColumn { path: String },
}

/// API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Ollama(OllamaError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Ollama(_)
            | ServiceError::UnknownTool { .. }
            | ServiceError::EmptyModelReply => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Ollama(OllamaError::Connection { .. }) => "ollama_connection",
            ServiceError::Ollama(OllamaError::ModelNotFound { .. }) => "ollama_model_not_found",
            ServiceError::Ollama(OllamaError::Generation { .. }) => "ollama_generation",
            ServiceError::Ollama(OllamaError::InvalidResponse { .. }) => "ollama_invalid_response",
            ServiceError::Ollama(OllamaError::Timeout { .. }) => "ollama_timeout",
            ServiceError::UnknownTool { .. } => "unknown_tool",
            ServiceError::EmptyModelReply => "empty_model_reply",
            ServiceError::TurnAborted { .. } => "turn_aborted",
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Io(_) => "io_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %format_error_chain(&self), "Request failed");
        }

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(self.error_code().to_string()),
        };

        (status, Json(response)).into_response()
    }
}

/// Render an error together with its `source()` chain on one line
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
