use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::compiler::CompileError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// The resource exists but belongs to another user.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Compilation error: {0}")]
    Compile(#[from] CompileError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short, categorized reason recorded on a failed generation job.
    /// Never includes raw toolchain output or backtraces.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(msg) => format!("Not found: {msg}"),
            AppError::Forbidden(_) => "Access denied to a requested resource".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Database(_) | AppError::Redis(_) => {
                "A storage error occurred while generating the resume".to_string()
            }
            AppError::Llm(_) => "The AI service is currently unavailable".to_string(),
            AppError::Compile(e) => e.user_message(),
            AppError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// Whether a fresh attempt of the same job could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NotFound(_) | AppError::Forbidden(_) | AppError::Validation(_) => false,
            AppError::Compile(e) => e.is_transient(),
            _ => true,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "QUEUE_ERROR",
                    "A job queue error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Compile(e) => {
                tracing::error!("Compile error: {e}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "COMPILE_ERROR",
                    e.user_message(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileFailure;

    #[test]
    fn test_not_found_and_forbidden_are_not_retryable() {
        assert!(!AppError::NotFound("job".to_string()).is_retryable());
        assert!(!AppError::Forbidden("job".to_string()).is_retryable());
        assert!(AppError::Llm("503".to_string()).is_retryable());
    }

    #[test]
    fn test_compile_timeout_message_is_distinct() {
        let timeout = AppError::Compile(CompileError::Timeout { seconds: 30 });
        let content = AppError::Compile(CompileError::Failed {
            failure: CompileFailure::MathMode,
            log: "! Missing $ inserted.".to_string(),
        });
        assert!(timeout.user_message().contains("timed out"));
        assert_ne!(timeout.user_message(), content.user_message());
        assert!(timeout.is_retryable());
        assert!(!content.is_retryable());
    }

    #[test]
    fn test_user_message_never_leaks_internal_detail() {
        let err = AppError::Internal(anyhow::anyhow!("panicked at src/lib.rs:42"));
        assert!(!err.user_message().contains("src/lib.rs"));
    }
}
