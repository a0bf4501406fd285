use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

/// Failure to obtain a reading. The current tick is skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned HTTP {0}")]
    Status(u16),

    #[error("malformed feed body: {0}")]
    Malformed(String),

    #[error("latest feed entry is missing '{0}'")]
    MissingField(&'static str),
}

/// Failure to load or persist the state record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// A chat command that could not be parsed.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("Commands start with `$`. Use `$help` to see available commands.")]
    NotACommand,

    #[error("Unknown command `{0}`. Use `$help` to see available commands.")]
    Unknown(String),

    #[error("Missing required argument <{0}>. Use `$help` for usage information.")]
    MissingArgument(&'static str),

    #[error("Invalid argument `{0}`. Please check your input.")]
    BadArgument(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Engine(EngineError::InvalidArgument(_)) | AppError::Command(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Fetch(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
