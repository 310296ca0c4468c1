// src/error/types.rs
use crate::domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resource not found")]
    NotFound,

    #[error("Upstream API error: {0}")]
    Api(String),

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        AppError::Pool(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Api(err.to_string())
    }
}

impl AppError {
    /// Whether the failure means the API was reachable but broke its
    /// contract, as opposed to not being reachable at all.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, AppError::MalformedResponse(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;
