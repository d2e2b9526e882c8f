//! Error handling utilities for the crate
use thiserror::Error;

use reqwest::Error as ReqwestError;

/// All errors raised by this crate will be instances of CactusError
#[derive(Error, Debug)]
pub enum CactusError {
    #[error("Not signed in. Sign in with a valid credential before uploading")]
    NotAuthenticated(),
    #[error("Login failed: {0}")]
    LoginFailed(String),
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Access denied by the upload service")]
    Forbidden(),
    #[error("Storage rejected the {0} upload with status {1}")]
    TransferRejected(&'static str, u16),
    #[error("Internal HTTP error: {0}")]
    HttpError(#[from] ReqwestError),
    #[error("Unexpected response from the upload service ({0}): {1}")]
    UnknownError(u16, String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Local storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CactusError {
    pub fn unknown_error(status_code: reqwest::StatusCode) -> Self {
        CactusError::UnknownError(
            status_code.as_u16(),
            status_code
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
        )
    }

    pub fn required(field_name: &str) -> Self {
        CactusError::InvalidInput(format!("{} is required", field_name))
    }
}

pub type Result<T> = std::result::Result<T, CactusError>;
