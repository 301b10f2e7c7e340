//! Error types for gigboard-core

use thiserror::Error;

/// Main error type for the gigboard-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected by the gateway; the message is surfaced verbatim
    #[error("{0}")]
    Validation(String),

    /// Expected record absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Blob upload failure
    #[error("upload error: {0}")]
    Upload(String),

    /// Remote read failure
    #[error("read error: {0}")]
    Read(String),

    /// Remote write failure
    #[error("write error: {0}")]
    Write(String),

    /// Booking status change that the transition table forbids
    #[error("invalid transition: {current} -> {requested}")]
    InvalidTransition { current: String, requested: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gigboard-core
pub type Result<T> = std::result::Result<T, Error>;
