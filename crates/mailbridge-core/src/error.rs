//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `OAuth2` exchange or refresh failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] mailbridge_oauth::Error),

    /// Message construction failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailbridge_mime::Error),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// The user already linked this mailbox.
    #[error("Account already linked: {0}")]
    AccountExists(String),

    /// Provider answered with an unexpected status.
    #[error("Provider returned {status}: {body}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied something unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
