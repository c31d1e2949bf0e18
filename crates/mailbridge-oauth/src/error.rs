//! Token endpoint errors.

/// Result alias for token operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from building OAuth requests or talking to a token endpoint.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure reaching the token endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider refused the grant (`invalid_grant`, `invalid_client`, ...).
    #[error("token endpoint rejected the grant: {code} - {description}")]
    Rejected {
        /// `error` field of the response.
        code: String,
        /// `error_description` field, empty if absent.
        description: String,
    },

    /// A refresh was requested for a token without a refresh token.
    #[error("no refresh token on record")]
    MissingRefreshToken,

    /// Non-JSON error body, or a success body without a usable token.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Provider setup is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Endpoint URL did not parse.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}
