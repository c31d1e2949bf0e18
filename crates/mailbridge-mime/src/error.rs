//! Errors from decoding provider payloads and building outgoing messages.

use std::string::FromUtf8Error;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `Content-Type` value without a `type/subtype`.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Malformed quoted-printable or encoded-word.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Payload was not base64 in either alphabet.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Decoded body was not UTF-8.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// A header value would break out of its line.
    #[error("Invalid header value for {0}")]
    InvalidHeader(String),

    /// An outgoing message lacks a sender or recipient.
    #[error("Missing required header: {0}")]
    MissingHeader(String),
}
