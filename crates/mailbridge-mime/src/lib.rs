//! # mailbridge-mime
//!
//! MIME helpers for mail that arrives through provider HTTP APIs rather
//! than raw RFC 5322 streams.
//!
//! ## Features
//!
//! - **Lenient base64**: URL-safe or standard alphabet, padded or not
//! - **Content types and headers**: parsing and case-insensitive lookup
//! - **Message generation**: multipart/mixed HTML messages with attachments
//! - **Inline images**: `cid:` rewriting to data URIs or retrieval URLs
//!
//! ## Quick Start
//!
//! ### Building an outgoing message
//!
//! ```ignore
//! use mailbridge_mime::{MessageBuilder, OutgoingAttachment};
//! use mailbridge_mime::encoding::encode_base64_url;
//!
//! let raw = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .to(["recipient@example.com"])
//!     .subject("Report")
//!     .html_body("<p>Attached.</p>")
//!     .attach(OutgoingAttachment::new("r.pdf", "application/pdf", bytes))
//!     .build()?;
//!
//! let gmail_raw = encode_base64_url(raw.as_bytes());
//! ```
//!
//! ### Resolving inline images
//!
//! ```ignore
//! use mailbridge_mime::inline::{data_uri, replace_cid, replace_dangling_cids};
//!
//! let html = replace_cid(&html, "<logo@corp>", &data_uri("image/png", &b64));
//! let html = replace_dangling_cids(&html);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod builder;
mod content_type;
mod error;
mod header;

pub mod encoding;
pub mod inline;

pub use builder::{MessageBuilder, OutgoingAttachment};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
