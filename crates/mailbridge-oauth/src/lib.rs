//! # mailbridge-oauth
//!
//! `OAuth2` plumbing for linking Gmail and Outlook mailboxes.
//!
//! ## Features
//!
//! - **Authorization Code Flow**: consent URL generation and code exchange
//! - **Token management**: refresh grants, expiry checks with a safety margin
//! - **Provider configurations**: Google (Gmail REST API) and Microsoft (Graph)
//!
//! ## Quick Start
//!
//! ### Linking a mailbox
//!
//! ```ignore
//! use mailbridge_oauth::{AuthorizationCodeFlow, OAuthClient, Provider};
//!
//! let client = OAuthClient::new("client_id", Provider::google()?)
//!     .with_client_secret("secret")
//!     .with_redirect_uri("http://localhost:8000/callback/gmail");
//!
//! let flow = AuthorizationCodeFlow::new(client);
//! let url = flow.authorization_url(None, Some("user-42"))?;
//! // ...user consents, provider redirects back with `code`...
//! let token = flow.exchange_code(code, None).await?;
//! ```
//!
//! ### Token Refresh
//!
//! ```ignore
//! if token.expires_within(chrono::Duration::minutes(30)) {
//!     let fresh = client.refresh_token(&token).await?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod flow;
pub mod provider;
pub mod token;

pub use error::{Error, Result};
pub use flow::{AuthorizationCodeFlow, OAuthClient};
pub use provider::{Provider, ProviderKind};
pub use token::Token;
