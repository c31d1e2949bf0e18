//! # mailbridge-core
//!
//! Cross-provider mail backend for linked Gmail and Outlook accounts.
//!
//! This crate provides:
//! - Linked account storage (`SQLite`)
//! - **Token lifecycle** - refresh-ahead of expiry with a safety margin
//! - **Provider adapters** - Gmail REST and Microsoft Graph listings mapped
//!   to one message shape, inline images resolved
//! - **Inbox aggregation** - concurrent fetch, newest-first merge and
//!   resumable pagination across accounts
//! - Mail actions: send, trash, restore, permanent delete

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod auth;
pub mod config;
mod error;
pub mod http;
pub mod message;
pub mod provider;
pub mod service;

pub use account::{
    AccountId, AccountRepository, AccountStore, Credentials, LinkedAccount, NewAccount, UserId,
};
pub use auth::TokenManager;
pub use config::Config;
pub use error::{Error, Result};
pub use http::{HttpClient, RetryPolicy};
pub use mailbridge_oauth::ProviderKind;
pub use message::{Attachment, BodyType, NormalizedMessage};
pub use provider::{Mailbox, OutgoingMessage};
pub use service::{FolderPage, InboxPage, MailService, PageCursor};
