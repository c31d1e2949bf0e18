//! Linked mailbox accounts.
//!
//! Provides the account model, the storage seam used by the token lifecycle
//! and the `SQLite` repository behind it.

mod model;
mod repository;
mod store;

pub use model::{AccountId, Credentials, LinkedAccount, NewAccount, UserId};
pub use repository::AccountRepository;
pub use store::AccountStore;
