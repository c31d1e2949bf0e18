//! Persistence seam for linked accounts.

use std::future::Future;

use super::model::{AccountId, Credentials, LinkedAccount, NewAccount, UserId};
use crate::Result;

/// Durable storage of linked accounts.
///
/// Credential updates replace all three credential fields of one row at
/// once, so concurrent refreshes of the same account are last-writer-wins.
pub trait AccountStore: Send + Sync {
    /// Accounts owned by `user`, newest first.
    fn accounts_for_user(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<LinkedAccount>>> + Send;

    /// One account by id.
    fn account(&self, id: AccountId) -> impl Future<Output = Result<Option<LinkedAccount>>> + Send;

    /// Overwrite the credential fields of `id`.
    fn update_credentials(
        &self,
        id: AccountId,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Insert a new account.
    ///
    /// Fails with [`crate::Error::AccountExists`] when the user already
    /// linked the same address.
    fn insert_account(
        &self,
        account: NewAccount,
    ) -> impl Future<Output = Result<LinkedAccount>> + Send;

    /// Remove `id` if `user` owns it. Returns whether a row was deleted.
    fn delete_account(
        &self,
        user: UserId,
        id: AccountId,
    ) -> impl Future<Output = Result<bool>> + Send;
}
