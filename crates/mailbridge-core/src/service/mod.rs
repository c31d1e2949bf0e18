//! Mail service: linked accounts, cross-provider inbox and mail actions.
//!
//! [`MailService`] owns the HTTP client, the token manager and both
//! provider adapters, and reaches persistence through an [`AccountStore`].
//! Per-account failures are logged and isolated; they never fail a whole
//! listing.

mod actions;
pub mod cursor;
mod inbox;
mod linking;

use mailbridge_oauth::ProviderKind;
use tracing::warn;

pub use cursor::PageCursor;
pub use inbox::{FolderPage, InboxPage};

use crate::Result;
use crate::account::{AccountId, AccountStore, LinkedAccount, UserId};
use crate::auth::TokenManager;
use crate::config::{Config, Endpoints};
use crate::http::HttpClient;
use crate::provider::{GmailClient, Mailbox, OutlookClient, ProviderPage};

/// Entry point for every mail operation.
pub struct MailService<S> {
    store: S,
    tokens: TokenManager,
    gmail: GmailClient,
    outlook: OutlookClient,
    http: HttpClient,
    endpoints: Endpoints,
}

impl<S: AccountStore> MailService<S> {
    /// Build the service and its HTTP client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or an endpoint
    /// is invalid.
    pub fn new(config: &Config, store: S) -> Result<Self> {
        let http = HttpClient::new(config)?;
        Self::with_http(config, store, http)
    }

    /// Build the service around an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured token endpoint is invalid.
    pub fn with_http(config: &Config, store: S, http: HttpClient) -> Result<Self> {
        Ok(Self {
            tokens: TokenManager::from_config(config, &http)?,
            gmail: GmailClient::new(http.clone(), config),
            outlook: OutlookClient::new(http.clone(), config),
            store,
            http,
            endpoints: config.endpoints.clone(),
        })
    }

    /// The account store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The token manager.
    #[must_use]
    pub const fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    async fn fetch_page(
        &self,
        account: &LinkedAccount,
        mailbox: Mailbox,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<ProviderPage> {
        match account.provider {
            ProviderKind::Gmail => self.gmail.list(account, mailbox, page_token, page_size).await,
            ProviderKind::Outlook => {
                self.outlook
                    .list(account, mailbox, page_token, page_size)
                    .await
            }
        }
    }

    /// Look up `id`, check that `user` owns it and make its token usable.
    async fn usable_account(&self, user: UserId, id: AccountId) -> Result<Option<LinkedAccount>> {
        let Some(mut account) = self.store.account(id).await?.filter(|a| a.user_id == user) else {
            warn!(%user, account = %id, "Account not found for user");
            return Ok(None);
        };
        if !self.tokens.ensure_valid(&self.store, &mut account).await {
            return Ok(None);
        }
        Ok(Some(account))
    }
}
