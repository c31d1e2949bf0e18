//! Linking and unlinking mailboxes.

use mailbridge_oauth::ProviderKind;
use serde::Deserialize;
use tracing::info;
use url::Url;

use super::MailService;
use crate::account::{AccountId, AccountStore, Credentials, LinkedAccount, NewAccount, UserId};
use crate::{Error, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GoogleUserInfo {
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GraphUser {
    mail: Option<String>,
    user_principal_name: Option<String>,
}

impl<S: AccountStore> MailService<S> {
    /// Consent URL for linking a mailbox; `state` is echoed on the redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built.
    pub fn authorization_url(&self, provider: ProviderKind, state: &str) -> Result<Url> {
        Ok(self
            .tokens
            .code_flow(provider)
            .authorization_url(None, Some(state))?)
    }

    /// Finish the OAuth callback: exchange `code`, learn the mailbox address
    /// and store the new account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountExists`] if `user` already linked the address,
    /// or the exchange, lookup or store error.
    pub async fn link_account(
        &self,
        user: UserId,
        provider: ProviderKind,
        code: &str,
    ) -> Result<LinkedAccount> {
        let token = self.tokens.code_flow(provider).exchange_code(code, None).await?;
        let email = self.mailbox_address(provider, &token.access_token).await?;

        let account = self
            .store
            .insert_account(NewAccount {
                user_id: user,
                email,
                provider,
                credentials: Credentials::from_token(token),
            })
            .await?;
        info!(%user, account = %account.id, %provider, "Linked mailbox");
        Ok(account)
    }

    async fn mailbox_address(&self, provider: ProviderKind, access_token: &str) -> Result<String> {
        let address = match provider {
            ProviderKind::Gmail => {
                let info: GoogleUserInfo = self
                    .http
                    .json(self.http.get(&self.endpoints.google_userinfo, access_token))
                    .await?;
                info.email
            }
            ProviderKind::Outlook => {
                let me: GraphUser = self
                    .http
                    .json(self.http.get(&self.endpoints.graph_api, access_token))
                    .await?;
                me.mail
                    .filter(|m| !m.trim().is_empty())
                    .or(me.user_principal_name)
            }
        };
        address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::InvalidInput(format!("{provider} returned no mailbox address")))
    }

    /// Accounts linked by `user`, newest first.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn list_accounts(&self, user: UserId) -> Result<Vec<LinkedAccount>> {
        self.store.accounts_for_user(user).await
    }

    /// Unlink an account. Only the owner can; returns whether it was removed.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn delete_account(&self, user: UserId, account_id: AccountId) -> Result<bool> {
        let removed = self.store.delete_account(user, account_id).await?;
        if removed {
            info!(%user, account = %account_id, "Unlinked mailbox");
        }
        Ok(removed)
    }
}
