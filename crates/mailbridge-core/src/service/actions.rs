//! Per-message actions on one linked account.
//!
//! Every action checks ownership and token validity first. `Ok(false)`
//! covers a missing or foreign account, an unusable token, a provider
//! failure or an unexpected status; `Err` is reserved for store failures
//! and invalid input.

use mailbridge_oauth::ProviderKind;
use tracing::{info, warn};

use super::MailService;
use crate::account::{AccountId, AccountStore, LinkedAccount, UserId};
use crate::provider::OutgoingMessage;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy)]
enum Action {
    Trash,
    Restore,
    Delete,
}

impl Action {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Trash => "trash",
            Self::Restore => "restore",
            Self::Delete => "delete",
        }
    }
}

impl<S: AccountStore> MailService<S> {
    /// Send `message` from `account_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] without recipients, or the store error.
    pub async fn send_email(
        &self,
        user: UserId,
        account_id: AccountId,
        message: &OutgoingMessage,
    ) -> Result<bool> {
        if message.to.iter().all(|to| to.trim().is_empty()) {
            return Err(Error::InvalidInput("at least one recipient is required".into()));
        }
        let Some(account) = self.usable_account(user, account_id).await? else {
            return Ok(false);
        };
        let result = match account.provider {
            ProviderKind::Gmail => self.gmail.send(&account, message).await,
            ProviderKind::Outlook => self.outlook.send(&account, message).await,
        };
        Ok(settle("send", &account, result))
    }

    /// Move a message to the trash.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn trash_message(&self, user: UserId, account_id: AccountId, message_id: &str) -> Result<bool> {
        self.message_action(user, account_id, message_id, Action::Trash).await
    }

    /// Move a trashed message back to the inbox.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn restore_message(&self, user: UserId, account_id: AccountId, message_id: &str) -> Result<bool> {
        self.message_action(user, account_id, message_id, Action::Restore).await
    }

    /// Delete a message for good.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn delete_permanently(&self, user: UserId, account_id: AccountId, message_id: &str) -> Result<bool> {
        self.message_action(user, account_id, message_id, Action::Delete).await
    }

    async fn message_action(
        &self,
        user: UserId,
        account_id: AccountId,
        message_id: &str,
        action: Action,
    ) -> Result<bool> {
        if message_id.trim().is_empty() {
            return Err(Error::InvalidInput("message id is empty".into()));
        }
        let Some(account) = self.usable_account(user, account_id).await? else {
            return Ok(false);
        };
        let result = match (account.provider, action) {
            (ProviderKind::Gmail, Action::Trash) => self.gmail.trash(&account, message_id).await,
            (ProviderKind::Gmail, Action::Restore) => self.gmail.restore(&account, message_id).await,
            (ProviderKind::Gmail, Action::Delete) => self.gmail.delete(&account, message_id).await,
            (ProviderKind::Outlook, Action::Trash) => self.outlook.trash(&account, message_id).await,
            (ProviderKind::Outlook, Action::Restore) => self.outlook.restore(&account, message_id).await,
            (ProviderKind::Outlook, Action::Delete) => self.outlook.delete(&account, message_id).await,
        };
        Ok(settle(action.as_str(), &account, result))
    }
}

fn settle(action: &str, account: &LinkedAccount, result: Result<bool>) -> bool {
    match result {
        Ok(true) => {
            info!(account = %account.id, action, "Mail action completed");
            true
        }
        Ok(false) => false,
        Err(e) => {
            warn!(account = %account.id, action, "Mail action failed: {e}");
            false
        }
    }
}
