//! Cross-provider inbox aggregation and folder listings.

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, error, warn};

use super::MailService;
use super::cursor::{PageCursor, merged_page};
use crate::account::{AccountId, AccountStore, LinkedAccount, UserId};
use crate::message::{NormalizedMessage, sort_newest_first};
use crate::provider::Mailbox;

/// Smallest per-account window pulled for an all-accounts page.
pub const MIN_MERGE_WINDOW: usize = 100;

/// Largest per-account window pulled for any merged listing.
pub const MAX_MERGE_WINDOW: usize = 2000;

/// Over-fetch factor for all-accounts pages.
const OVERFETCH: usize = 3;

/// One inbox page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxPage {
    /// Messages on this page, newest first.
    pub messages: Vec<NormalizedMessage>,
    /// Cursor for the following page.
    pub next_page_token: Option<String>,
    /// Estimated size of the listing.
    pub total_count: u64,
    /// One-based page number.
    pub current_page: usize,
}

impl InboxPage {
    /// An empty first page.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            messages: Vec::new(),
            next_page_token: None,
            total_count: 0,
            current_page: 1,
        }
    }
}

/// One slice of a merged folder listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderPage {
    /// Messages in the slice, newest first.
    pub messages: Vec<NormalizedMessage>,
    /// Number of messages merged before slicing.
    pub total_count: u64,
    /// Requested slice length.
    pub limit: usize,
    /// Requested slice start.
    pub offset: usize,
}

impl<S: AccountStore> MailService<S> {
    /// Fetch one inbox page.
    ///
    /// With `account_id`, the page comes straight from that account and
    /// `page_token` must be a cursor issued for it; a cursor for another
    /// account restarts at page 1. Without `account_id`, every linked
    /// account is fetched concurrently, merged newest first and sliced;
    /// `page_token` is then a page number.
    ///
    /// Never fails: unreachable accounts contribute nothing, and a failure
    /// to list the user's accounts yields an empty page.
    pub async fn get_inbox(
        &self,
        user: UserId,
        account_id: Option<AccountId>,
        page_token: Option<&str>,
        page_size: usize,
    ) -> InboxPage {
        let page_size = page_size.max(1);
        match account_id {
            Some(id) => self.account_inbox(user, id, page_token, page_size).await,
            None => self.merged_inbox(user, page_token, page_size).await,
        }
    }

    async fn account_inbox(
        &self,
        user: UserId,
        id: AccountId,
        page_token: Option<&str>,
        page_size: usize,
    ) -> InboxPage {
        let cursor = page_token
            .and_then(PageCursor::decode)
            .filter(|c| c.account_id == id);
        if page_token.is_some() && cursor.is_none() {
            debug!(account = %id, "Ignoring cursor issued for another scope");
        }
        let (provider_token, page) = cursor.map_or((None, 1), |c| (Some(c.provider_token), c.page));

        let account = match self.usable_account(user, id).await {
            Ok(Some(account)) => account,
            Ok(None) => return InboxPage::empty(),
            Err(e) => {
                error!(%user, account = %id, "Failed to load account: {e}");
                return InboxPage::empty();
            }
        };

        match self
            .fetch_page(&account, Mailbox::Inbox, provider_token.as_deref(), page_size)
            .await
        {
            Ok(result) => InboxPage {
                messages: result.messages,
                next_page_token: result
                    .next_page_token
                    .map(|token| PageCursor::new(id, token, page + 1).encode()),
                total_count: result.total_estimate,
                current_page: page,
            },
            Err(e) => {
                warn!(account = %id, "Inbox fetch failed: {e}");
                InboxPage {
                    current_page: page,
                    ..InboxPage::empty()
                }
            }
        }
    }

    async fn merged_inbox(&self, user: UserId, page_token: Option<&str>, page_size: usize) -> InboxPage {
        let page = merged_page(page_token);
        let accounts = match self.store.accounts_for_user(user).await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(%user, "Failed to list accounts: {e}");
                return InboxPage::empty();
            }
        };

        // Later pages need a deeper window to stay reachable.
        let window = page_size
            .saturating_mul(OVERFETCH)
            .max(MIN_MERGE_WINDOW)
            .max(page.saturating_mul(page_size).min(MAX_MERGE_WINDOW));
        let (merged, estimate) = self.merge(accounts, Mailbox::Inbox, window).await;

        let fetched = merged.len();
        let fetched_count = u64::try_from(fetched).unwrap_or(u64::MAX);
        let total_count = estimate.max(fetched_count);
        let start = (page - 1).saturating_mul(page_size);
        let end = start.saturating_add(page_size);
        let has_more = end < fetched || (start < fetched && fetched_count < total_count);

        InboxPage {
            messages: merged.into_iter().skip(start).take(page_size).collect(),
            next_page_token: has_more.then(|| (page + 1).to_string()),
            total_count,
            current_page: page,
        }
    }

    /// List `mailbox` across every linked account, merged newest first and
    /// sliced to `[offset, offset + limit)`.
    ///
    /// Never fails; see [`MailService::get_inbox`].
    pub async fn list_folder(
        &self,
        user: UserId,
        mailbox: Mailbox,
        limit: usize,
        offset: usize,
    ) -> FolderPage {
        let limit = limit.max(1);
        let empty = FolderPage {
            messages: Vec::new(),
            total_count: 0,
            limit,
            offset,
        };
        let accounts = match self.store.accounts_for_user(user).await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(%user, "Failed to list accounts: {e}");
                return empty;
            }
        };

        let window = offset.saturating_add(limit).min(MAX_MERGE_WINDOW);
        let (merged, _) = self.merge(accounts, mailbox, window).await;
        FolderPage {
            total_count: u64::try_from(merged.len()).unwrap_or(u64::MAX),
            messages: merged.into_iter().skip(offset).take(limit).collect(),
            ..empty
        }
    }

    /// Collect up to `window` messages from every account concurrently and
    /// sort the union. Returns the merged list and the summed estimates.
    async fn merge(
        &self,
        accounts: Vec<LinkedAccount>,
        mailbox: Mailbox,
        window: usize,
    ) -> (Vec<NormalizedMessage>, u64) {
        let results = join_all(
            accounts
                .into_iter()
                .map(|account| self.collect(account, mailbox, window)),
        )
        .await;

        let mut estimate: u64 = 0;
        let mut merged = Vec::new();
        for (messages, account_estimate) in results {
            estimate = estimate.saturating_add(account_estimate);
            merged.extend(messages);
        }
        sort_newest_first(&mut merged);
        (merged, estimate)
    }

    /// Follow one account's continuation tokens until `target` messages are
    /// in hand or the folder is exhausted. Pages whose messages all failed to
    /// load still advance the walk; every listing call returns at least one
    /// entry, so `target` calls bound it. Errors end the walk; whatever
    /// arrived before is kept.
    async fn collect(
        &self,
        mut account: LinkedAccount,
        mailbox: Mailbox,
        target: usize,
    ) -> (Vec<NormalizedMessage>, u64) {
        if !self.tokens.ensure_valid(&self.store, &mut account).await {
            warn!(account = %account.id, "Skipping account without a usable token");
            return (Vec::new(), 0);
        }

        let mut messages = Vec::new();
        let mut estimate = None;
        let mut token: Option<String> = None;
        let mut calls = 0;
        while messages.len() < target && calls < target {
            calls += 1;
            let remaining = target - messages.len();
            let page = match self
                .fetch_page(&account, mailbox, token.as_deref(), remaining)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(account = %account.id, %mailbox, "Fetch failed: {e}");
                    break;
                }
            };
            estimate.get_or_insert(page.total_estimate);
            messages.extend(page.messages);
            match page.next_page_token {
                Some(next) if page.listed > 0 => token = Some(next),
                _ => break,
            }
        }
        messages.truncate(target);
        debug!(account = %account.id, %mailbox, count = messages.len(), "Collected messages");
        (messages, estimate.unwrap_or(0))
    }
}
