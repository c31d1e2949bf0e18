//! Gmail REST API adapter.

mod model;
mod normalize;

use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use mailbridge_mime::MessageBuilder;
use mailbridge_mime::encoding::encode_base64_url;
use reqwest::StatusCode;
use tracing::{debug, warn};

use self::model::{AttachmentBody, GmailMessage, ListResponse, ModifyRequest, SendRequest};
use self::normalize::{Walk, into_message};
use super::{Mailbox, OutgoingMessage, ProviderPage};
use crate::Result;
use crate::account::LinkedAccount;
use crate::config::Config;
use crate::http::{HttpClient, api_url, decode_json, is_rate_limited};
use crate::message::NormalizedMessage;

pub use self::normalize::MAX_DEPTH;

/// Largest `maxResults` requested from the listing endpoint.
pub const MAX_PAGE_SIZE: usize = 50;

const DETAIL_FIELDS: &str = "id,labelIds,snippet,internalDate,payload";

/// Gmail client for one process; accounts are passed per call.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: HttpClient,
    base: String,
    batch_size: usize,
    batch_pause: Duration,
    history_days: i64,
}

impl GmailClient {
    /// Build from configuration.
    #[must_use]
    pub fn new(http: HttpClient, config: &Config) -> Self {
        Self {
            http,
            base: config.endpoints.gmail_api.trim_end_matches('/').to_string(),
            batch_size: config.gmail_batch_size.max(1),
            batch_pause: config.gmail_batch_pause(),
            history_days: config.history_days,
        }
    }

    /// List one page of `mailbox`.
    ///
    /// Ids come from the listing call; every message is then fetched in
    /// batches. Messages that keep answering 429 or fail to load are
    /// dropped from the page.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing call fails.
    pub async fn list(
        &self,
        account: &LinkedAccount,
        mailbox: Mailbox,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<ProviderPage> {
        let max_results = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut params = vec![
            ("maxResults", max_results.to_string()),
            ("q", self.query(mailbox)),
        ];
        if mailbox == Mailbox::Trash {
            params.push(("includeSpamTrash", "true".to_string()));
        }
        if let Some(token) = page_token.filter(|t| !t.is_empty()) {
            params.push(("pageToken", token.to_string()));
        }

        let url = api_url(&self.base, &["messages"])?;
        let response = self
            .http
            .retry()
            .run(|| {
                self.http
                    .get(url.clone(), &account.access_token)
                    .query(&params)
                    .send()
            })
            .await?;
        let listing: ListResponse = decode_json(response).await?;
        debug!(
            account = %account.id,
            %mailbox,
            ids = listing.messages.len(),
            estimate = listing.result_size_estimate,
            "Listed Gmail messages"
        );

        let ids: Vec<String> = listing.messages.into_iter().map(|m| m.id).collect();
        let messages = self.fetch_details(account, &ids).await;

        Ok(ProviderPage {
            messages,
            listed: ids.len(),
            next_page_token: listing.next_page_token.filter(|t| !t.is_empty()),
            total_estimate: listing.result_size_estimate,
        })
    }

    fn query(&self, mailbox: Mailbox) -> String {
        match mailbox {
            Mailbox::Inbox => {
                let floor = Utc::now() - chrono::Duration::days(self.history_days);
                format!("in:inbox -from:me after:{}", floor.format("%Y/%m/%d"))
            }
            Mailbox::Sent => "in:sent".to_string(),
            Mailbox::Trash => "in:trash".to_string(),
        }
    }

    async fn fetch_details(&self, account: &LinkedAccount, ids: &[String]) -> Vec<NormalizedMessage> {
        let mut messages = Vec::with_capacity(ids.len());
        for (batch, chunk) in ids.chunks(self.batch_size).enumerate() {
            if batch > 0 && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
            let results = join_all(chunk.iter().map(|id| self.fetch_detail(account, id))).await;
            messages.extend(results.into_iter().flatten());
        }
        messages
    }

    async fn fetch_detail(&self, account: &LinkedAccount, id: &str) -> Option<NormalizedMessage> {
        let url = match api_url(&self.base, &["messages", id]) {
            Ok(url) => url,
            Err(e) => {
                warn!("Skipping Gmail message {id}: {e}");
                return None;
            }
        };

        let response = self
            .http
            .retry()
            .run(|| {
                self.http
                    .get(url.clone(), &account.access_token)
                    .query(&[("format", "full"), ("fields", DETAIL_FIELDS)])
                    .send()
            })
            .await;

        let response = match response {
            Ok(response) if is_rate_limited(response.status()) => {
                warn!(account = %account.id, "Dropping Gmail message {id}: still rate limited");
                return None;
            }
            Ok(response) => response,
            Err(e) => {
                warn!(account = %account.id, "Failed to fetch Gmail message {id}: {e}");
                return None;
            }
        };

        match decode_json::<GmailMessage>(response).await {
            Ok(message) => Some(self.normalize(account, message).await),
            Err(e) => {
                warn!(account = %account.id, "Failed to load Gmail message {id}: {e}");
                None
            }
        }
    }

    async fn normalize(&self, account: &LinkedAccount, message: GmailMessage) -> NormalizedMessage {
        let attachment_base = format!("{}/messages/{}/attachments", self.base, message.id);
        let mut walk = message
            .payload
            .as_ref()
            .map(|payload| Walk::new(payload, &attachment_base))
            .unwrap_or_default();

        let pending = walk.pending_inline();
        if !pending.is_empty() {
            let fetched = join_all(
                pending
                    .iter()
                    .map(|(_, aid)| self.fetch_attachment(account, &message.id, aid)),
            )
            .await;
            for ((idx, aid), result) in pending.iter().zip(fetched) {
                match result {
                    Ok(data) => walk.fill(*idx, &data),
                    Err(e) => warn!("Inline image {aid} of {} unavailable: {e}", message.id),
                }
            }
        }

        into_message(&message, account, walk)
    }

    async fn fetch_attachment(
        &self,
        account: &LinkedAccount,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<String> {
        let url = api_url(&self.base, &["messages", message_id, "attachments", attachment_id])?;
        let body: AttachmentBody = self.http.json(self.http.get(url, &account.access_token)).await?;
        Ok(body.data)
    }

    /// Send `message` from the account's address.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be built or the request fails.
    pub async fn send(&self, account: &LinkedAccount, message: &OutgoingMessage) -> Result<bool> {
        let mut builder = MessageBuilder::new()
            .from(account.email.as_str())
            .to(&message.to)
            .cc(&message.cc)
            .bcc(&message.bcc)
            .subject(message.subject.as_str())
            .html_body(message.body_html.as_str());
        for attachment in &message.attachments {
            builder = builder.attach(attachment.clone());
        }
        let raw = builder.build()?;

        let url = api_url(&self.base, &["messages", "send"])?;
        let request = self
            .http
            .post(url, &account.access_token)
            .json(&SendRequest {
                raw: encode_base64_url(raw.as_bytes()),
            });
        self.http.expect_status(request, StatusCode::OK).await
    }

    /// Move a message to the trash.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn trash(&self, account: &LinkedAccount, id: &str) -> Result<bool> {
        let url = api_url(&self.base, &["messages", id, "trash"])?;
        self.http
            .expect_status(self.http.post(url, &account.access_token), StatusCode::OK)
            .await
    }

    /// Move a trashed message back to the inbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn restore(&self, account: &LinkedAccount, id: &str) -> Result<bool> {
        let url = api_url(&self.base, &["messages", id, "modify"])?;
        let request = self.http.post(url, &account.access_token).json(&ModifyRequest {
            add_label_ids: vec!["INBOX"],
            remove_label_ids: vec!["TRASH"],
        });
        self.http.expect_status(request, StatusCode::OK).await
    }

    /// Delete a message for good.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete(&self, account: &LinkedAccount, id: &str) -> Result<bool> {
        let url = api_url(&self.base, &["messages", id])?;
        self.http
            .expect_status(self.http.delete(url, &account.access_token), StatusCode::NO_CONTENT)
            .await
    }
}
