//! Microsoft Graph mail adapter.
//!
//! Pagination uses `$skip`; the continuation token is the next skip
//! offset. Attachments are expanded in the listing call, so one request
//! yields a whole page.

mod model;
mod normalize;

use chrono::Utc;
use reqwest::StatusCode;
use tracing::debug;

use self::model::{
    DraftMessage, FILE_ATTACHMENT, FileAttachment, ItemBody, ListResponse, MoveRequest, Recipient,
    SendMailRequest,
};
use self::normalize::into_message;
use super::{Mailbox, OutgoingMessage, ProviderPage};
use crate::Result;
use crate::account::LinkedAccount;
use crate::config::Config;
use crate::http::{HttpClient, api_url, decode_json};
use mailbridge_mime::encoding::encode_base64;

/// Largest `$top` Graph accepts for messages.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Outlook client for one process; accounts are passed per call.
#[derive(Debug, Clone)]
pub struct OutlookClient {
    http: HttpClient,
    base: String,
    history_days: i64,
}

impl OutlookClient {
    /// Build from configuration.
    #[must_use]
    pub fn new(http: HttpClient, config: &Config) -> Self {
        Self {
            http,
            base: config.endpoints.graph_api.trim_end_matches('/').to_string(),
            history_days: config.history_days,
        }
    }

    const fn folder(mailbox: Mailbox) -> &'static str {
        match mailbox {
            Mailbox::Inbox => "inbox",
            Mailbox::Sent => "sentitems",
            Mailbox::Trash => "deleteditems",
        }
    }

    /// List one page of `mailbox`, newest first.
    ///
    /// `page_token` is a skip offset; anything unparseable starts at zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded.
    pub async fn list(
        &self,
        account: &LinkedAccount,
        mailbox: Mailbox,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<ProviderPage> {
        let top = page_size.clamp(1, MAX_PAGE_SIZE);
        let skip = page_token
            .and_then(|t| t.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let mut params = vec![
            ("$top", top.to_string()),
            ("$skip", skip.to_string()),
            ("$orderby", "receivedDateTime desc".to_string()),
            ("$expand", "attachments".to_string()),
            ("$count", "true".to_string()),
        ];
        if mailbox == Mailbox::Inbox {
            let floor = Utc::now() - chrono::Duration::days(self.history_days);
            params.push((
                "$filter",
                format!("receivedDateTime ge {}T00:00:00Z", floor.format("%Y-%m-%d")),
            ));
        }

        let url = api_url(&self.base, &["mailFolders", Self::folder(mailbox), "messages"])?;
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

        let returned = listing.value.len();
        let next_skip = skip + top;
        // Without a count, a full page means there may be more.
        let has_more = listing.count.map_or(returned == top, |count| {
            u64::try_from(next_skip).is_ok_and(|next| next < count)
        });
        let total_estimate = listing
            .count
            .unwrap_or_else(|| u64::try_from(returned).unwrap_or(u64::MAX));
        debug!(
            account = %account.id,
            %mailbox,
            returned,
            total_estimate,
            "Listed Outlook messages"
        );

        let messages = listing
            .value
            .into_iter()
            .map(|message| {
                let message_id = message.id.clone();
                into_message(message, account, mailbox, |aid| {
                    api_url(&self.base, &["messages", &message_id, "attachments", aid, "$value"])
                        .ok()
                        .map(String::from)
                })
            })
            .collect();

        Ok(ProviderPage {
            messages,
            listed: returned,
            next_page_token: has_more.then(|| next_skip.to_string()),
            total_estimate,
        })
    }

    /// Send `message` through `sendMail`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn send(&self, account: &LinkedAccount, message: &OutgoingMessage) -> Result<bool> {
        let recipients =
            |list: &[String]| -> Vec<Recipient> { list.iter().map(|a| Recipient::new(a)).collect() };
        let request = SendMailRequest {
            message: DraftMessage {
                subject: message.subject.clone(),
                body: ItemBody {
                    content_type: "HTML".to_string(),
                    content: message.body_html.clone(),
                },
                to_recipients: recipients(&message.to),
                cc_recipients: recipients(&message.cc),
                bcc_recipients: recipients(&message.bcc),
                attachments: message
                    .attachments
                    .iter()
                    .map(|a| FileAttachment {
                        odata_type: FILE_ATTACHMENT,
                        name: a.filename.clone(),
                        content_type: a.content_type.clone(),
                        content_bytes: encode_base64(&a.data),
                    })
                    .collect(),
            },
        };

        let url = api_url(&self.base, &["sendMail"])?;
        self.http
            .expect_status(
                self.http.post(url, &account.access_token).json(&request),
                StatusCode::ACCEPTED,
            )
            .await
    }

    async fn move_to(&self, account: &LinkedAccount, id: &str, destination: &str) -> Result<bool> {
        let url = api_url(&self.base, &["messages", id, "move"])?;
        let request = self
            .http
            .post(url, &account.access_token)
            .json(&MoveRequest {
                destination_id: destination,
            });
        self.http.expect_status(request, StatusCode::CREATED).await
    }

    /// Move a message to Deleted Items.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn trash(&self, account: &LinkedAccount, id: &str) -> Result<bool> {
        self.move_to(account, id, "deleteditems").await
    }

    /// Move a message back to the inbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn restore(&self, account: &LinkedAccount, id: &str) -> Result<bool> {
        self.move_to(account, id, "inbox").await
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
