//! Per-provider message adapters.
//!
//! Each adapter lists one mailbox folder with the provider's own pagination
//! primitive and maps every message into a [`NormalizedMessage`]. Gmail
//! continuation tokens are passed through as-is; Outlook's are numeric skip
//! offsets rendered as strings.
//!
//! [`NormalizedMessage`]: crate::message::NormalizedMessage

pub mod gmail;
pub mod outlook;

use mailbridge_mime::OutgoingAttachment;
use serde::{Deserialize, Serialize};

use crate::message::NormalizedMessage;

pub use gmail::GmailClient;
pub use outlook::OutlookClient;

/// Mailbox folders the adapters can list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mailbox {
    /// Received mail, restricted to the history window and excluding mail
    /// sent by the account itself.
    Inbox,
    /// Sent mail.
    Sent,
    /// Deleted mail.
    Trash,
}

impl Mailbox {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::Trash => "trash",
        }
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mailbox {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inbox" => Ok(Self::Inbox),
            "sent" => Ok(Self::Sent),
            "trash" | "deleted" => Ok(Self::Trash),
            other => Err(crate::Error::InvalidInput(format!("unknown mailbox: {other}"))),
        }
    }
}

/// One page from a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderPage {
    /// Normalized messages, in provider order.
    pub messages: Vec<NormalizedMessage>,
    /// Entries the listing call returned, including any that failed to load.
    pub listed: usize,
    /// Provider continuation token, if more remain.
    pub next_page_token: Option<String>,
    /// Provider's estimate of the folder size.
    pub total_estimate: u64,
}

/// A message to send from a linked account.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    pub cc: Vec<String>,
    /// Blind carbon-copy recipients.
    pub bcc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub body_html: String,
    /// File attachments.
    pub attachments: Vec<OutgoingAttachment>,
}
