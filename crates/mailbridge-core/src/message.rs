//! Provider-agnostic message model and the tolerant date ordering used to
//! merge mailboxes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use mailbridge_oauth::ProviderKind;
use serde::Serialize;

use crate::account::AccountId;

/// Subject used when the provider returned none.
pub const NO_SUBJECT: &str = "No Subject";

/// Sender used when the provider returned none.
pub const UNKNOWN_SENDER: &str = "Unknown Sender";

/// Characters kept in [`NormalizedMessage::preview`].
pub const PREVIEW_CHARS: usize = 200;

/// Whether a body is HTML or plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    /// `text/html`
    Html,
    /// `text/plain`
    Plain,
}

/// Attachment descriptor.
///
/// Inline images carry their bytes in `data`; everything else carries a
/// retrieval `url` on the provider's API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Provider attachment id.
    pub id: String,
    /// File name.
    pub filename: String,
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes as reported by the provider.
    pub size: u64,
    /// Referenced from the body via `cid:`.
    pub inline: bool,
    /// `Content-ID` without angle brackets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    /// Standard base64 content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Authenticated retrieval URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A message as returned to callers, whichever provider served it.
///
/// Ids are only unique within one account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMessage {
    /// Provider-native message id.
    pub id: String,
    /// Account the message was fetched from.
    pub account_id: AccountId,
    /// Provider that served it.
    pub provider: ProviderKind,
    /// Subject line.
    pub subject: String,
    /// Sender address (or display form as the provider returned it).
    pub sender: String,
    /// Recipient mailbox.
    pub recipient_email: String,
    /// First characters of the body or the provider's snippet.
    pub preview: String,
    /// Upstream date string, unmodified.
    pub date: String,
    /// Body content.
    pub content: String,
    /// Body flavour.
    pub body_type: BodyType,
    /// Seen flag.
    pub read: bool,
    /// Starred / flagged.
    pub starred: bool,
    /// Attachments, inline images included.
    pub attachments: Vec<Attachment>,
    /// Parsed `date`; [`DateTime::<Utc>::MIN_UTC`] when unparseable.
    #[serde(skip)]
    pub received_at: DateTime<Utc>,
}

impl NormalizedMessage {
    /// Whether the body is HTML.
    #[must_use]
    pub fn has_html(&self) -> bool {
        self.body_type == BodyType::Html
    }
}

/// First [`PREVIEW_CHARS`] characters of `text`.
#[must_use]
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

const OFFSET_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y %I:%M:%S %p",
    "%B %d, %Y %H:%M",
    "%d %B %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%d %B %Y"];

/// Parse an upstream date string into an absolute time.
///
/// Tries mail-date (RFC 2822), then ISO 8601 with or without offset (naive
/// values are taken as UTC), then a few looser layouts. Anything else maps
/// to [`DateTime::<Utc>::MIN_UTC`] so the message sorts last.
#[must_use]
pub fn parse_received(raw: &str) -> DateTime<Utc> {
    try_parse(raw).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn try_parse(raw: &str) -> Option<DateTime<Utc>> {
    let s = strip_zone_name(strip_comment(raw.trim()));
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // "UTC" is not a zone name RFC 2822 knows.
    if let Some(head) = s.strip_suffix(" UTC") {
        if let Ok(dt) = DateTime::parse_from_rfc2822(&format!("{head} +0000")) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let naive = s.trim_end_matches('Z');
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(naive, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Drops a trailing `(comment)` such as `(UTC)` or `(PST)`.
fn strip_comment(s: &str) -> &str {
    if s.ends_with(')') {
        if let Some(idx) = s.rfind('(') {
            return s[..idx].trim_end();
        }
    }
    s
}

/// Drops a zone name trailing a numeric offset, as in `+0000 GMT`.
fn strip_zone_name(s: &str) -> &str {
    let Some((head, name)) = s.rsplit_once(' ') else {
        return s;
    };
    let head = head.trim_end();
    let offset = head.rsplit_once(' ').map_or(head, |(_, last)| last);
    let is_offset = offset.len() == 5
        && offset.starts_with(['+', '-'])
        && offset[1..].bytes().all(|b| b.is_ascii_digit());
    if is_offset && !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphabetic()) {
        head
    } else {
        s
    }
}

/// Sort newest first. Ties keep their fetch order.
pub fn sort_newest_first(messages: &mut [NormalizedMessage]) {
    messages.sort_by(|a, b| b.received_at.cmp(&a.received_at));
}
