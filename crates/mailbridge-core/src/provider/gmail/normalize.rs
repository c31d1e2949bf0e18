//! Gmail MIME tree walk and message normalization.

use chrono::{DateTime, Utc};
use mailbridge_mime::encoding::{decode_base64_text, to_standard_base64};
use mailbridge_mime::inline::{data_uri, normalize_content_id, replace_cid, replace_dangling_cids};
use mailbridge_mime::{ContentType, Headers};
use mailbridge_oauth::ProviderKind;
use tracing::warn;

use super::model::{GmailMessage, Header, Part};
use crate::account::LinkedAccount;
use crate::message::{
    Attachment, BodyType, NO_SUBJECT, NormalizedMessage, UNKNOWN_SENDER, parse_received, preview,
};

/// Deepest multipart nesting followed.
pub const MAX_DEPTH: usize = 10;

const UNNAMED_ATTACHMENT: &str = "unnamed_attachment";

/// Body and attachments collected from one MIME tree.
#[derive(Debug, Default)]
pub struct Walk {
    content: String,
    html: bool,
    attachments: Vec<Attachment>,
}

impl Walk {
    /// Walk `payload`, using `attachment_base` (`.../messages/{id}/attachments`)
    /// for retrieval URLs.
    pub fn new(payload: &Part, attachment_base: &str) -> Self {
        let mut walk = Self::default();
        walk.visit(payload, 0, attachment_base);
        walk
    }

    fn visit(&mut self, part: &Part, depth: usize, attachment_base: &str) {
        if depth > MAX_DEPTH {
            warn!(part = %part.part_id, "MIME tree too deep, ignoring remainder");
            return;
        }

        let content_type = ContentType::parse_lenient(&part.mime_type);
        let headers = part_headers(&part.headers);
        let disposition = headers
            .get("Content-Disposition")
            .map(|d| d.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let is_attachment = disposition.starts_with("attachment")
            || (!part.filename.is_empty() && part.body.attachment_id.is_some());

        if content_type.is_multipart() {
            for child in &part.parts {
                self.visit(child, depth + 1, attachment_base);
            }
        } else if (content_type.is_html() || content_type.is_plain_text()) && !is_attachment {
            self.take_text(part, content_type.is_html());
        } else if content_type.is_image()
            || part.body.attachment_id.is_some()
            || !part.filename.is_empty()
        {
            let content_id = headers
                .get("Content-ID")
                .or_else(|| headers.get("X-Attachment-Id"))
                .map(normalize_content_id)
                .filter(|id| !id.is_empty())
                .map(ToString::to_string);
            let inline = content_type.is_image()
                && (content_id.is_some() || disposition.starts_with("inline"));
            self.attachments.push(attachment(part, content_type.essence(), inline, content_id, attachment_base));
        }
    }

    fn take_text(&mut self, part: &Part, is_html: bool) {
        let Some(data) = part.body.data.as_deref() else {
            return;
        };
        let text = match decode_base64_text(data) {
            Ok(text) => text,
            Err(e) => {
                warn!(part = %part.part_id, "Undecodable body: {e}");
                return;
            }
        };
        if text.is_empty() {
            return;
        }
        if is_html {
            self.content = text;
            self.html = true;
        } else if self.content.is_empty() {
            self.content = text;
        }
    }

    /// Inline images whose bytes must be fetched: `(index, attachment id)`.
    pub fn pending_inline(&self) -> Vec<(usize, String)> {
        self.attachments
            .iter()
            .enumerate()
            .filter(|(_, a)| a.inline && a.data.is_none() && !a.id.is_empty())
            .map(|(idx, a)| (idx, a.id.clone()))
            .collect()
    }

    /// Store fetched bytes (any base64 alphabet) for attachment `idx`.
    pub fn fill(&mut self, idx: usize, data: &str) {
        if let Some(attachment) = self.attachments.get_mut(idx) {
            attachment.data = Some(to_standard_base64(data));
            attachment.url = None;
        }
    }

    /// Finalize the body: fall back to `snippet`, inline resolved images as
    /// data URIs and neutralize the remaining `cid:` references.
    pub fn finish(self, snippet: &str) -> (String, BodyType, Vec<Attachment>) {
        let mut content = if self.content.is_empty() {
            snippet.to_string()
        } else {
            self.content
        };
        for attachment in self.attachments.iter().filter(|a| a.inline) {
            if let (Some(cid), Some(data)) = (&attachment.content_id, &attachment.data) {
                content = replace_cid(&content, cid, &data_uri(&attachment.mime_type, data));
            }
        }
        let content = replace_dangling_cids(&content);
        let body_type = if self.html { BodyType::Html } else { BodyType::Plain };
        (content, body_type, self.attachments)
    }
}

fn part_headers(headers: &[Header]) -> Headers {
    Headers::from_pairs(headers.iter().map(|h| (h.name.as_str(), h.value.as_str())))
}

fn attachment(
    part: &Part,
    mime_type: String,
    inline: bool,
    content_id: Option<String>,
    attachment_base: &str,
) -> Attachment {
    let id = part
        .body
        .attachment_id
        .clone()
        .unwrap_or_else(|| part.part_id.clone());
    let data = part.body.data.as_deref().map(to_standard_base64);
    let url = match (&part.body.attachment_id, &data) {
        (Some(aid), None) => Some(format!("{attachment_base}/{aid}")),
        _ => None,
    };
    Attachment {
        id,
        filename: if part.filename.is_empty() {
            UNNAMED_ATTACHMENT.to_string()
        } else {
            part.filename.clone()
        },
        mime_type,
        size: part.body.size,
        inline,
        content_id,
        data,
        url,
    }
}

/// Assemble the normalized message once the body is final.
pub fn into_message(
    message: &GmailMessage,
    account: &LinkedAccount,
    walk: Walk,
) -> NormalizedMessage {
    let headers = message
        .payload
        .as_ref()
        .map(|p| part_headers(&p.headers))
        .unwrap_or_default();

    let subject = headers
        .get_decoded("Subject")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_string());
    let sender = headers
        .get_decoded("From")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
    let recipient_email = headers
        .get("Delivered-To")
        .or_else(|| headers.get("To"))
        .map_or_else(|| account.email.clone(), ToString::to_string);

    let internal = message
        .internal_date
        .as_deref()
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis);
    let date = headers
        .get("Date")
        .map(ToString::to_string)
        .or_else(|| internal.map(|dt| dt.to_rfc2822()))
        .unwrap_or_default();
    let mut received_at = parse_received(&date);
    if received_at == DateTime::<Utc>::MIN_UTC {
        if let Some(internal) = internal {
            received_at = internal;
        }
    }

    let (content, body_type, attachments) = walk.finish(&message.snippet);
    let preview = if message.snippet.is_empty() {
        preview(&content)
    } else {
        preview(&message.snippet)
    };

    NormalizedMessage {
        id: message.id.clone(),
        account_id: account.id,
        provider: ProviderKind::Gmail,
        subject,
        sender,
        recipient_email,
        preview,
        date,
        content,
        body_type,
        read: !message.has_label("UNREAD"),
        starred: message.has_label("STARRED"),
        attachments,
        received_at,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::account::{AccountId, UserId};
    use mailbridge_mime::encoding::encode_base64_url;
    use mailbridge_mime::inline::PLACEHOLDER_GIF;
    use serde_json::json;

    const BASE: &str = "https://gmail.example/messages/m1/attachments";

    fn account() -> LinkedAccount {
        LinkedAccount {
            id: AccountId::new(3),
            user_id: UserId::new(1),
            email: "me@gmail.com".to_string(),
            provider: ProviderKind::Gmail,
            access_token: "t".to_string(),
            refresh_token: None,
            token_expiry: None,
            created_at: Utc::now(),
        }
    }

    fn b64(s: &str) -> String {
        encode_base64_url(s.as_bytes())
    }

    fn part(value: serde_json::Value) -> Part {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_html_preferred_over_plain() {
        let payload = part(json!({
            "mimeType": "multipart/alternative",
            "parts": [
                {"partId": "0", "mimeType": "text/plain", "body": {"data": b64("plain")}},
                {"partId": "1", "mimeType": "text/html", "body": {"data": b64("<p>html</p>")}}
            ]
        }));
        let (content, body_type, attachments) = Walk::new(&payload, BASE).finish("snip");
        assert_eq!(content, "<p>html</p>");
        assert_eq!(body_type, BodyType::Html);
        assert!(attachments.is_empty());
    }

    #[test]
    fn test_plain_does_not_replace_html() {
        let payload = part(json!({
            "mimeType": "multipart/alternative",
            "parts": [
                {"partId": "0", "mimeType": "text/html", "body": {"data": b64("<b>x</b>")}},
                {"partId": "1", "mimeType": "text/plain", "body": {"data": b64("x")}}
            ]
        }));
        let (content, _, _) = Walk::new(&payload, BASE).finish("");
        assert_eq!(content, "<b>x</b>");
    }

    #[test]
    fn test_single_part_message() {
        let payload = part(json!({"mimeType": "text/plain", "body": {"data": b64("hello")}}));
        let (content, body_type, _) = Walk::new(&payload, BASE).finish("");
        assert_eq!(content, "hello");
        assert_eq!(body_type, BodyType::Plain);
    }

    #[test]
    fn test_empty_body_falls_back_to_snippet() {
        let payload = part(json!({"mimeType": "multipart/mixed", "parts": []}));
        let (content, body_type, _) = Walk::new(&payload, BASE).finish("the snippet");
        assert_eq!(content, "the snippet");
        assert_eq!(body_type, BodyType::Plain);
    }

    #[test]
    fn test_inline_image_with_data_becomes_data_uri() {
        let payload = part(json!({
            "mimeType": "multipart/related",
            "parts": [
                {"partId": "0", "mimeType": "text/html",
                 "body": {"data": b64(r#"<img src="cid:logo@x"><img src="cid:gone@x">"#)}},
                {"partId": "1", "mimeType": "image/png", "filename": "logo.png",
                 "headers": [{"name": "Content-ID", "value": "<logo@x>"}],
                 "body": {"size": 3, "data": "AQID"}}
            ]
        }));
        let (content, _, attachments) = Walk::new(&payload, BASE).finish("");
        assert!(content.contains(r#"src="data:image/png;base64,AQID""#));
        assert!(content.contains(PLACEHOLDER_GIF));
        assert!(!content.contains("cid:"));
        assert_eq!(attachments.len(), 1);
        assert!(attachments[0].inline);
        assert_eq!(attachments[0].content_id.as_deref(), Some("logo@x"));
    }

    #[test]
    fn test_inline_image_pending_fetch() {
        let payload = part(json!({
            "mimeType": "multipart/related",
            "parts": [
                {"partId": "0", "mimeType": "text/html", "body": {"data": b64(r#"<img src="cid:pic">"#)}},
                {"partId": "1", "mimeType": "image/gif",
                 "headers": [{"name": "Content-Disposition", "value": "inline"},
                             {"name": "Content-ID", "value": "<pic>"}],
                 "body": {"attachmentId": "att-1", "size": 10}}
            ]
        }));
        let mut walk = Walk::new(&payload, BASE);
        let pending = walk.pending_inline();
        assert_eq!(pending, vec![(0, "att-1".to_string())]);

        walk.fill(0, "R0lG-_8");
        let (content, _, attachments) = walk.finish("");
        assert_eq!(attachments[0].data.as_deref(), Some("R0lG+/8="));
        assert!(attachments[0].url.is_none());
        assert!(content.contains("data:image/gif;base64,R0lG+/8="));
    }

    #[test]
    fn test_regular_attachment_gets_url() {
        let payload = part(json!({
            "mimeType": "multipart/mixed",
            "parts": [
                {"partId": "0", "mimeType": "text/plain", "body": {"data": b64("see attached")}},
                {"partId": "1", "mimeType": "application/pdf", "filename": "report.pdf",
                 "headers": [{"name": "Content-Disposition", "value": "attachment; filename=\"report.pdf\""}],
                 "body": {"attachmentId": "att-9", "size": 2048}}
            ]
        }));
        let walk = Walk::new(&payload, BASE);
        assert!(walk.pending_inline().is_empty());
        let (content, _, attachments) = walk.finish("");
        assert_eq!(content, "see attached");
        assert_eq!(attachments[0].filename, "report.pdf");
        assert_eq!(attachments[0].mime_type, "application/pdf");
        assert!(!attachments[0].inline);
        assert_eq!(attachments[0].url.as_deref(), Some(format!("{BASE}/att-9").as_str()));
    }

    #[test]
    fn test_text_attachment_is_not_body() {
        let payload = part(json!({
            "mimeType": "multipart/mixed",
            "parts": [
                {"partId": "0", "mimeType": "text/html", "body": {"data": b64("<p>body</p>")}},
                {"partId": "1", "mimeType": "text/plain", "filename": "notes.txt",
                 "body": {"attachmentId": "att-2", "size": 5}}
            ]
        }));
        let (content, _, attachments) = Walk::new(&payload, BASE).finish("");
        assert_eq!(content, "<p>body</p>");
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "notes.txt");
    }

    #[test]
    fn test_depth_limit() {
        let mut node = json!({"partId": "leaf", "mimeType": "text/plain", "body": {"data": b64("deep")}});
        for _ in 0..=MAX_DEPTH {
            node = json!({"mimeType": "multipart/mixed", "parts": [node]});
        }
        let (content, _, _) = Walk::new(&part(node), BASE).finish("fallback");
        assert_eq!(content, "fallback");
    }

    #[test]
    fn test_into_message_headers_and_flags() {
        let message: GmailMessage = serde_json::from_value(json!({
            "id": "m1",
            "labelIds": ["INBOX", "STARRED"],
            "snippet": "Hi there",
            "internalDate": "1704189000000",
            "payload": {
                "mimeType": "text/plain",
                "headers": [
                    {"name": "subject", "value": "=?UTF-8?B?SGVsbG8=?="},
                    {"name": "From", "value": "Ann <ann@example.com>"},
                    {"name": "To", "value": "me@gmail.com"},
                    {"name": "Date", "value": "Tue, 2 Jan 2024 10:30:00 +0000"}
                ],
                "body": {"data": b64("Hi there, long body")}
            }
        }))
        .unwrap();
        let walk = Walk::new(message.payload.as_ref().unwrap(), BASE);
        let msg = into_message(&message, &account(), walk);

        assert_eq!(msg.subject, "Hello");
        assert_eq!(msg.sender, "Ann <ann@example.com>");
        assert_eq!(msg.recipient_email, "me@gmail.com");
        assert_eq!(msg.preview, "Hi there");
        assert_eq!(msg.content, "Hi there, long body");
        assert!(msg.read);
        assert!(msg.starred);
        assert_eq!(msg.account_id, AccountId::new(3));
        assert_eq!(msg.received_at.timestamp(), 1_704_191_400);
    }

    #[test]
    fn test_into_message_defaults() {
        let message: GmailMessage = serde_json::from_value(json!({
            "id": "m2",
            "labelIds": ["UNREAD"],
            "internalDate": "1704189000000",
            "payload": {"mimeType": "text/plain", "headers": [], "body": {}}
        }))
        .unwrap();
        let walk = Walk::new(message.payload.as_ref().unwrap(), BASE);
        let msg = into_message(&message, &account(), walk);

        assert_eq!(msg.subject, NO_SUBJECT);
        assert_eq!(msg.sender, UNKNOWN_SENDER);
        assert_eq!(msg.recipient_email, "me@gmail.com");
        assert!(!msg.read);
        assert!(!msg.starred);
        // No Date header: falls back to internalDate.
        assert_eq!(msg.received_at.timestamp_millis(), 1_704_189_000_000);
    }
}
