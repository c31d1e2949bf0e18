//! Graph message normalization.

use mailbridge_mime::encoding::to_standard_base64;
use mailbridge_mime::inline::{data_uri, normalize_content_id, replace_cid, replace_dangling_cids};
use mailbridge_oauth::ProviderKind;

use super::model::{FILE_ATTACHMENT, GraphAttachment, GraphMessage};
use crate::account::LinkedAccount;
use crate::message::{
    Attachment, BodyType, NO_SUBJECT, NormalizedMessage, UNKNOWN_SENDER, parse_received, preview,
};
use crate::provider::Mailbox;

/// Map a Graph message into the common shape.
///
/// `value_url` yields the `$value` retrieval URL for a non-inline
/// attachment id.
pub fn into_message(
    message: GraphMessage,
    account: &LinkedAccount,
    mailbox: Mailbox,
    value_url: impl Fn(&str) -> Option<String>,
) -> NormalizedMessage {
    let body = message.body.unwrap_or_default();
    let is_html = body.content_type.eq_ignore_ascii_case("html");
    let mut content = body.content;

    let mut attachments = Vec::new();
    for graph in message
        .attachments
        .into_iter()
        .filter(|a| a.odata_type == FILE_ATTACHMENT)
    {
        let attachment = attachment(graph, &content, is_html, &value_url);
        if let (true, Some(cid), Some(data)) =
            (attachment.inline, &attachment.content_id, &attachment.data)
        {
            content = replace_cid(&content, cid, &data_uri(&attachment.mime_type, data));
        }
        attachments.push(attachment);
    }
    if is_html {
        content = replace_dangling_cids(&content);
    }

    let recipient_email = match mailbox {
        Mailbox::Sent => {
            let to: Vec<&str> = message.to_recipients.iter().filter_map(|r| r.address()).collect();
            if to.is_empty() {
                account.email.clone()
            } else {
                to.join(", ")
            }
        }
        Mailbox::Inbox | Mailbox::Trash => account.email.clone(),
    };

    let date = message
        .received_date_time
        .or(message.sent_date_time)
        .unwrap_or_default();

    NormalizedMessage {
        id: message.id,
        account_id: account.id,
        provider: ProviderKind::Outlook,
        subject: message
            .subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| NO_SUBJECT.to_string()),
        sender: message
            .from
            .as_ref()
            .and_then(|f| f.address())
            .unwrap_or(UNKNOWN_SENDER)
            .to_string(),
        recipient_email,
        preview: preview(&message.body_preview),
        received_at: parse_received(&date),
        date,
        content,
        body_type: if is_html { BodyType::Html } else { BodyType::Plain },
        read: message.is_read,
        starred: message
            .flag
            .is_some_and(|f| f.flag_status.eq_ignore_ascii_case("flagged")),
        attachments,
    }
}

fn attachment(
    graph: GraphAttachment,
    content: &str,
    is_html: bool,
    value_url: impl Fn(&str) -> Option<String>,
) -> Attachment {
    let content_id = graph
        .content_id
        .as_deref()
        .map(normalize_content_id)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string);
    let referenced = content_id
        .as_deref()
        .is_some_and(|cid| is_html && content.contains(&format!("cid:{cid}")));
    let inline = (graph.is_inline || referenced) && graph.content_bytes.is_some();

    let (data, url) = if inline {
        (graph.content_bytes.as_deref().map(to_standard_base64), None)
    } else {
        (None, value_url(&graph.id))
    };

    Attachment {
        id: graph.id,
        filename: graph.name,
        mime_type: graph
            .content_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        size: graph.size,
        inline,
        content_id,
        data,
        url,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::account::{AccountId, UserId};
    use chrono::{TimeZone, Utc};
    use mailbridge_mime::inline::PLACEHOLDER_GIF;
    use serde_json::json;

    fn account() -> LinkedAccount {
        LinkedAccount {
            id: AccountId::new(5),
            user_id: UserId::new(1),
            email: "me@outlook.com".to_string(),
            provider: ProviderKind::Outlook,
            access_token: "t".to_string(),
            refresh_token: None,
            token_expiry: None,
            created_at: Utc::now(),
        }
    }

    fn value_url(id: &str) -> Option<String> {
        Some(format!("https://graph.example/messages/m1/attachments/{id}/$value"))
    }

    fn graph(value: serde_json::Value) -> GraphMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_basic_fields() {
        let message = graph(json!({
            "id": "AAMk1",
            "subject": "Quarterly",
            "from": {"emailAddress": {"address": "boss@corp.com", "name": "Boss"}},
            "bodyPreview": "x".repeat(250),
            "receivedDateTime": "2024-01-02T10:30:00Z",
            "body": {"contentType": "html", "content": "<p>hi</p>"},
            "isRead": true,
            "flag": {"flagStatus": "flagged"}
        }));
        let msg = into_message(message, &account(), Mailbox::Inbox, value_url);

        assert_eq!(msg.id, "AAMk1");
        assert_eq!(msg.subject, "Quarterly");
        assert_eq!(msg.sender, "boss@corp.com");
        assert_eq!(msg.recipient_email, "me@outlook.com");
        assert_eq!(msg.preview.len(), 200);
        assert_eq!(msg.body_type, BodyType::Html);
        assert!(msg.read);
        assert!(msg.starred);
        assert_eq!(msg.provider, ProviderKind::Outlook);
        assert_eq!(msg.received_at, Utc.with_ymd_and_hms(2024, 1, 2, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let msg = into_message(graph(json!({"id": "x"})), &account(), Mailbox::Inbox, value_url);
        assert_eq!(msg.subject, NO_SUBJECT);
        assert_eq!(msg.sender, UNKNOWN_SENDER);
        assert_eq!(msg.body_type, BodyType::Plain);
        assert!(!msg.read);
        assert!(!msg.starred);
        assert_eq!(msg.received_at, chrono::DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_inline_and_regular_attachments() {
        let message = graph(json!({
            "id": "m1",
            "body": {"contentType": "html",
                     "content": r#"<img src="cid:logo@corp"><img src="cid:missing">"#},
            "attachments": [
                {"@odata.type": "#microsoft.graph.fileAttachment", "id": "a1", "name": "logo.png",
                 "contentType": "image/png", "size": 3, "isInline": true,
                 "contentId": "<logo@corp>", "contentBytes": "AQID"},
                {"@odata.type": "#microsoft.graph.fileAttachment", "id": "a2", "name": "deck.pdf",
                 "contentType": "application/pdf", "size": 9000, "isInline": false,
                 "contentBytes": "JVBERi0="},
                {"@odata.type": "#microsoft.graph.itemAttachment", "id": "a3", "name": "fwd"}
            ]
        }));
        let msg = into_message(message, &account(), Mailbox::Inbox, value_url);

        assert_eq!(msg.attachments.len(), 2);
        assert!(msg.content.contains("data:image/png;base64,AQID"));
        assert!(msg.content.contains(PLACEHOLDER_GIF));
        assert!(!msg.content.contains("cid:"));

        let logo = &msg.attachments[0];
        assert!(logo.inline);
        assert_eq!(logo.content_id.as_deref(), Some("logo@corp"));
        assert!(logo.url.is_none());

        let deck = &msg.attachments[1];
        assert!(!deck.inline);
        assert!(deck.data.is_none());
        assert_eq!(deck.url.as_deref(), Some("https://graph.example/messages/m1/attachments/a2/$value"));
    }

    #[test]
    fn test_referenced_image_treated_inline() {
        let message = graph(json!({
            "id": "m1",
            "body": {"contentType": "html", "content": r#"<img src="cid:sig">"#},
            "attachments": [
                {"@odata.type": "#microsoft.graph.fileAttachment", "id": "a1", "name": "sig.gif",
                 "contentType": "image/gif", "isInline": false, "contentId": "sig",
                 "contentBytes": "R0lG"}
            ]
        }));
        let msg = into_message(message, &account(), Mailbox::Inbox, value_url);
        assert!(msg.attachments[0].inline);
        assert!(msg.content.contains("data:image/gif;base64,R0lG"));
    }

    #[test]
    fn test_sent_recipient_from_to_list() {
        let message = graph(json!({
            "id": "s1",
            "sentDateTime": "2024-03-01T08:00:00Z",
            "toRecipients": [
                {"emailAddress": {"address": "a@x.com"}},
                {"emailAddress": {"address": "b@x.com"}}
            ]
        }));
        let msg = into_message(message, &account(), Mailbox::Sent, value_url);
        assert_eq!(msg.recipient_email, "a@x.com, b@x.com");
        assert_eq!(msg.date, "2024-03-01T08:00:00Z");
    }
}
