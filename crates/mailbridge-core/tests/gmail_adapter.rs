//! Gmail adapter listing behaviour against a mock Gmail API.

#![allow(clippy::unwrap_used)]

mod common;

use common::{GMAIL_LIST, RecordingStore, USER, config, gmail_detail_path, gmail_list, gmail_message};
use mailbridge_core::message::BodyType;
use mailbridge_core::provider::GmailClient;
use mailbridge_core::{HttpClient, LinkedAccount, Mailbox, ProviderKind};
use mailbridge_mime::encoding::encode_base64_url;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup(server: &MockServer) -> (GmailClient, LinkedAccount) {
    let config = config(server);
    let client = GmailClient::new(HttpClient::new(&config).unwrap(), &config);
    let store = RecordingStore::new().await;
    let account = store.add_valid(USER, "me@gmail.com", ProviderKind::Gmail).await;
    (client, account)
}

#[tokio::test]
async fn rate_limited_message_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GMAIL_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(gmail_list(&["a", "b", "c"], None)))
        .mount(&server)
        .await;
    for id in ["a", "c"] {
        Mock::given(method("GET"))
            .and(path(gmail_detail_path(id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(gmail_message(id, id, "2024-01-01T00:00:00Z")),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(gmail_detail_path("b")))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let (client, account) = setup(&server).await;
    let page = client.list(&account, Mailbox::Inbox, None, 10).await.unwrap();

    let ids: Vec<&str> = page.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(page.total_estimate, 3);
}

#[tokio::test]
async fn transient_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GMAIL_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(gmail_list(&["a"], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(gmail_detail_path("a")))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(gmail_detail_path("a")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gmail_message("a", "hello", "2024-01-01T00:00:00Z")),
        )
        .mount(&server)
        .await;

    let (client, account) = setup(&server).await;
    let page = client.list(&account, Mailbox::Inbox, None, 10).await.unwrap();
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.messages[0].subject, "hello");
}

#[tokio::test]
async fn listing_query_is_capped_and_scoped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GMAIL_LIST))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gmail_list(&[], Some("next-token"))),
        )
        .mount(&server)
        .await;

    let (client, account) = setup(&server).await;
    let page = client
        .list(&account, Mailbox::Inbox, Some("prev-token"), 500)
        .await
        .unwrap();
    assert!(page.messages.is_empty());
    assert_eq!(page.next_page_token.as_deref(), Some("next-token"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let query: Vec<(String, String)> = requests[0].url.query_pairs().into_owned().collect();
    let param = |name: &str| {
        query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(param("maxResults").as_deref(), Some("50"));
    assert_eq!(param("pageToken").as_deref(), Some("prev-token"));
    assert!(param("q").unwrap().starts_with("in:inbox -from:me after:"));
    assert!(param("includeSpamTrash").is_none());
    assert_eq!(
        requests[0].headers.get("authorization").unwrap(),
        "Bearer access"
    );
}

fn related_message() -> serde_json::Value {
    json!({
        "id": "m1",
        "labelIds": ["INBOX", "STARRED"],
        "snippet": "see the logo",
        "internalDate": "1704067200000",
        "payload": {
            "mimeType": "multipart/mixed",
            "headers": [
                {"name": "Subject", "value": "=?UTF-8?B?TG9nbyDinJM=?="},
                {"name": "From", "value": "Design <design@example.com>"},
                {"name": "To", "value": "me@gmail.com"}
            ],
            "parts": [
                {
                    "partId": "0",
                    "mimeType": "multipart/related",
                    "parts": [
                        {
                            "partId": "0.0",
                            "mimeType": "text/html",
                            "body": {"data": encode_base64_url(
                                br#"<p>hi</p><img src="cid:logo@x"><img src="cid:gone@x">"#
                            )}
                        },
                        {
                            "partId": "0.1",
                            "mimeType": "image/png",
                            "filename": "logo.png",
                            "headers": [{"name": "Content-ID", "value": "<logo@x>"}],
                            "body": {"attachmentId": "att-logo", "size": 4}
                        }
                    ]
                },
                {
                    "partId": "1",
                    "mimeType": "application/pdf",
                    "filename": "report.pdf",
                    "headers": [
                        {"name": "Content-Disposition", "value": "attachment; filename=report.pdf"}
                    ],
                    "body": {"attachmentId": "att-pdf", "size": 2048}
                }
            ]
        }
    })
}

#[tokio::test]
async fn inline_images_become_data_uris() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GMAIL_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(gmail_list(&["m1"], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(gmail_detail_path("m1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(related_message()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{GMAIL_LIST}/m1/attachments/att-logo")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"size": 4, "data": encode_base64_url(b"\x89PNG")})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{GMAIL_LIST}/m1/attachments/att-pdf")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, account) = setup(&server).await;
    let page = client.list(&account, Mailbox::Inbox, None, 10).await.unwrap();
    let message = &page.messages[0];

    assert_eq!(message.subject, "Logo ✓");
    assert_eq!(message.sender, "Design <design@example.com>");
    assert_eq!(message.recipient_email, "me@gmail.com");
    assert!(message.read);
    assert!(message.starred);
    assert_eq!(message.body_type, BodyType::Html);
    assert_eq!(message.received_at.timestamp(), 1_704_067_200);

    assert!(message.content.contains("data:image/png;base64,iVBORw=="));
    assert!(!message.content.contains("cid:"));

    let logo = message.attachments.iter().find(|a| a.filename == "logo.png").unwrap();
    assert!(logo.inline);
    assert_eq!(logo.content_id.as_deref(), Some("logo@x"));
    assert_eq!(logo.data.as_deref(), Some("iVBORw=="));
    assert!(logo.url.is_none());

    let pdf = message.attachments.iter().find(|a| a.filename == "report.pdf").unwrap();
    assert!(!pdf.inline);
    assert!(pdf.data.is_none());
    assert!(pdf.url.as_deref().unwrap().ends_with("/messages/m1/attachments/att-pdf"));
    assert_eq!(pdf.size, 2048);
}

#[tokio::test]
async fn unavailable_inline_image_gets_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GMAIL_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(gmail_list(&["m1"], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(gmail_detail_path("m1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(related_message()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{GMAIL_LIST}/m1/attachments/att-logo")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (client, account) = setup(&server).await;
    let page = client.list(&account, Mailbox::Inbox, None, 10).await.unwrap();
    let message = &page.messages[0];

    assert!(!message.content.contains("cid:"));
    assert!(message.content.contains(mailbridge_mime::inline::PLACEHOLDER_GIF));
    let logo = message.attachments.iter().find(|a| a.inline).unwrap();
    assert!(logo.data.is_none());
    assert!(logo.url.is_some());
}

#[tokio::test]
async fn trash_listing_includes_trash() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GMAIL_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(gmail_list(&[], None)))
        .mount(&server)
        .await;

    let (client, account) = setup(&server).await;
    client.list(&account, Mailbox::Trash, None, 5).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let query: Vec<(String, String)> = requests[0].url.query_pairs().into_owned().collect();
    assert!(query.contains(&("q".to_string(), "in:trash".to_string())));
    assert!(query.contains(&("includeSpamTrash".to_string(), "true".to_string())));
    assert!(query.contains(&("maxResults".to_string(), "5".to_string())));
}
