//! Linking and unlinking mailboxes through the OAuth callback.

#![allow(clippy::unwrap_used)]

mod common;

use common::{OTHER_USER, RecordingStore, USER, service};
use mailbridge_core::{Error, ProviderKind};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_google(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/google/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains("client_secret=google-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "google-access",
            "refresh_token": "google-refresh",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .and(header("authorization", "Bearer google-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "Me@Gmail.com "})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn authorization_url_carries_client_and_state() {
    let server = MockServer::start().await;
    let service = service(&server, RecordingStore::new().await);

    let url = service.authorization_url(ProviderKind::Gmail, "csrf-123").unwrap();
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("client_id".to_string(), "google-client".to_string())));
    assert!(pairs.contains(&("state".to_string(), "csrf-123".to_string())));
    assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));

    let url = service.authorization_url(ProviderKind::Outlook, "s").unwrap();
    assert!(url.as_str().contains("client_id=outlook-client"));
    assert!(url.as_str().contains("offline_access"));
}

#[tokio::test]
async fn gmail_link_stores_credentials() {
    let server = MockServer::start().await;
    mount_google(&server).await;
    let service = service(&server, RecordingStore::new().await);

    let account = service
        .link_account(USER, ProviderKind::Gmail, "auth-code")
        .await
        .unwrap();
    assert_eq!(account.email, "Me@Gmail.com");
    assert_eq!(account.provider, ProviderKind::Gmail);
    assert_eq!(account.access_token, "google-access");
    assert_eq!(account.refresh_token.as_deref(), Some("google-refresh"));
    assert!(account.token_expiry.is_some());

    let listed = service.list_accounts(USER).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, account.id);
    assert!(service.list_accounts(OTHER_USER).await.unwrap().is_empty());

    let err = service
        .link_account(USER, ProviderKind::Gmail, "auth-code")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccountExists(_)));

    // Another user may link the same address.
    service
        .link_account(OTHER_USER, ProviderKind::Gmail, "auth-code")
        .await
        .unwrap();
}

#[tokio::test]
async fn outlook_link_falls_back_to_principal_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/microsoft/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "graph-access",
            "refresh_token": "graph-refresh",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "mail": null,
            "userPrincipalName": "me@contoso.onmicrosoft.com"
        })))
        .mount(&server)
        .await;
    let service = service(&server, RecordingStore::new().await);

    let account = service
        .link_account(USER, ProviderKind::Outlook, "code")
        .await
        .unwrap();
    assert_eq!(account.email, "me@contoso.onmicrosoft.com");
    assert_eq!(account.provider, ProviderKind::Outlook);
}

#[tokio::test]
async fn rejected_code_links_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/google/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let service = service(&server, RecordingStore::new().await);

    let err = service
        .link_account(USER, ProviderKind::Gmail, "bad")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OAuth(mailbridge_oauth::Error::Rejected { ref code, .. }) if code == "invalid_grant"
    ));
    assert!(service.list_accounts(USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_address_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/google/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "a"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "123"})))
        .mount(&server)
        .await;
    let service = service(&server, RecordingStore::new().await);

    let err = service
        .link_account(USER, ProviderKind::Gmail, "code")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn only_the_owner_can_unlink() {
    let server = MockServer::start().await;
    let store = RecordingStore::new().await;
    let account = store.add_valid(USER, "me@gmail.com", ProviderKind::Gmail).await;
    let service = service(&server, store);

    assert!(!service.delete_account(OTHER_USER, account.id).await.unwrap());
    assert_eq!(service.list_accounts(USER).await.unwrap().len(), 1);

    assert!(service.delete_account(USER, account.id).await.unwrap());
    assert!(service.list_accounts(USER).await.unwrap().is_empty());
    assert!(!service.delete_account(USER, account.id).await.unwrap());
}
