//! Shared fixtures for the mock-server tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use mailbridge_core::{
    AccountId, AccountRepository, AccountStore, Config, Credentials, LinkedAccount, MailService,
    NewAccount, ProviderKind, Result, UserId,
};
use mailbridge_mime::encoding::encode_base64_url;
use serde_json::{Value, json};
use wiremock::MockServer;

pub const USER: UserId = UserId(1);
pub const OTHER_USER: UserId = UserId(2);

/// In-memory store that counts credential writes.
pub struct RecordingStore {
    inner: AccountRepository,
    writes: AtomicUsize,
}

impl RecordingStore {
    pub async fn new() -> Self {
        Self {
            inner: AccountRepository::in_memory().await.unwrap(),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn add(
        &self,
        user: UserId,
        email: &str,
        provider: ProviderKind,
        credentials: Credentials,
    ) -> LinkedAccount {
        self.inner
            .insert(NewAccount {
                user_id: user,
                email: email.to_string(),
                provider,
                credentials,
            })
            .await
            .unwrap()
    }

    /// Account with a token that needs no refresh.
    pub async fn add_valid(&self, user: UserId, email: &str, provider: ProviderKind) -> LinkedAccount {
        self.add(user, email, provider, credentials("access", Some("refresh"), None))
            .await
    }
}

impl AccountStore for RecordingStore {
    async fn accounts_for_user(&self, user: UserId) -> Result<Vec<LinkedAccount>> {
        self.inner.accounts_for_user(user).await
    }

    async fn account(&self, id: AccountId) -> Result<Option<LinkedAccount>> {
        self.inner.account(id).await
    }

    async fn update_credentials(&self, id: AccountId, credentials: &Credentials) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        AccountStore::update_credentials(&self.inner, id, credentials).await
    }

    async fn insert_account(&self, account: NewAccount) -> Result<LinkedAccount> {
        self.inner.insert_account(account).await
    }

    async fn delete_account(&self, user: UserId, id: AccountId) -> Result<bool> {
        self.inner.delete_account(user, id).await
    }
}

pub fn credentials(access: &str, refresh: Option<&str>, expiry: Option<DateTime<Utc>>) -> Credentials {
    Credentials {
        access_token: access.to_string(),
        refresh_token: refresh.map(ToString::to_string),
        token_expiry: expiry,
    }
}

/// Configuration pointing every endpoint at `server`, with instant retries.
pub fn config(server: &MockServer) -> Config {
    let uri = server.uri();
    let mut config = Config::default();
    config.endpoints.gmail_api = format!("{uri}/gmail/v1/users/me");
    config.endpoints.graph_api = format!("{uri}/v1.0/me");
    config.endpoints.google_userinfo = format!("{uri}/oauth2/v2/userinfo");
    config.endpoints.google_token = format!("{uri}/google/token");
    config.endpoints.microsoft_token = format!("{uri}/microsoft/token");
    config.google.client_id = "google-client".to_string();
    config.google.client_secret = "google-secret".to_string();
    config.outlook.client_id = "outlook-client".to_string();
    config.outlook.client_secret = "outlook-secret".to_string();
    config.retry.base_delay_ms = 1;
    config.gmail_batch_pause_ms = 0;
    config
}

pub fn service(server: &MockServer, store: RecordingStore) -> MailService<RecordingStore> {
    MailService::new(&config(server), store).unwrap()
}

pub const GMAIL_LIST: &str = "/gmail/v1/users/me/messages";

pub fn gmail_detail_path(id: &str) -> String {
    format!("{GMAIL_LIST}/{id}")
}

pub fn outlook_folder_path(folder: &str) -> String {
    format!("/v1.0/me/mailFolders/{folder}/messages")
}

pub fn gmail_list(ids: &[&str], next_page_token: Option<&str>) -> Value {
    let mut body = json!({
        "messages": ids.iter().map(|id| json!({"id": id, "threadId": id})).collect::<Vec<_>>(),
        "resultSizeEstimate": ids.len(),
    });
    if let Some(token) = next_page_token {
        body["nextPageToken"] = json!(token);
    }
    body
}

pub fn gmail_message(id: &str, subject: &str, date: &str) -> Value {
    json!({
        "id": id,
        "labelIds": ["INBOX", "UNREAD"],
        "snippet": format!("snippet of {id}"),
        "payload": {
            "mimeType": "text/html",
            "headers": [
                {"name": "Subject", "value": subject},
                {"name": "From", "value": "sender@example.com"},
                {"name": "Delivered-To", "value": "me@gmail.com"},
                {"name": "Date", "value": date}
            ],
            "body": {"size": 10, "data": encode_base64_url(format!("<p>{subject}</p>").as_bytes())}
        }
    })
}

pub fn graph_message(id: &str, subject: &str, received: &str) -> Value {
    json!({
        "id": id,
        "subject": subject,
        "from": {"emailAddress": {"address": "sender@contoso.com"}},
        "bodyPreview": subject,
        "receivedDateTime": received,
        "body": {"contentType": "html", "content": format!("<p>{subject}</p>")},
        "isRead": false,
        "flag": {"flagStatus": "notFlagged"},
        "attachments": []
    })
}

pub fn graph_list(messages: Vec<Value>, count: Option<u64>) -> Value {
    let mut body = json!({"value": messages});
    if let Some(count) = count {
        body["@odata.count"] = json!(count);
    }
    body
}
