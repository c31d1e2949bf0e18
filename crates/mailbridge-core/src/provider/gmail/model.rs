//! Gmail REST wire types.

use serde::{Deserialize, Serialize};

/// `GET messages` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListResponse {
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
    pub result_size_estimate: u64,
}

/// Message id as returned by a listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageRef {
    pub id: String,
}

/// `GET messages/{id}?format=full` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GmailMessage {
    pub id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    /// Milliseconds since the epoch, as a string.
    pub internal_date: Option<String>,
    pub payload: Option<Part>,
}

impl GmailMessage {
    pub fn has_label(&self, label: &str) -> bool {
        self.label_ids.iter().any(|l| l == label)
    }
}

/// One node of the MIME tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Part {
    pub part_id: String,
    pub mime_type: String,
    pub filename: String,
    pub headers: Vec<Header>,
    pub body: Body,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Part body: inline `data` or a reference to fetch separately.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Body {
    pub attachment_id: Option<String>,
    pub size: u64,
    pub data: Option<String>,
}

/// `GET messages/{id}/attachments/{aid}` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AttachmentBody {
    pub data: String,
}

/// `POST messages/send` request.
#[derive(Debug, Serialize)]
pub struct SendRequest {
    pub raw: String,
}

/// `POST messages/{id}/modify` request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest {
    pub add_label_ids: Vec<&'static str>,
    pub remove_label_ids: Vec<&'static str>,
}
