//! Microsoft Graph mail wire types.

use serde::{Deserialize, Serialize};

/// `GET mailFolders/{folder}/messages` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListResponse {
    #[serde(rename = "@odata.count")]
    pub count: Option<u64>,
    pub value: Vec<GraphMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphMessage {
    pub id: String,
    pub subject: Option<String>,
    pub from: Option<Recipient>,
    pub to_recipients: Vec<Recipient>,
    pub body_preview: String,
    pub received_date_time: Option<String>,
    pub sent_date_time: Option<String>,
    pub body: Option<ItemBody>,
    pub is_read: bool,
    pub flag: Option<Flag>,
    pub attachments: Vec<GraphAttachment>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recipient {
    pub email_address: EmailAddress,
}

impl Recipient {
    pub fn new(address: &str) -> Self {
        Self {
            email_address: EmailAddress {
                address: Some(address.to_string()),
            },
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.email_address
            .address
            .as_deref()
            .filter(|a| !a.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemBody {
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Flag {
    pub flag_status: String,
}

pub const FILE_ATTACHMENT: &str = "#microsoft.graph.fileAttachment";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphAttachment {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    pub id: String,
    pub name: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub is_inline: bool,
    pub content_id: Option<String>,
    pub content_bytes: Option<String>,
}

/// `POST sendMail` request.
#[derive(Debug, Serialize)]
pub struct SendMailRequest {
    pub message: DraftMessage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftMessage {
    pub subject: String,
    pub body: ItemBody,
    pub to_recipients: Vec<Recipient>,
    pub cc_recipients: Vec<Recipient>,
    pub bcc_recipients: Vec<Recipient>,
    pub attachments: Vec<FileAttachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,
    pub name: String,
    pub content_type: String,
    pub content_bytes: String,
}

/// `POST messages/{id}/move` request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest<'a> {
    pub destination_id: &'a str,
}
