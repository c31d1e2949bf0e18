//! Outgoing message construction.
//!
//! Produces an RFC 5322 message with a `multipart/mixed` body: one HTML
//! part followed by any attachments, everything base64 encoded.

use crate::content_type::ContentType;
use crate::encoding::encode_base64_wrapped;
use crate::error::{Error, Result};
use crate::header::Headers;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingAttachment {
    /// File name shown to the recipient.
    pub filename: String,
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    /// Raw file bytes.
    pub data: Vec<u8>,
}

impl OutgoingAttachment {
    /// Creates an attachment.
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

/// Builder for an outgoing HTML message.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    subject: String,
    html_body: String,
    attachments: Vec<OutgoingAttachment>,
    date: Option<DateTime<Utc>>,
    boundary: Option<String>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender address.
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Sets the primary recipients.
    #[must_use]
    pub fn to<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.to = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the carbon-copy recipients.
    #[must_use]
    pub fn cc<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cc = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the blind-copy recipients.
    #[must_use]
    pub fn bcc<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bcc = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html_body = html.into();
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: OutgoingAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Sets the `Date` header (defaults to now).
    #[must_use]
    pub const fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Fixes the multipart boundary instead of generating one.
    #[must_use]
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Renders the message with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHeader`] when the sender or every recipient
    /// is missing.
    pub fn build(self) -> Result<String> {
        let from = self
            .from
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| Error::MissingHeader("From".into()))?;
        if self.to.is_empty() {
            return Err(Error::MissingHeader("To".into()));
        }

        check_line("From", &from)?;
        for (name, values) in [("To", &self.to), ("Cc", &self.cc), ("Bcc", &self.bcc)] {
            for value in values {
                check_line(name, value)?;
            }
        }
        check_line("Subject", &self.subject)?;
        for attachment in &self.attachments {
            check_line("Content-Type", &attachment.content_type)?;
        }

        let boundary = self.boundary.unwrap_or_else(generate_boundary);

        let mut headers = Headers::new();
        headers.add("MIME-Version", "1.0");
        headers.add(
            "Content-Type",
            ContentType::multipart_mixed(boundary.clone()).to_string(),
        );
        headers.add("From", from);
        headers.add("To", self.to.join(", "));
        if !self.cc.is_empty() {
            headers.add("Cc", self.cc.join(", "));
        }
        if !self.bcc.is_empty() {
            headers.add("Bcc", self.bcc.join(", "));
        }
        headers.add("Subject", Headers::encode_value(&self.subject));
        headers.add("Date", self.date.unwrap_or_else(Utc::now).to_rfc2822());

        let mut out = headers.to_string();
        out.push_str("\r\n");

        let _ = write!(
            out,
            "--{boundary}\r\nContent-Type: {}\r\nContent-Transfer-Encoding: base64\r\n\r\n{}\r\n",
            ContentType::text_html(),
            encode_base64_wrapped(self.html_body.as_bytes())
        );

        for attachment in &self.attachments {
            let content_type = ContentType::parse_lenient(&attachment.content_type);
            let disposition = disposition_filename(&attachment.filename);
            let _ = write!(
                out,
                "--{boundary}\r\nContent-Type: {content_type}\r\nContent-Transfer-Encoding: base64\r\nContent-Disposition: attachment; {disposition}\r\n\r\n{}\r\n",
                encode_base64_wrapped(&attachment.data)
            );
        }

        let _ = write!(out, "--{boundary}--\r\n");
        Ok(out)
    }
}

fn check_line(name: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidHeader(name.to_string()));
    }
    Ok(())
}

/// `filename` parameter: quoted when plain ASCII, RFC 2231 otherwise.
fn disposition_filename(name: &str) -> String {
    let name: String = name.chars().filter(|c| !c.is_control()).collect();
    if name.is_ascii() && !name.contains(['"', '\\']) {
        return format!("filename=\"{name}\"");
    }
    let mut encoded = String::with_capacity(name.len() * 3);
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    format!("filename*=UTF-8''{encoded}")
}

fn generate_boundary() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("mailbridge_{nanos:x}_{seq}")
}
