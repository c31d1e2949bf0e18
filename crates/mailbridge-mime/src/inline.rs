//! Inline image (`cid:`) reference rewriting for HTML bodies.

use regex::Regex;
use std::sync::LazyLock;

/// 1x1 transparent GIF substituted for `cid:` references nothing resolved.
pub const PLACEHOLDER_GIF: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

#[allow(clippy::unwrap_used)]
static DANGLING_CID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src=["'](cid:[^"']+)["']"#).unwrap());

/// Strips the angle brackets a `Content-ID` header carries.
#[must_use]
pub fn normalize_content_id(content_id: &str) -> &str {
    content_id.trim().trim_start_matches('<').trim_end_matches('>')
}

/// Builds a `data:` URI from a MIME type and standard base64 payload.
#[must_use]
pub fn data_uri(mime_type: &str, base64: &str) -> String {
    format!("data:{mime_type};base64,{base64}")
}

/// Replaces every `cid:{content_id}` occurrence with `target`.
///
/// An empty content id leaves the HTML untouched.
#[must_use]
pub fn replace_cid(html: &str, content_id: &str, target: &str) -> String {
    let id = normalize_content_id(content_id);
    if id.is_empty() {
        return html.to_string();
    }
    html.replace(&format!("cid:{id}"), target)
}

/// Points every remaining `src="cid:..."` at [`PLACEHOLDER_GIF`].
#[must_use]
pub fn replace_dangling_cids(html: &str) -> String {
    if !html.contains("cid:") {
        return html.to_string();
    }
    DANGLING_CID
        .replace_all(html, format!("src=\"{PLACEHOLDER_GIF}\"").as_str())
        .into_owned()
}
