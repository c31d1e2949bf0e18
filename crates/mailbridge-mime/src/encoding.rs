//! MIME encoding and decoding utilities.
//!
//! Provider APIs hand out body and attachment data as URL-safe base64,
//! often without padding. The helpers here accept either alphabet and
//! normalize to the standard one where a `data:` URI needs it.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};

/// Line length for base64 bodies inside a MIME message.
const MAX_LINE_LENGTH: usize = 76;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as URL-safe Base64 with padding (Gmail `raw` field).
#[must_use]
pub fn encode_base64_url(data: &[u8]) -> String {
    URL_SAFE.encode(data)
}

/// Encodes data as Base64 wrapped at 76 columns with CRLF line breaks.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);
    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        // chunks of an ASCII string stay valid UTF-8
        out.push_str(&String::from_utf8_lossy(chunk));
    }
    out
}

/// Rewrites URL-safe base64 into the standard alphabet and pads it to a
/// multiple of four. Whitespace is dropped.
///
/// Standard input passes through unchanged apart from padding.
#[must_use]
pub fn to_standard_base64(data: &str) -> String {
    let mut out: String = data
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let rem = out.len() % 4;
    if rem != 0 {
        out.extend(std::iter::repeat_n('=', 4 - rem));
    }
    out
}

/// Decodes Base64 data in either alphabet, padded or not.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(to_standard_base64(data))
        .map_err(Into::into)
}

/// Decodes a base64 body into text, replacing invalid UTF-8 sequences.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64_text(data: &str) -> Result<String> {
    let bytes = decode_base64(data)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        match bytes.get(i + 1..i + 3) {
            // soft line breaks
            Some([b'\r', b'\n']) => i += 3,
            Some([b'\n', _]) => i += 2,
            Some(hex) => {
                let hex = std::str::from_utf8(hex)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                result.push(byte);
                i += 3;
            }
            None if bytes.get(i + 1) == Some(&b'\n') => i += 2,
            None => {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        }
    }

    String::from_utf8(result).map_err(Into::into)
}

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// # Arguments
///
/// * `text` - Text to encode
/// * `charset` - Character set (e.g., "utf-8")
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && c != '=' && c != '?') {
        return text.to_string();
    }

    let encoded = encode_base64(text.as_bytes());
    format!("=?{charset}?B?{encoded}?=")
}

/// Decodes RFC 2047 encoded header value.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// # Errors
///
/// Returns an error if the input is not valid RFC 2047 format.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let Some(inner) = text
        .strip_prefix("=?")
        .and_then(|rest| rest.strip_suffix("?="))
    else {
        return Ok(text.to_string());
    };

    let parts: Vec<&str> = inner.split('?').collect();
    let [_, encoding, encoded_text] = parts.as_slice() else {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    };

    match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_base64_text(encoded_text),
        "Q" => decode_quoted_printable(&encoded_text.replace('_', " ")),
        other => Err(Error::InvalidEncoding(format!("Unknown encoding: {other}"))),
    }
}
