//! `data:` URL decoding
//!
//! `data:[<media type>][;base64],<payload>`; the media type defaults to
//! `text/plain`. Base64 payloads may contain whitespace, other payloads are
//! percent-decoded.

use base64::Engine;
use picsave_archive::Blob;

/// Media type of a `data:` URL that names none
pub const DEFAULT_MEDIA_TYPE: &str = "text/plain";

/// Errors decoding a `data:` URL
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataUrlError {
    #[error("not a data: URL")]
    NotDataUrl,

    #[error("data: URL has no ',' separator")]
    MissingSeparator,

    #[error("invalid base64 payload: {0}")]
    Base64(String),

    #[error("invalid percent escape at byte {0}")]
    PercentEscape(usize),
}

/// Decoded `data:` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// Lowercased media type without parameters
    pub media_type: String,
    pub data: Vec<u8>,
}

impl DataUrl {
    #[must_use]
    pub fn into_blob(self) -> Blob {
        Blob::new(self.data, self.media_type)
    }
}

/// Whether `url` uses the `data:` scheme
#[inline]
#[must_use]
pub fn is_data_url(url: &str) -> bool {
    url.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Decode a `data:` URL
///
/// # Errors
/// Returns `DataUrlError` when the scheme, separator or payload is malformed
pub fn decode_data_url(url: &str) -> Result<DataUrl, DataUrlError> {
    if !is_data_url(url) {
        return Err(DataUrlError::NotDataUrl);
    }
    let (header, payload) = url[5..]
        .split_once(',')
        .ok_or(DataUrlError::MissingSeparator)?;

    let (media_type, is_base64) = parse_header(header);
    let data = if is_base64 {
        decode_base64(payload)?
    } else {
        percent_decode(payload)?
    };

    Ok(DataUrl { media_type, data })
}

fn parse_header(header: &str) -> (String, bool) {
    let mut parts = header.split(';').map(str::trim);
    let media_type = parts
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MEDIA_TYPE)
        .to_ascii_lowercase();
    let is_base64 = parts.any(|p| p.eq_ignore_ascii_case("base64"));
    (media_type, is_base64)
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, DataUrlError> {
    let compact: String = percent_decode(payload)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| payload.to_string())
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| DataUrlError::Base64(e.to_string()))
}

// '+' is literal here, unlike form encoding
fn percent_decode(input: &str) -> Result<Vec<u8>, DataUrlError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3).ok_or(DataUrlError::PercentEscape(i))?;
            let value = std::str::from_utf8(hex)
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or(DataUrlError::PercentEscape(i))?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}
