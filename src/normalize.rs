//! Content fingerprints for duplicate detection.
//!
//! Two tweets are the same content when they only differ by a retweet
//! wrapper (`"RT @name: "`) or by the short links the platform inserts,
//! since those links are re-generated every time the text is posted.

use tracing::warn;

use crate::error::NormalizeError;

const RETWEET_MARKER: &str = "RT @";
const ATTRIBUTION_SEPARATOR: &str = ": ";
const SHORT_LINK_HTTP: &str = "http://t.co";
const SHORT_LINK_HTTPS: &str = "https://t.co";
// A short link either ends the text or is followed by a space.
const SHORT_LINK_END: char = ' ';

/// Returns the canonical text of `text`: attribution wrappers and short
/// links removed, nothing else touched.
pub fn normalize(text: &str) -> Result<String, NormalizeError> {
    let mut body = strip_attribution(text)?;
    // A retweet of a retweet carries one wrapper per hop, all up front.
    while body.starts_with(RETWEET_MARKER) {
        match strip_attribution(body) {
            Ok(inner) => body = inner,
            Err(_) => break,
        }
    }
    Ok(strip_short_links(body))
}

/// Like [`normalize`], but falls back to the raw text when the attribution
/// is malformed so the item can still be matched by id.
pub fn fingerprint(text: &str) -> String {
    match normalize(text) {
        Ok(normalized) => normalized,
        Err(e) => {
            warn!(error = %e, "using raw text as fingerprint");
            text.to_string()
        }
    }
}

fn strip_attribution(text: &str) -> Result<&str, NormalizeError> {
    let Some(marker) = text.find(RETWEET_MARKER) else {
        return Ok(text);
    };
    let wrapped = &text[marker..];
    match wrapped.find(ATTRIBUTION_SEPARATOR) {
        Some(sep) => Ok(&wrapped[sep + ATTRIBUTION_SEPARATOR.len()..]),
        None => Err(NormalizeError::MalformedAttribution {
            text: text.to_string(),
        }),
    }
}

fn strip_short_links(text: &str) -> String {
    let mut text = text.to_string();
    loop {
        let http = strip_first(&text, SHORT_LINK_HTTP);
        let https = strip_first(http.as_deref().unwrap_or(&text), SHORT_LINK_HTTPS);
        match (http, https) {
            (_, Some(stripped)) | (Some(stripped), None) => text = stripped,
            (None, None) => return text,
        }
    }
}

/// Removes the first `prefix` token and its trailing separator, if any.
fn strip_first(text: &str, prefix: &str) -> Option<String> {
    let start = text.find(prefix)?;
    let (head, token) = text.split_at(start);
    match token.find(SHORT_LINK_END) {
        Some(end) => Some(format!("{head}{}", &token[end + SHORT_LINK_END.len_utf8()..])),
        None => Some(head.to_string()),
    }
}
