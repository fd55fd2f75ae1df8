//! URL extraction from free text.
//!
//! A URL token is any run of non-whitespace starting with `http://`,
//! `https://` or `www.` (case-insensitive). Tokens are returned verbatim:
//! no percent-decoding and no trailing punctuation stripping, so
//! `"see https://a.com."` yields `"https://a.com."`.

use std::sync::LazyLock;

use fancy_regex::Regex;
use tracing::{debug, warn};

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:https?://|www\.)\S+").expect("URL pattern is valid"));

/// Extract all URL tokens from `text`, in order of appearance.
///
/// Returns `None` when the text is empty or contains no URL, so callers can
/// bail out before touching the registry.
pub fn extract_urls(text: &str) -> Option<Vec<String>> {
    if text.is_empty() {
        return None;
    }

    let urls: Vec<String> = URL_PATTERN
        .find_iter(text)
        .filter_map(|found| match found {
            Ok(m) => Some(m.as_str().to_string()),
            Err(e) => {
                warn!("URL pattern match error: {}", e);
                None
            }
        })
        .collect();

    if urls.is_empty() {
        return None;
    }

    debug!("Extracted {} URLs from text", urls.len());
    Some(urls)
}
