//! Relay delivery: post a category's URLs through a webhook under the
//! original author's identity.

use std::time::Duration;

use tracing::debug;

use crate::common::error::RelayError;
use crate::common::types::Author;
use crate::relay::platform::{RelayPayload, SharedPlatform};
use crate::relay::with_timeout;

/// Discord's message content limit.
pub const MAX_CONTENT_LEN: usize = 2000;

fn floor_char_boundary(s: &str, byte_index: usize) -> usize {
    if byte_index >= s.len() {
        return s.len();
    }
    let mut i = byte_index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Split newline-joined content into chunks of at most `max_len` bytes.
///
/// Splits between lines where possible so a URL stays intact. A single line
/// longer than the limit is hard-split on a char boundary.
pub fn split_content(content: &str, max_len: usize) -> Vec<String> {
    if content.len() <= max_len {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = content;

    while !remaining.is_empty() {
        remaining = remaining.trim_start_matches('\n');
        if remaining.is_empty() {
            break;
        }

        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let split_at = floor_char_boundary(remaining, max_len);
        if split_at == 0 {
            let first_char_end = remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
            chunks.push(remaining[..first_char_end].to_string());
            remaining = &remaining[first_char_end..];
            continue;
        }

        // Include the byte at `split_at` so a newline right at the limit counts.
        let window_end = floor_char_boundary(remaining, split_at + 1);
        match remaining[..window_end].rfind('\n') {
            Some(newline) if newline > 0 => {
                chunks.push(remaining[..newline].to_string());
                remaining = &remaining[newline + 1..];
            }
            _ => {
                chunks.push(remaining[..split_at].to_string());
                remaining = &remaining[split_at..];
            }
        }
    }

    chunks
}

/// A delivery that stopped at a failed chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFailure {
    /// Messages posted before the failure.
    pub chunks_sent: usize,
    pub error: RelayError,
}

/// Posts link batches through relay endpoints.
#[derive(Clone)]
pub struct Dispatcher {
    platform: SharedPlatform,
    max_len: usize,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(platform: SharedPlatform, call_timeout: Duration) -> Self {
        Self {
            platform,
            max_len: MAX_CONTENT_LEN,
            call_timeout,
        }
    }

    /// Deliver one category's URLs, one line each, as one or more messages.
    /// Returns the number of messages posted.
    ///
    /// Stops at the first failed chunk. A `NotFound` error means the webhook
    /// no longer exists.
    pub async fn deliver(
        &self,
        webhook_url: &str,
        urls: &[String],
        author: &Author,
    ) -> Result<usize, DeliveryFailure> {
        let content = urls.join("\n");
        let chunks = split_content(&content, self.max_len);
        debug!("Delivering {} urls in {} message(s)", urls.len(), chunks.len());

        let mut chunks_sent = 0;
        for chunk in chunks {
            let payload = RelayPayload {
                content: chunk,
                username: author.display_name.clone(),
                avatar_url: author.avatar_url.clone(),
            };
            let call = self.platform.execute_relay(webhook_url, &payload);
            if let Err(error) = with_timeout(self.call_timeout, "delivering links", call).await {
                return Err(DeliveryFailure { chunks_sent, error });
            }
            chunks_sent += 1;
        }
        Ok(chunks_sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::relay::testing::{test_author, FakePlatform};

    fn dispatcher(platform: &Arc<FakePlatform>) -> Dispatcher {
        Dispatcher::new(platform.clone(), Duration::from_secs(5))
    }

    fn long_batch(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("https://github.com/org/repo-{:03}/blob/main/README.md", i))
            .collect()
    }

    #[test]
    fn test_split_content_short() {
        assert_eq!(split_content("a\nb", 50), vec!["a\nb"]);
    }

    #[test]
    fn test_split_content_on_line_boundary() {
        let chunks = split_content("aaaa\nbbbb\ncccc", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_split_content_newline_at_limit() {
        let chunks = split_content("aaaa\nbbbb", 4);
        assert_eq!(chunks, vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn test_split_content_hard_splits_long_line() {
        let chunks = split_content("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_split_content_respects_char_boundary() {
        let chunks = split_content("ééé", 3);
        assert!(chunks.iter().all(|c| c.len() <= 3));
        assert_eq!(chunks.concat(), "ééé");
    }

    #[test]
    fn test_split_content_chunks_within_limit() {
        let urls: Vec<String> = (0..100)
            .map(|i| format!("https://github.com/org/repo-{:03}/blob/main/README.md", i))
            .collect();
        let content = urls.join("\n");
        let chunks = split_content(&content, MAX_CONTENT_LEN);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= MAX_CONTENT_LEN));
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.lines()).collect();
        assert_eq!(rejoined, urls.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_deliver_uses_author_identity() {
        let platform = Arc::new(FakePlatform::new());
        let urls = vec!["https://a.example".to_string(), "https://b.example".to_string()];

        let sent = dispatcher(&platform)
            .deliver("https://hook", &urls, &test_author())
            .await
            .unwrap();
        assert_eq!(sent, 1);

        let deliveries = platform.deliveries();
        assert_eq!(deliveries.len(), 1);
        let (url, payload) = &deliveries[0];
        assert_eq!(url, "https://hook");
        assert_eq!(payload.content, "https://a.example\nhttps://b.example");
        assert_eq!(payload.username, test_author().display_name);
        assert_eq!(payload.avatar_url, test_author().avatar_url);
    }

    #[tokio::test]
    async fn test_deliver_propagates_not_found() {
        let platform = Arc::new(FakePlatform::new());
        platform.fail_execute("https://gone", RelayError::not_found("webhook"));

        let failure = dispatcher(&platform)
            .deliver("https://gone", &["https://a.example".to_string()], &test_author())
            .await
            .unwrap_err();
        assert_eq!(failure.chunks_sent, 0);
        assert!(failure.error.is_not_found());
        assert!(platform.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_reports_chunks_sent_before_failure() {
        let platform = Arc::new(FakePlatform::new());
        platform.fail_execute_after("https://hook", 1, RelayError::transport("rate limited"));

        let failure = dispatcher(&platform)
            .deliver("https://hook", &long_batch(60), &test_author())
            .await
            .unwrap_err();
        assert_eq!(failure.chunks_sent, 1);
        assert!(matches!(failure.error, RelayError::Transport { .. }));
        assert_eq!(platform.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn test_deliver_bounds_each_chunk_separately() {
        let platform = Arc::new(FakePlatform::new());
        platform.slow_calls(Duration::from_millis(60));
        let dispatcher = Dispatcher::new(platform.clone(), Duration::from_millis(120));

        // Three chunks take longer together than one call is allowed.
        let sent = dispatcher
            .deliver("https://hook", &long_batch(100), &test_author())
            .await
            .unwrap();
        assert!(sent >= 3);
        assert_eq!(platform.deliveries().len(), sent);
    }

    #[tokio::test]
    async fn test_deliver_times_out_slow_call() {
        let platform = Arc::new(FakePlatform::new());
        platform.slow_calls(Duration::from_secs(5));
        let dispatcher = Dispatcher::new(platform.clone(), Duration::from_millis(20));

        let failure = dispatcher
            .deliver("https://hook", &["https://a.example".to_string()], &test_author())
            .await
            .unwrap_err();
        assert_eq!(failure.chunks_sent, 0);
        assert!(failure.error.to_string().contains("Timed out"));
    }
}
