//! Typewriter reveal of the explanation text
//!
//! Presentation only: one more character per tick until the whole text is
//! shown. Nothing in the flow waits on it.

use futures::stream::Stream;
use std::time::Duration;

/// Tick used by the result card
pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(30);

/// Successively longer prefixes of `text`, one per `interval`
///
/// Splits on `char` boundaries. Ends after yielding the full text; an empty
/// text yields nothing.
pub fn reveal(text: String, interval: Duration) -> impl Stream<Item = String> {
    async_stream::stream! {
        let mut ticker = tokio::time::interval(interval);
        let ends = text
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .collect::<Vec<_>>();

        for end in ends {
            ticker.tick().await;
            yield text[..end].to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_prefixes_in_order() {
        let frames: Vec<String> = reveal("Mild".to_string(), Duration::from_millis(1)).collect().await;
        assert_eq!(frames, vec!["M", "Mi", "Mil", "Mild"]);
    }

    #[tokio::test]
    async fn test_multibyte_boundaries() {
        let frames: Vec<String> = reveal("📊 ok".to_string(), Duration::from_millis(1)).collect().await;
        assert_eq!(frames.first().map(String::as_str), Some("📊"));
        assert_eq!(frames.last().map(String::as_str), Some("📊 ok"));
        assert_eq!(frames.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_text() {
        let frames: Vec<String> = reveal(String::new(), Duration::from_millis(1)).collect().await;
        assert!(frames.is_empty());
    }
}
