use crate::traits::ItemExtractor;
use crate::types::{FeedItem, RelayError, Result};
use feed_rs::parser;
use tracing::debug;

/// Extracts the newest (first) entry of an RSS or Atom document.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }
}

impl ItemExtractor for FeedParser {
    fn extract(&self, body: &str) -> Result<FeedItem> {
        debug!("Parsing feed content ({} bytes)", body.len());

        let feed = parser::parse(body.as_bytes())
            .map_err(|e| RelayError::Parse(format!("Failed to parse feed: {}", e)))?;

        let entry = feed
            .entries
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::Parse("feed has no entries".to_string()))?;

        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RelayError::Parse("newest entry has no title".to_string()))?;

        let link = entry
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| RelayError::Parse("newest entry has no link".to_string()))?;

        let id = if entry.id.trim().is_empty() {
            link.clone()
        } else {
            entry.id.trim().to_string()
        };

        Ok(FeedItem { title, link, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Demo</title><link>https://example.com</link><description>d</description>
<item><title>Newest story</title><link>https://example.com/2</link><guid>g2</guid></item>
<item><title>Older story</title><link>https://example.com/1</link><guid>g1</guid></item>
</channel></rss>"#;

    #[test]
    fn extracts_first_item() {
        let item = FeedParser::new().extract(RSS).unwrap();
        assert_eq!(item.title, "Newest story");
        assert_eq!(item.link, "https://example.com/2");
        assert_eq!(item.id, "g2");
    }

    #[test]
    fn empty_channel_is_a_parse_failure() {
        let body = r#"<rss version="2.0"><channel><title>Demo</title></channel></rss>"#;
        assert!(matches!(FeedParser::new().extract(body), Err(RelayError::Parse(_))));
    }

    #[test]
    fn garbage_is_a_parse_failure() {
        assert!(matches!(FeedParser::new().extract("not xml at all"), Err(RelayError::Parse(_))));
    }
}
