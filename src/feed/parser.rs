use std::sync::Arc;

use anyhow::Result;
use feed_rs::parser;
use url::Url;

/// One entry of a parsed feed document.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub title: Arc<str>,
    pub link: Url,
}

/// An ordered batch of parsed remote items.
///
/// Produced wholly or not at all: a document that fails to parse yields an
/// error, never a partial item list.
#[derive(Debug, Clone, Default)]
pub struct FeedDocument {
    pub items: Vec<FeedItem>,
}

/// Result of parsing one document.
pub struct ParseOutcome {
    pub document: FeedDocument,
    /// Entries dropped for lacking a parseable link
    pub skipped: usize,
}

/// Parse a feed document (RSS or Atom) into an ordered item list.
///
/// Item order follows document order. Entries without a parseable link are
/// skipped and counted rather than failing the whole document.
pub fn parse_document(bytes: &[u8]) -> Result<ParseOutcome> {
    let feed = parser::parse(bytes)?;

    let mut items = Vec::with_capacity(feed.entries.len());
    let mut skipped = 0usize;
    for entry in feed.entries {
        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());
        let link = entry
            .links
            .first()
            .and_then(|link| Url::parse(&link.href).ok());

        match link {
            Some(link) => items.push(FeedItem {
                title: Arc::from(title),
                link,
            }),
            None => skipped += 1,
        }
    }

    Ok(ParseOutcome {
        document: FeedDocument { items },
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>News</title>
    <item><title>First</title><link>https://example.com/1</link></item>
    <item><title>Second</title><link>https://example.com/2</link></item>
    <item><title>Third</title><link>https://example.com/3</link></item>
</channel></rss>"#;

    #[test]
    fn items_preserve_document_order() {
        let outcome = parse_document(RSS.as_bytes()).unwrap();
        let titles: Vec<&str> = outcome
            .document
            .items
            .iter()
            .map(|item| item.title.as_ref())
            .collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn atom_documents_parse_too() {
        let atom = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom"><title>News</title>
    <entry><title>Only</title><link href="https://example.com/a"/><id>a</id></entry>
</feed>"#;
        let outcome = parse_document(atom.as_bytes()).unwrap();
        assert_eq!(outcome.document.items.len(), 1);
        assert_eq!(outcome.document.items[0].link.as_str(), "https://example.com/a");
    }

    #[test]
    fn entries_without_links_are_skipped_not_fatal() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>Linked</title><link>https://example.com/1</link></item>
    <item><title>Linkless</title></item>
</channel></rss>"#;
        let outcome = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(outcome.document.items.len(), 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(parse_document(b"<not valid xml").is_err());
    }
}
