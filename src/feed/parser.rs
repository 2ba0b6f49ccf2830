use crate::storage::FetchedPage;
use crate::util::clean_text;
use sha2::{Digest, Sha256};

use super::FetchError;

/// Entries of a parsed feed plus the number dropped for having no usable
/// identity (no id, link or title).
#[derive(Debug, Default)]
pub struct ParseResult {
    pub pages: Vec<FetchedPage>,
    pub skipped: usize,
}

/// Parse RSS, Atom or JSON Feed bytes into pages ready for storage.
///
/// Relative entry links are resolved against `feed_url`. Titles are cleaned
/// of control characters; entries without a title get "Untitled".
pub fn parse_entries(bytes: &[u8], feed_url: &str) -> Result<ParseResult, FetchError> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
    let mut result = ParseResult::default();

    for entry in feed.entries {
        let url = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
            .or_else(|| entry.links.first())
            .and_then(|l| super::html::resolve_url(&l.href, feed_url));
        let published = entry.published.or(entry.updated).map(|dt| dt.timestamp());
        let title = entry.title.and_then(|t| clean_text(&t.content));
        let description = entry.summary.map(|s| s.content).filter(|s| !s.trim().is_empty());
        let content = entry.content.and_then(|c| c.body).filter(|s| !s.trim().is_empty());
        let author = entry.authors.first().and_then(|a| clean_text(&a.name));

        if entry.id.trim().is_empty() && url.is_none() && title.is_none() {
            result.skipped += 1;
            continue;
        }

        let guid = generate_guid(&entry.id, url.as_deref(), title.as_deref(), published);
        result.pages.push(FetchedPage {
            guid,
            url,
            title: title.unwrap_or_else(|| "Untitled".to_string()),
            description,
            content,
            author,
            published,
        });
    }

    Ok(result)
}

/// The entry's own id when present, else a SHA-256 of link, title and date.
fn generate_guid(
    existing: &str,
    url: Option<&str>,
    title: Option<&str>,
    published: Option<i64>,
) -> String {
    let trimmed = existing.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    let input = format!(
        "{}|{}|{}",
        url.unwrap_or(""),
        title.unwrap_or(""),
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
