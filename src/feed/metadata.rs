use crate::util::{clean_text, validate_feed_url};

use super::fetcher::{fetch_bytes, FetchError};
use super::html::resolve_url;

/// Channel-level information about a feed, read without storing anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedMetadata {
    pub title: Option<String>,
    /// Home page of the site publishing the feed
    pub site_link: Option<String>,
    pub description: Option<String>,
    /// Icon or logo the feed declares for itself. Often a banner, so
    /// preview prefers the site favicon over it.
    pub icon: Option<String>,
}

/// Fetch `url` once (no retries) and parse its channel metadata.
pub async fn fetch_feed_metadata(
    client: &reqwest::Client,
    url: &str,
    allow_private_hosts: bool,
) -> Result<FeedMetadata, FetchError> {
    let validated = validate_feed_url(url, allow_private_hosts)?;
    let bytes = fetch_bytes(client, &validated, 0).await?;
    parse_feed_metadata(&bytes, validated.as_str())
}

/// Parse channel metadata from feed bytes.
///
/// The site link is the first non-self link of the feed, preferring
/// `rel="alternate"`, resolved against `feed_url`.
pub fn parse_feed_metadata(bytes: &[u8], feed_url: &str) -> Result<FeedMetadata, FetchError> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    let title = feed.title.and_then(|t| clean_text(&t.content));
    let description = feed.description.and_then(|d| clean_text(&d.content));
    let icon = feed
        .icon
        .or(feed.logo)
        .and_then(|image| resolve_url(&image.uri, feed_url));

    let candidates = feed
        .links
        .iter()
        .filter(|link| link.rel.as_deref() != Some("self"))
        .filter_map(|link| {
            let resolved = resolve_url(&link.href, feed_url)?;
            (resolved != feed_url).then_some((link.rel.as_deref() == Some("alternate"), resolved))
        });
    let mut site_link = None;
    for (is_alternate, href) in candidates {
        if is_alternate {
            site_link = Some(href);
            break;
        }
        site_link.get_or_insert(href);
    }

    Ok(FeedMetadata {
        title,
        site_link,
        description,
        icon,
    })
}
