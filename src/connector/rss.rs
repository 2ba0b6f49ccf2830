use url::Url;

use super::{build_http_client, ConnectorError, ConnectorProperties};
use crate::feed::html::extract_main_region;
use crate::feed::{fetch_bytes, parse_entries, ParseResult};
use crate::storage::FetchedPage;
use crate::util::validate_feed_url;

/// Fetches pages from an RSS, Atom or JSON feed.
#[derive(Debug, Clone)]
pub struct RssConnector {
    client: reqwest::Client,
    feed_url: Url,
    allow_private_hosts: bool,
    max_retries: u32,
}

impl RssConnector {
    pub fn new(properties: ConnectorProperties) -> Result<Self, ConnectorError> {
        let subscribe_url = properties
            .subscribe_url
            .as_deref()
            .ok_or(ConnectorError::MissingSubscribeUrl)?;
        let feed_url = validate_feed_url(subscribe_url, properties.allow_private_hosts)
            .map_err(crate::feed::FetchError::from)?;

        Ok(Self {
            client: build_http_client(&properties)?,
            feed_url,
            allow_private_hosts: properties.allow_private_hosts,
            max_retries: properties.max_retries,
        })
    }

    /// Every entry currently in the feed document.
    pub async fn fetch_newest_pages(&self) -> Result<Vec<FetchedPage>, ConnectorError> {
        let bytes = fetch_bytes(&self.client, &self.feed_url, self.max_retries).await?;
        let ParseResult { pages, skipped } = parse_entries(&bytes, self.feed_url.as_str())?;
        if skipped > 0 {
            tracing::warn!(url = %self.feed_url, skipped, "Feed entries without identity skipped");
        }
        Ok(pages)
    }

    /// A feed only carries its current window, so this equals the newest set.
    pub async fn fetch_all_pages(&self) -> Result<Vec<FetchedPage>, ConnectorError> {
        self.fetch_newest_pages().await
    }

    /// Download the page's URL and keep its main content region.
    ///
    /// Pages without a URL are returned unchanged.
    pub async fn fetch_page_content(
        &self,
        mut page: FetchedPage,
    ) -> Result<FetchedPage, ConnectorError> {
        let Some(page_url) = page.url.as_deref() else {
            return Ok(page);
        };
        let url = validate_feed_url(page_url, self.allow_private_hosts)
            .map_err(crate::feed::FetchError::from)?;

        let bytes = fetch_bytes(&self.client, &url, self.max_retries).await?;
        let html = String::from_utf8_lossy(&bytes);
        let region = extract_main_region(&html);
        if !region.is_empty() {
            page.content = Some(region.to_owned());
        }
        Ok(page)
    }
}
