//! Source connectors: the fetch side of a stored [`Connector`].
//!
//! A connector row's type code selects a [`SourceConnector`] variant; each
//! variant knows how to list its pages and fill in one page's content.

mod capture;
mod rss;

pub use capture::CaptureConnector;
pub use rss::RssConnector;

use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

use crate::feed::FetchError;
use crate::storage::{Connector, ConnectorType, FetchedPage, ProxySetting};

const USER_AGENT: &str = concat!("gather/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Connector has no subscribe URL")]
    MissingSubscribeUrl,
}

/// Everything a source connector needs besides its own row.
#[derive(Debug, Clone)]
pub struct ConnectorProperties {
    pub subscribe_url: Option<String>,
    pub proxy: Option<ProxySetting>,
    pub timeout: Duration,
    pub allow_private_hosts: bool,
    /// Retry budget for 429/5xx responses
    pub max_retries: u32,
}

impl ConnectorProperties {
    pub fn for_connector(
        connector: &Connector,
        proxy: Option<ProxySetting>,
        timeout: Duration,
        allow_private_hosts: bool,
    ) -> Self {
        Self {
            subscribe_url: connector.subscribe_url.clone(),
            proxy,
            timeout,
            allow_private_hosts,
            max_retries: crate::feed::MAX_RETRIES,
        }
    }
}

/// Build the outbound HTTP client for a connector: request timeout, optional
/// proxy for all schemes, and a bounded redirect policy with loop detection.
pub fn build_http_client(properties: &ConnectorProperties) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(redirect_policy())
        .timeout(properties.timeout)
        .connect_timeout(properties.timeout.min(Duration::from_secs(10)))
        .pool_idle_timeout(Duration::from_secs(30));

    if let Some(proxy) = &properties.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy.url())?);
    }

    builder.build()
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects");
        }
        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }
        tracing::debug!(to = %url, hop = attempt.previous().len() + 1, "Following redirect");
        attempt.follow()
    })
}

/// A fetchable source, chosen by the connector's stored type.
#[derive(Debug, Clone)]
pub enum SourceConnector {
    Rss(RssConnector),
    Capture(CaptureConnector),
}

impl SourceConnector {
    pub fn new(
        connector_type: ConnectorType,
        properties: ConnectorProperties,
    ) -> Result<Self, ConnectorError> {
        Ok(match connector_type {
            ConnectorType::Rss => SourceConnector::Rss(RssConnector::new(properties)?),
            ConnectorType::Capture => SourceConnector::Capture(CaptureConnector),
        })
    }

    /// Pages published since the last fetch. Duplicates are filtered at
    /// insert time by `(connector_id, guid)`.
    pub async fn fetch_newest_pages(&self) -> Result<Vec<FetchedPage>, ConnectorError> {
        match self {
            SourceConnector::Rss(rss) => rss.fetch_newest_pages().await,
            SourceConnector::Capture(capture) => Ok(capture.fetch_newest_pages()),
        }
    }

    /// Every page the source can still provide.
    pub async fn fetch_all_pages(&self) -> Result<Vec<FetchedPage>, ConnectorError> {
        match self {
            SourceConnector::Rss(rss) => rss.fetch_all_pages().await,
            SourceConnector::Capture(capture) => Ok(capture.fetch_all_pages()),
        }
    }

    /// Fill in the full content of one page.
    pub async fn fetch_page_content(&self, page: FetchedPage) -> Result<FetchedPage, ConnectorError> {
        match self {
            SourceConnector::Rss(rss) => rss.fetch_page_content(page).await,
            SourceConnector::Capture(capture) => Ok(capture.fetch_page_content(page)),
        }
    }
}
