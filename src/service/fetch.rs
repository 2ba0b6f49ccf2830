//! Immediate fetch: a bounded queue of connector ids and the worker task
//! that drains it.

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::connector::{ConnectorError, ConnectorProperties, SourceConnector};
use crate::storage::{Database, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub connector_id: i64,
}

/// Cloneable handle for requesting an out-of-band fetch of one connector.
///
/// Requests never block the caller: when the queue is full or the worker has
/// stopped, the request is logged and dropped.
#[derive(Debug, Clone)]
pub struct FetchQueue {
    tx: mpsc::Sender<FetchRequest>,
}

impl FetchQueue {
    /// Create a queue holding at most `capacity` pending requests.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<FetchRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue a fetch of `connector_id`. Returns whether it was accepted.
    pub fn fetch_pages_immediately(&self, connector_id: i64) -> bool {
        match self.tx.try_send(FetchRequest { connector_id }) {
            Ok(()) => {
                tracing::debug!(connector_id, "Queued immediate fetch");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connector_id, "Fetch queue full, dropping immediate fetch");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(connector_id, "Fetch worker stopped, dropping immediate fetch");
                false
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchJobError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

/// Fetch the newest pages of one connector and store them.
///
/// Returns `Ok(None)` when the connector is missing or disabled, otherwise
/// the number of newly stored pages. With `crawl_full_content` set, only
/// pages not yet stored are crawled, `page_content_concurrency` at a time;
/// a page whose crawl fails is stored with its feed content.
pub async fn fetch_connector_pages(
    db: &Database,
    config: &Config,
    connector_id: i64,
) -> Result<Option<usize>, FetchJobError> {
    let Some(connector) = db.get_connector(connector_id).await? else {
        tracing::debug!(connector_id, "Connector gone before fetch, skipping");
        return Ok(None);
    };
    if !connector.enabled {
        tracing::debug!(connector_id, "Connector disabled, skipping fetch");
        return Ok(None);
    }

    let proxy = db.get_proxy_setting().await?;
    let properties = ConnectorProperties::for_connector(
        &connector,
        proxy,
        config.fetch_timeout(),
        config.allow_private_hosts,
    );
    let source = SourceConnector::new(connector.connector_type, properties)?;

    let mut pages = source.fetch_newest_pages().await?;

    if connector.crawl_full_content && !pages.is_empty() {
        let known = db.get_page_guids(connector_id).await?;
        pages.retain(|p| !known.contains(&p.guid));

        let source = &source;
        pages = stream::iter(pages)
            .map(|page| async move {
                let fallback = page.clone();
                match source.fetch_page_content(page).await {
                    Ok(filled) => filled,
                    Err(e) => {
                        tracing::warn!(
                            connector_id,
                            url = ?fallback.url,
                            error = %e,
                            "Failed to fetch page content"
                        );
                        fallback
                    }
                }
            })
            .buffered(config.page_content_concurrency.max(1))
            .collect()
            .await;
    }

    let inserted = db
        .store_fetched_pages(connector_id, connector.folder_id, &pages)
        .await?;
    Ok(Some(inserted))
}

/// Spawn the worker that serves [`FetchQueue`] requests one at a time.
///
/// Failures are written to the connector's `error` column. The task ends
/// once every `FetchQueue` handle has been dropped and the queue is drained.
pub fn spawn_fetch_worker(
    db: Database,
    config: Config,
    mut rx: mpsc::Receiver<FetchRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(FetchRequest { connector_id }) = rx.recv().await {
            match fetch_connector_pages(&db, &config, connector_id).await {
                Ok(Some(inserted)) => {
                    tracing::info!(connector_id, inserted, "Fetched connector pages");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(connector_id, error = %e, "Connector fetch failed");
                    if let Err(db_err) = db.set_connector_error(connector_id, &e.to_string()).await {
                        tracing::warn!(
                            connector_id,
                            error = %db_err,
                            "Failed to record connector fetch error"
                        );
                    }
                }
            }
        }
        tracing::debug!("Fetch queue closed, worker exiting");
    })
}
