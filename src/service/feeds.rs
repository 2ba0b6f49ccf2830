use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::fetch::FetchQueue;
use super::FeedsError;
use crate::config::Config;
use crate::connector::{build_http_client, ConnectorProperties};
use crate::feed::{self, FeedMetadata, OpmlFeed};
use crate::storage::{Connector, ConnectorSettings, ConnectorType, Database, NewConnector};

/// Concurrent subscriptions while importing OPML.
const IMPORT_CONCURRENCY: usize = 4;

/// What a feed URL looks like before (or without) subscribing to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviewFeedsInfo {
    pub feed_url: String,
    pub site_link: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_favicon_url: Option<String>,
    pub subscribed: bool,
}

/// The user-editable settings of an RSS connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedsSetting {
    pub connector_id: i64,
    pub name: Option<String>,
    pub enabled: bool,
    pub crawl_full_content: bool,
    /// `None` and `Some(0)` both mean "no folder"
    pub folder_id: Option<i64>,
    pub subscribe_url: Option<String>,
    pub fetch_interval_minutes: i64,
}

/// How a follow request will be persisted, decided before touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeCommand {
    /// The URL is new: insert a connector and trigger its first fetch.
    Create(NewConnector),
    /// Already subscribed: refresh the display name and icon only.
    Update {
        id: i64,
        name: Option<String>,
        icon_url: Option<String>,
    },
}

impl SubscribeCommand {
    pub fn decide(
        existing: Option<&Connector>,
        subscribe_url: &str,
        preview: &PreviewFeedsInfo,
        now: i64,
    ) -> Self {
        match existing {
            Some(connector) => SubscribeCommand::Update {
                id: connector.id,
                name: preview.title.clone(),
                icon_url: preview.site_favicon_url.clone(),
            },
            None => SubscribeCommand::Create(NewConnector {
                connector_type: ConnectorType::Rss,
                subscribe_url: Some(subscribe_url.to_owned()),
                name: preview.title.clone(),
                icon_url: preview.site_favicon_url.clone(),
                enabled: true,
                crawl_full_content: false,
                display_sequence: 1,
                inbox_count: 0,
                created_at: now,
            }),
        }
    }
}

/// Outcome of an OPML import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub subscribed: usize,
    pub failed: usize,
}

/// Feed subscriptions: preview, follow, settings and deletion.
#[derive(Clone)]
pub struct FeedsService {
    db: Database,
    config: Config,
    fetch_queue: FetchQueue,
}

impl FeedsService {
    pub fn new(db: Database, config: Config, fetch_queue: FetchQueue) -> Self {
        Self {
            db,
            config,
            fetch_queue,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ========================================================================
    // Preview and Follow
    // ========================================================================

    /// Look a feed up without persisting anything.
    ///
    /// The icon is the site's favicon, found through its home page; the
    /// feed's own image is used only when the site has none.
    ///
    /// Fetch, parse and favicon failures are logged and leave the
    /// corresponding fields empty; only store and client-construction
    /// errors are returned.
    pub async fn preview_feeds(&self, subscribe_url: &str) -> Result<PreviewFeedsInfo, FeedsError> {
        let proxy = self.db.get_proxy_setting().await?;
        let client = build_http_client(&ConnectorProperties {
            subscribe_url: Some(subscribe_url.to_owned()),
            proxy,
            timeout: self.config.fetch_timeout(),
            allow_private_hosts: self.config.allow_private_hosts,
            max_retries: 0,
        })?;

        let metadata = match feed::fetch_feed_metadata(
            &client,
            subscribe_url,
            self.config.allow_private_hosts,
        )
        .await
        {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(url = %subscribe_url, error = %e, "Failed to read feed for preview");
                FeedMetadata::default()
            }
        };

        let mut info = PreviewFeedsInfo {
            feed_url: subscribe_url.to_owned(),
            site_link: metadata.site_link,
            title: metadata.title,
            description: metadata.description,
            site_favicon_url: None,
            subscribed: false,
        };

        if let Some(connector) = self
            .db
            .get_connector_by_subscribe_url(subscribe_url, ConnectorType::Rss)
            .await?
        {
            info.subscribed = true;
            info.title = connector.name;
        }

        if let Some(site_link) = info.site_link.as_deref() {
            match feed::favicon_from_home(&client, site_link, self.config.allow_private_hosts).await
            {
                Ok(icon) => info.site_favicon_url = icon,
                Err(e) => {
                    tracing::debug!(site = %site_link, error = %e, "No favicon for site");
                }
            }
        }
        // Fall back to the feed's own image.
        if info.site_favicon_url.as_deref().map_or(true, |s| s.trim().is_empty()) {
            info.site_favicon_url = metadata.icon;
        }

        Ok(info)
    }

    /// Subscribe to a feed URL. Following an already-subscribed URL only
    /// refreshes its name and icon; a new subscription is fetched once
    /// immediately, in the background.
    pub async fn follow_feed(&self, subscribe_url: &str) -> Result<Connector, FeedsError> {
        let preview = self.preview_feeds(subscribe_url).await?;
        let existing = self
            .db
            .get_connector_by_subscribe_url(subscribe_url, ConnectorType::Rss)
            .await?;
        let command = SubscribeCommand::decide(
            existing.as_ref(),
            subscribe_url,
            &preview,
            chrono::Utc::now().timestamp(),
        );

        match command {
            SubscribeCommand::Update { id, name, icon_url } => {
                let connector = self
                    .db
                    .update_connector_identity(id, name.as_deref(), icon_url.as_deref())
                    .await?;
                tracing::debug!(connector_id = id, url = %subscribe_url, "Feed already followed");
                Ok(connector)
            }
            SubscribeCommand::Create(new) => {
                let connector = self.db.insert_connector(&new).await?;
                tracing::info!(
                    connector_id = connector.id,
                    url = %subscribe_url,
                    "Followed feed"
                );
                self.fetch_queue.fetch_pages_immediately(connector.id);
                Ok(connector)
            }
        }
    }

    // ========================================================================
    // Settings and Deletion
    // ========================================================================

    async fn require_one_feed_connector(&self, id: i64) -> Result<Connector, FeedsError> {
        match self.db.get_connector(id).await? {
            Some(connector) if connector.connector_type == ConnectorType::Rss => Ok(connector),
            _ => Err(FeedsError::NotFound(id)),
        }
    }

    pub async fn get_feeds_setting(&self, id: i64) -> Result<FeedsSetting, FeedsError> {
        let connector = self.require_one_feed_connector(id).await?;
        let interval_seconds = connector
            .fetch_interval_seconds
            .unwrap_or(self.config.default_feed_fetch_interval_seconds);

        Ok(FeedsSetting {
            connector_id: connector.id,
            name: connector.name,
            enabled: connector.enabled,
            crawl_full_content: connector.crawl_full_content,
            folder_id: connector.folder_id,
            subscribe_url: connector.subscribe_url,
            fetch_interval_minutes: interval_seconds / 60,
        })
    }

    /// Apply new settings. A folder change is carried over to every page of
    /// the connector.
    pub async fn update_feeds_setting(&self, setting: &FeedsSetting) -> Result<Connector, FeedsError> {
        let current = self.require_one_feed_connector(setting.connector_id).await?;
        let folder_id = setting.folder_id.filter(|id| *id != 0);

        let updated = self
            .db
            .update_connector_settings(
                current.id,
                &ConnectorSettings {
                    name: setting.name.clone(),
                    enabled: setting.enabled,
                    crawl_full_content: setting.crawl_full_content,
                    subscribe_url: setting.subscribe_url.clone(),
                    folder_id,
                    fetch_interval_seconds: Some(setting.fetch_interval_minutes.saturating_mul(60)),
                },
            )
            .await?;

        if current.folder_id != folder_id {
            let moved = self
                .db
                .update_pages_folder_by_connector(current.id, folder_id)
                .await?;
            tracing::debug!(connector_id = current.id, folder_id = ?folder_id, moved, "Moved pages to folder");
        }

        Ok(updated)
    }

    /// Delete an RSS connector together with its pages.
    pub async fn delete(&self, id: i64) -> Result<(), FeedsError> {
        let connector = self.require_one_feed_connector(id).await?;
        let pages = self.db.delete_connector_with_pages(connector.id).await?;
        tracing::info!(connector_id = id, pages, "Deleted feed connector");
        Ok(())
    }

    // ========================================================================
    // OPML
    // ========================================================================

    /// Follow every feed of an OPML file. Feeds inside a folder outline are
    /// filed into the folder of that name, which is created when missing.
    /// Individual failures are logged and counted, never fatal.
    pub async fn import_opml(&self, path: &Path) -> Result<ImportSummary, FeedsError> {
        let feeds = feed::read_opml_file(path).await?;
        let mut summary = ImportSummary {
            total: feeds.len(),
            ..ImportSummary::default()
        };

        let results: Vec<(OpmlFeed, Result<Connector, FeedsError>)> = stream::iter(feeds)
            .map(|opml| async move {
                let result = self.follow_feed(&opml.xml_url).await;
                (opml, result)
            })
            .buffer_unordered(IMPORT_CONCURRENCY)
            .collect()
            .await;

        // Folders are resolved sequentially so concurrent imports of the
        // same folder name cannot create duplicates.
        for (opml, result) in results {
            let connector = match result {
                Ok(connector) => connector,
                Err(e) => {
                    tracing::warn!(url = %opml.xml_url, error = %e, "Failed to import feed");
                    summary.failed += 1;
                    continue;
                }
            };
            if let Err(e) = self.apply_opml_outline(&connector, &opml).await {
                tracing::warn!(url = %opml.xml_url, error = %e, "Failed to file imported feed");
            }
            summary.subscribed += 1;
        }

        tracing::info!(
            total = summary.total,
            subscribed = summary.subscribed,
            failed = summary.failed,
            "OPML import finished"
        );
        Ok(summary)
    }

    /// File an imported connector into its outline's folder, and name it after
    /// the outline when the feed itself had no title.
    async fn apply_opml_outline(&self, connector: &Connector, opml: &OpmlFeed) -> Result<(), FeedsError> {
        let folder_id = match opml.folder.as_deref() {
            Some(name) => Some(match self.db.get_folder_by_name(name).await? {
                Some(folder) => folder.id,
                None => self.db.create_folder(name).await?,
            }),
            None => None,
        };
        let missing_name = connector.name.is_none() && opml.title.is_some();
        if folder_id.is_none() && !missing_name {
            return Ok(());
        }

        let mut setting = self.get_feeds_setting(connector.id).await?;
        if folder_id.is_some() {
            setting.folder_id = folder_id;
        }
        if missing_name {
            setting.name = opml.title.clone();
        }
        self.update_feeds_setting(&setting).await?;
        Ok(())
    }

    /// Write every RSS subscription to an OPML file, grouped by folder.
    /// Returns the number of feeds written.
    pub async fn export_opml(&self, path: &Path) -> Result<usize, FeedsError> {
        let folders: HashMap<i64, String> = self
            .db
            .get_folders()
            .await?
            .into_iter()
            .map(|f| (f.id, f.name))
            .collect();

        let feeds: Vec<OpmlFeed> = self
            .db
            .list_connectors(Some(ConnectorType::Rss))
            .await?
            .into_iter()
            .filter_map(|c| {
                Some(OpmlFeed {
                    title: c.name,
                    xml_url: c.subscribe_url?,
                    html_url: None,
                    folder: c.folder_id.and_then(|id| folders.get(&id).cloned()),
                })
            })
            .collect();

        feed::export_to_file(&feeds, path).await?;
        tracing::info!(path = %path.display(), feeds = feeds.len(), "Exported OPML");
        Ok(feeds.len())
    }
}
