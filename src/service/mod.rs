//! Application services over the store and the feed layer.
//!
//! [`FeedsService`] owns the feed-connector lifecycle: preview, follow,
//! settings and deletion. [`fetch`] holds the immediate-fetch queue and its
//! worker.

pub mod feeds;
pub mod fetch;

pub use feeds::{FeedsService, FeedsSetting, ImportSummary, PreviewFeedsInfo, SubscribeCommand};
pub use fetch::{
    fetch_connector_pages, spawn_fetch_worker, FetchJobError, FetchQueue, FetchRequest,
};

use thiserror::Error;

use crate::feed::OpmlError;
use crate::storage::DatabaseError;

#[derive(Debug, Error)]
pub enum FeedsError {
    /// No connector with this id, or it is not an RSS connector
    #[error("No feed connector with id {0}")]
    NotFound(i64),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Opml(#[from] OpmlError),
}
