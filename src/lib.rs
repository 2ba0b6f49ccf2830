//! gather: feed connectors, subscriptions and a local page store.
//!
//! - [`storage`] - SQLite persistence for connectors, pages, folders and settings
//! - [`feed`] - HTTP fetching, feed parsing, favicon lookup and OPML
//! - [`connector`] - per-source fetch behavior selected by connector type
//! - [`service`] - the feeds service and the immediate-fetch worker
//! - [`config`] - optional TOML configuration

pub mod config;
pub mod connector;
pub mod feed;
pub mod service;
pub mod storage;
pub mod util;
