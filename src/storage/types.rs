use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The database is locked by another gather process. Close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A connector row carries a type code this build does not know
    #[error("Unknown connector type code: {0}")]
    UnknownConnectorType(i64),

    /// A folder name was empty after sanitizing
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map lock-related SQLite failures to [`DatabaseError::InstanceLocked`].
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED and SQLITE_CANTOPEN all surface through the message text.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Connector
// ============================================================================

/// Kind of source a connector pulls content from, stored as an integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    /// RSS/Atom feed subscription
    Rss,
    /// Pages pushed by the browser capture extension
    Capture,
}

impl ConnectorType {
    pub const fn code(self) -> i64 {
        match self {
            ConnectorType::Rss => 1,
            ConnectorType::Capture => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ConnectorType::Rss),
            2 => Some(ConnectorType::Capture),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorType::Rss => f.write_str("rss"),
            ConnectorType::Capture => f.write_str("capture"),
        }
    }
}

/// Column list shared by every query that materializes a [`Connector`].
pub(crate) const CONNECTOR_COLUMNS: &str = "id, type AS connector_type, subscribe_url, name, \
     icon_url, enabled, crawl_full_content, display_sequence, folder_id, \
     fetch_interval_seconds, inbox_count, created_at, last_fetched, error";

/// Raw `connectors` row; converted with [`ConnectorDbRow::into_connector`]
/// so an unknown type code becomes an error instead of a panic.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ConnectorDbRow {
    pub id: i64,
    pub connector_type: i64,
    pub subscribe_url: Option<String>,
    pub name: Option<String>,
    pub icon_url: Option<String>,
    pub enabled: bool,
    pub crawl_full_content: bool,
    pub display_sequence: i64,
    pub folder_id: Option<i64>,
    pub fetch_interval_seconds: Option<i64>,
    pub inbox_count: i64,
    pub created_at: i64,
    pub last_fetched: Option<i64>,
    pub error: Option<String>,
}

impl ConnectorDbRow {
    pub(crate) fn into_connector(self) -> Result<Connector, DatabaseError> {
        let connector_type = ConnectorType::from_code(self.connector_type)
            .ok_or(DatabaseError::UnknownConnectorType(self.connector_type))?;
        Ok(Connector {
            id: self.id,
            connector_type,
            subscribe_url: self.subscribe_url,
            name: self.name,
            icon_url: self.icon_url,
            enabled: self.enabled,
            crawl_full_content: self.crawl_full_content,
            display_sequence: self.display_sequence,
            folder_id: self.folder_id,
            fetch_interval_seconds: self.fetch_interval_seconds,
            inbox_count: self.inbox_count,
            created_at: self.created_at,
            last_fetched: self.last_fetched,
            error: self.error,
        })
    }
}

/// A configured content source as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connector {
    pub id: i64,
    pub connector_type: ConnectorType,
    /// Feed URL; required for RSS connectors, unique per type
    pub subscribe_url: Option<String>,
    pub name: Option<String>,
    pub icon_url: Option<String>,
    pub enabled: bool,
    pub crawl_full_content: bool,
    pub display_sequence: i64,
    /// Never `Some(0)`: zero is normalized to `None` before it is written
    pub folder_id: Option<i64>,
    /// `None` falls back to the configured default interval
    pub fetch_interval_seconds: Option<i64>,
    pub inbox_count: i64,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds of the last successful fetch
    pub last_fetched: Option<i64>,
    /// Message of the last failed fetch, cleared on success
    pub error: Option<String>,
}

/// Values for a connector row that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConnector {
    pub connector_type: ConnectorType,
    pub subscribe_url: Option<String>,
    pub name: Option<String>,
    pub icon_url: Option<String>,
    pub enabled: bool,
    pub crawl_full_content: bool,
    pub display_sequence: i64,
    pub inbox_count: i64,
    pub created_at: i64,
}

/// The user-editable subset of a connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSettings {
    pub name: Option<String>,
    pub enabled: bool,
    pub crawl_full_content: bool,
    pub subscribe_url: Option<String>,
    pub folder_id: Option<i64>,
    pub fetch_interval_seconds: Option<i64>,
}

// ============================================================================
// Pages
// ============================================================================

/// A page fetched from a source but not stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub guid: String,
    pub url: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published: Option<i64>,
}

/// Stored page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Page {
    pub id: i64,
    pub connector_id: Option<i64>,
    pub folder_id: Option<i64>,
    pub guid: String,
    pub url: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published: Option<i64>,
    pub fetched_at: i64,
}

// ============================================================================
// Folders & Settings
// ============================================================================

/// User-defined grouping for connectors and, through them, pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub display_sequence: i64,
}

/// Global outbound proxy applied to every HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySetting {
    pub host: String,
    pub port: u16,
}

impl ProxySetting {
    /// Proxy URL in the form reqwest expects.
    pub fn url(&self) -> String {
        if self.host.contains("://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_type_codes_roundtrip() {
        for ty in [ConnectorType::Rss, ConnectorType::Capture] {
            assert_eq!(ConnectorType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(ConnectorType::from_code(0), None);
        assert_eq!(ConnectorType::from_code(99), None);
    }

    #[test]
    fn test_unknown_type_code_is_an_error() {
        let row = ConnectorDbRow {
            id: 1,
            connector_type: 42,
            subscribe_url: None,
            name: None,
            icon_url: None,
            enabled: true,
            crawl_full_content: false,
            display_sequence: 1,
            folder_id: None,
            fetch_interval_seconds: None,
            inbox_count: 0,
            created_at: 0,
            last_fetched: None,
            error: None,
        };
        assert!(matches!(
            row.into_connector(),
            Err(DatabaseError::UnknownConnectorType(42))
        ));
    }

    #[test]
    fn test_proxy_url_adds_scheme() {
        let proxy = ProxySetting {
            host: "127.0.0.1".to_string(),
            port: 7890,
        };
        assert_eq!(proxy.url(), "http://127.0.0.1:7890");

        let socks = ProxySetting {
            host: "socks5://proxy.lan".to_string(),
            port: 1080,
        };
        assert_eq!(socks.url(), "socks5://proxy.lan:1080");
    }

    #[test]
    fn test_lock_messages_detected() {
        assert!(is_lock_message("error returned from database: database is locked"));
        assert!(is_lock_message("SQLITE_BUSY"));
        assert!(!is_lock_message("no such table: connectors"));
    }
}
