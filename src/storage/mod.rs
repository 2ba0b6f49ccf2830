//! SQLite persistence for connectors, pages, folders and global settings.
//!
//! Every operation is an `impl Database` block in its own file; all of them
//! share the pool owned by [`Database`].

mod connectors;
mod folders;
mod pages;
mod schema;
mod settings;
mod types;

pub use schema::Database;
pub use types::{
    Connector, ConnectorSettings, ConnectorType, DatabaseError, FetchedPage, Folder,
    NewConnector, Page, ProxySetting,
};
