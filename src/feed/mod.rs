//! HTTP and feed-format utilities.
//!
//! - [`fetcher`] - bounded, retrying HTTP GET
//! - [`parser`] - feed entries to [`FetchedPage`](crate::storage::FetchedPage)s via `feed-rs`
//! - [`metadata`] - channel title, site link and description for previews
//! - [`favicon`] - best-effort site icon lookup
//! - [`opml`] - subscription list import/export

pub mod favicon;
pub mod fetcher;
pub(crate) mod html;
pub mod metadata;
pub mod opml;
pub mod parser;

pub use favicon::favicon_from_home;
pub use fetcher::{fetch_bytes, FetchError, MAX_RETRIES};
pub use metadata::{fetch_feed_metadata, parse_feed_metadata, FeedMetadata};
pub use opml::{export_to_file, parse_opml, read_opml_file, OpmlError, OpmlFeed};
pub use parser::{parse_entries, ParseResult};
