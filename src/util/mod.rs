//! Small helpers shared by the feed, connector and service layers.
//!
//! - **URL validation**: scheme checks plus an SSRF guard for feed URLs
//! - **Text cleanup**: stripping terminal control sequences from feed text

mod text;
mod url_validator;

pub use text::{clean_text, strip_control_chars};
pub use url_validator::{validate_feed_url, validate_url, UrlValidationError};
