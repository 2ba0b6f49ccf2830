use crate::storage::FetchedPage;

/// Pages captured by the browser extension. They are pushed into the store
/// by the capturing client, so there is nothing to pull.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureConnector;

impl CaptureConnector {
    pub fn fetch_newest_pages(&self) -> Vec<FetchedPage> {
        Vec::new()
    }

    pub fn fetch_all_pages(&self) -> Vec<FetchedPage> {
        Vec::new()
    }

    /// Captured pages already carry their content.
    pub fn fetch_page_content(&self, page: FetchedPage) -> FetchedPage {
        page
    }
}
