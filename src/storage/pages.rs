use sqlx::QueryBuilder;
use std::collections::HashSet;

use super::schema::Database;
use super::types::{DatabaseError, FetchedPage, Page};

impl Database {
    // ========================================================================
    // Page Operations
    // ========================================================================

    /// Store a fetch result for a connector atomically: insert unseen pages,
    /// bump the connector's inbox count by the number inserted, clear its
    /// error and stamp `last_fetched`.
    ///
    /// Pages already stored under the same `(connector_id, guid)` are left
    /// untouched. New pages inherit `folder_id`. Returns the number inserted.
    pub async fn store_fetched_pages(
        &self,
        connector_id: i64,
        folder_id: Option<i64>,
        pages: &[FetchedPage],
    ) -> Result<usize, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        const BATCH_SIZE: usize = 50;
        let mut inserted: u64 = 0;

        for chunk in pages.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO pages (connector_id, folder_id, guid, url, title, \
                 description, content, author, published, fetched_at) ",
            );
            builder.push_values(chunk, |mut b, page| {
                b.push_bind(connector_id)
                    .push_bind(folder_id)
                    .push_bind(&page.guid)
                    .push_bind(&page.url)
                    .push_bind(&page.title)
                    .push_bind(&page.description)
                    .push_bind(&page.content)
                    .push_bind(&page.author)
                    .push_bind(page.published)
                    .push_bind(now);
            });
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        sqlx::query(
            "UPDATE connectors SET inbox_count = inbox_count + ?, last_fetched = ?, error = NULL \
             WHERE id = ?",
        )
        .bind(inserted as i64)
        .bind(now)
        .bind(connector_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted as usize)
    }

    /// Guids already stored for a connector; used to skip re-crawling.
    pub async fn get_page_guids(&self, connector_id: i64) -> Result<HashSet<String>, DatabaseError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT guid FROM pages WHERE connector_id = ?")
            .bind(connector_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(guid,)| guid).collect())
    }

    /// All pages of a connector, newest first.
    pub async fn get_pages_for_connector(
        &self,
        connector_id: i64,
    ) -> Result<Vec<Page>, DatabaseError> {
        let pages = sqlx::query_as::<_, Page>(
            r#"
            SELECT id, connector_id, folder_id, guid, url, title, description, content,
                   author, published, fetched_at
            FROM pages
            WHERE connector_id = ?
            ORDER BY published DESC, fetched_at DESC, id DESC
        "#,
        )
        .bind(connector_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(pages)
    }

    /// Move every page of a connector into `folder_id` with a single bulk UPDATE.
    pub async fn update_pages_folder_by_connector(
        &self,
        connector_id: i64,
        folder_id: Option<i64>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query("UPDATE pages SET folder_id = ? WHERE connector_id = ?")
            .bind(folder_id)
            .bind(connector_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
