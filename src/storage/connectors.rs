use super::schema::Database;
use super::types::{
    Connector, ConnectorDbRow, ConnectorSettings, ConnectorType, DatabaseError, NewConnector,
    CONNECTOR_COLUMNS,
};

impl Database {
    // ========================================================================
    // Connector Lookups
    // ========================================================================

    /// Get a connector by id, whatever its type.
    pub async fn get_connector(&self, id: i64) -> Result<Option<Connector>, DatabaseError> {
        let sql = format!("SELECT {CONNECTOR_COLUMNS} FROM connectors WHERE id = ?");
        let row: Option<ConnectorDbRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ConnectorDbRow::into_connector).transpose()
    }

    /// Find the connector of the given type subscribed to `subscribe_url`.
    pub async fn get_connector_by_subscribe_url(
        &self,
        subscribe_url: &str,
        connector_type: ConnectorType,
    ) -> Result<Option<Connector>, DatabaseError> {
        let sql = format!(
            "SELECT {CONNECTOR_COLUMNS} FROM connectors WHERE subscribe_url = ? AND type = ?"
        );
        let row: Option<ConnectorDbRow> = sqlx::query_as(&sql)
            .bind(subscribe_url)
            .bind(connector_type.code())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ConnectorDbRow::into_connector).transpose()
    }

    /// List connectors ordered by display sequence, optionally filtered by type.
    pub async fn list_connectors(
        &self,
        connector_type: Option<ConnectorType>,
    ) -> Result<Vec<Connector>, DatabaseError> {
        let rows: Vec<ConnectorDbRow> = match connector_type {
            Some(ty) => {
                let sql = format!(
                    "SELECT {CONNECTOR_COLUMNS} FROM connectors WHERE type = ? ORDER BY display_sequence, id"
                );
                sqlx::query_as(&sql)
                    .bind(ty.code())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {CONNECTOR_COLUMNS} FROM connectors ORDER BY display_sequence, id"
                );
                sqlx::query_as(&sql).fetch_all(&self.pool).await?
            }
        };
        rows.into_iter().map(ConnectorDbRow::into_connector).collect()
    }

    // ========================================================================
    // Connector Writes
    // ========================================================================

    /// Insert a new connector and return the stored row.
    ///
    /// A second RSS connector for the same URL violates the
    /// `(type, subscribe_url)` unique index and is returned as an error.
    pub async fn insert_connector(&self, new: &NewConnector) -> Result<Connector, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO connectors (type, subscribe_url, name, icon_url, enabled,
                crawl_full_content, display_sequence, inbox_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {CONNECTOR_COLUMNS}
            "#
        );
        let row: ConnectorDbRow = sqlx::query_as(&sql)
            .bind(new.connector_type.code())
            .bind(&new.subscribe_url)
            .bind(&new.name)
            .bind(&new.icon_url)
            .bind(new.enabled)
            .bind(new.crawl_full_content)
            .bind(new.display_sequence)
            .bind(new.inbox_count)
            .bind(new.created_at)
            .fetch_one(&self.pool)
            .await?;
        row.into_connector()
    }

    /// Refresh the name and icon of an existing connector, leaving every
    /// other column untouched.
    pub async fn update_connector_identity(
        &self,
        id: i64,
        name: Option<&str>,
        icon_url: Option<&str>,
    ) -> Result<Connector, DatabaseError> {
        let sql = format!(
            "UPDATE connectors SET name = ?, icon_url = ? WHERE id = ? RETURNING {CONNECTOR_COLUMNS}"
        );
        let row: ConnectorDbRow = sqlx::query_as(&sql)
            .bind(name)
            .bind(icon_url)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        row.into_connector()
    }

    /// Overwrite the user-editable settings of a connector.
    ///
    /// Pages are not touched here; folder propagation is a separate bulk
    /// update issued by the caller when the folder actually changed.
    pub async fn update_connector_settings(
        &self,
        id: i64,
        settings: &ConnectorSettings,
    ) -> Result<Connector, DatabaseError> {
        let sql = format!(
            r#"
            UPDATE connectors SET
                name = ?,
                enabled = ?,
                crawl_full_content = ?,
                subscribe_url = ?,
                folder_id = ?,
                fetch_interval_seconds = ?
            WHERE id = ?
            RETURNING {CONNECTOR_COLUMNS}
            "#
        );
        let row: ConnectorDbRow = sqlx::query_as(&sql)
            .bind(&settings.name)
            .bind(settings.enabled)
            .bind(settings.crawl_full_content)
            .bind(&settings.subscribe_url)
            .bind(settings.folder_id)
            .bind(settings.fetch_interval_seconds)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        row.into_connector()
    }

    /// Delete a connector and every page it owns in one transaction.
    ///
    /// Pages go first so no committed state ever has a page pointing at a
    /// missing connector. Returns the number of pages removed; deleting a
    /// missing id is a no-op returning 0.
    pub async fn delete_connector_with_pages(&self, id: i64) -> Result<u64, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let pages = sqlx::query("DELETE FROM pages WHERE connector_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM connectors WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(pages)
    }

    /// Record a failed fetch on the connector.
    pub async fn set_connector_error(&self, id: i64, error: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE connectors SET error = ? WHERE id = ?")
            .bind(error)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
