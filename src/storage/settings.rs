use super::schema::Database;
use super::types::{DatabaseError, ProxySetting};

const PROXY_HOST_KEY: &str = "proxy.host";
const PROXY_PORT_KEY: &str = "proxy.port";

impl Database {
    // ========================================================================
    // Global Settings Operations
    // ========================================================================

    /// Get a single setting value by key, or `None` if unset.
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM global_settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(value,)| value))
    }

    /// Set a setting value (UPSERT).
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO global_settings (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_setting(&self, key: &str) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM global_settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The global proxy, if one is configured.
    ///
    /// A host without a parseable port is treated as unset and logged.
    pub async fn get_proxy_setting(&self) -> Result<Option<ProxySetting>, DatabaseError> {
        let Some(host) = self.get_setting(PROXY_HOST_KEY).await? else {
            return Ok(None);
        };
        if host.trim().is_empty() {
            return Ok(None);
        }
        let port = self.get_setting(PROXY_PORT_KEY).await?;
        match port.as_deref().map(str::parse::<u16>) {
            Some(Ok(port)) => Ok(Some(ProxySetting { host, port })),
            _ => {
                tracing::warn!(host = %host, port = ?port, "Ignoring proxy setting with invalid port");
                Ok(None)
            }
        }
    }

    /// Store or clear (`None`) the global proxy.
    pub async fn set_proxy_setting(&self, proxy: Option<&ProxySetting>) -> Result<(), DatabaseError> {
        match proxy {
            Some(proxy) => {
                self.set_setting(PROXY_HOST_KEY, proxy.host.trim()).await?;
                self.set_setting(PROXY_PORT_KEY, &proxy.port.to_string())
                    .await?;
            }
            None => {
                self.delete_setting(PROXY_HOST_KEY).await?;
                self.delete_setting(PROXY_PORT_KEY).await?;
            }
        }
        Ok(())
    }
}
