use super::schema::Database;
use super::types::{DatabaseError, Folder};
use crate::util::strip_control_chars;

impl Database {
    // ========================================================================
    // Folder Operations
    // ========================================================================

    /// Strip control characters and surrounding whitespace; reject empty names.
    fn sanitize_folder_name(name: &str) -> Result<String, DatabaseError> {
        let sanitized = strip_control_chars(name);
        let trimmed = sanitized.trim();
        if trimmed.is_empty() {
            return Err(DatabaseError::InvalidName(
                "folder name cannot be empty".to_string(),
            ));
        }
        Ok(trimmed.to_owned())
    }

    /// Create a folder at the end of the display order, returning its id.
    pub async fn create_folder(&self, name: &str) -> Result<i64, DatabaseError> {
        let clean_name = Self::sanitize_folder_name(name)?;
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO folders (name, display_sequence)
            VALUES (?, (SELECT COALESCE(MAX(display_sequence), 0) + 1 FROM folders))
            RETURNING id
            "#,
        )
        .bind(&clean_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    pub async fn rename_folder(&self, id: i64, new_name: &str) -> Result<(), DatabaseError> {
        let clean_name = Self::sanitize_folder_name(new_name)?;
        sqlx::query("UPDATE folders SET name = ? WHERE id = ?")
            .bind(&clean_name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a folder. Its connectors and pages become unfiled.
    pub async fn delete_folder(&self, id: i64) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE connectors SET folder_id = NULL WHERE folder_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE pages SET folder_id = NULL WHERE folder_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_folders(&self) -> Result<Vec<Folder>, DatabaseError> {
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT id, name, display_sequence FROM folders ORDER BY display_sequence, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, display_sequence)| Folder {
                id,
                name,
                display_sequence,
            })
            .collect())
    }

    /// First folder with exactly this (sanitized) name.
    pub async fn get_folder_by_name(&self, name: &str) -> Result<Option<Folder>, DatabaseError> {
        let clean_name = Self::sanitize_folder_name(name)?;
        let row: Option<(i64, String, i64)> = sqlx::query_as(
            "SELECT id, name, display_sequence FROM folders WHERE name = ? ORDER BY id LIMIT 1",
        )
        .bind(&clean_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, name, display_sequence)| Folder {
            id,
            name,
            display_sequence,
        }))
    }
}
