//! Cached category records

use super::{CacheError, CacheResult, LocalCache};
use aac_common::models::{category_id_for, Category, CategoryPatch};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

pub(super) async fn create_table(pool: &SqlitePool) -> CacheResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            icon TEXT NOT NULL,
            color TEXT NOT NULL,
            group_name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn row_to_category(row: &SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        icon: row.get("icon"),
        color: row.get("color"),
        is_system: false,
        group: row.get("group_name"),
        is_temporary: false,
        owner_id: None,
    }
}

impl LocalCache {
    /// Insert a category, generating an id when none is set
    pub async fn insert_category(&self, category: &Category) -> CacheResult<Category> {
        let mut stored = category.clone();
        if stored.id.is_empty() {
            stored.id = category_id_for(&stored.name);
        }
        stored.is_system = false;
        stored.is_temporary = false;
        stored.owner_id = None;

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, icon, color, group_name)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.name)
        .bind(&stored.icon)
        .bind(&stored.color)
        .bind(&stored.group)
        .execute(self.pool())
        .await?;

        Ok(stored)
    }

    /// All cached categories in insertion order
    pub async fn list_categories(&self) -> CacheResult<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, name, icon, color, group_name FROM categories ORDER BY rowid",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_category).collect())
    }

    pub async fn update_category(&self, id: &str, patch: &CategoryPatch) -> CacheResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE categories SET
                name = COALESCE(?, name),
                icon = COALESCE(?, icon),
                color = COALESCE(?, color)
            WHERE id = ?
            "#,
        )
        .bind(patch.name.as_deref())
        .bind(patch.icon.as_deref())
        .bind(patch.color.as_deref())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CacheError::NotFound(format!("category {}", id)));
        }
        Ok(())
    }

    /// Delete a category and every card that references it
    ///
    /// Returns the number of cards removed.
    pub async fn delete_category(&self, id: &str) -> CacheResult<u64> {
        let mut tx = self.pool().begin().await?;

        let cards = sqlx::query("DELETE FROM cards WHERE category_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Err(CacheError::NotFound(format!("category {}", id)));
        }

        tx.commit().await?;
        Ok(cards)
    }
}
