//! Cached card records

use super::{CacheError, CacheResult, LocalCache};
use aac_common::models::{generate_card_id, Card, CardPatch};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

pub(super) async fn create_table(pool: &SqlitePool) -> CacheResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            category_id TEXT NOT NULL,
            image_url TEXT NOT NULL,
            label TEXT NOT NULL,
            voice_label TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            media_id TEXT,
            created_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cards_category ON cards(category_id)")
        .execute(pool)
        .await?;

    Ok(())
}

fn row_to_card(row: &SqliteRow) -> Card {
    let created_at: Option<String> = row.get("created_at");
    Card {
        id: row.get("id"),
        category_id: row.get("category_id"),
        image_url: row.get("image_url"),
        label: row.get("label"),
        voice_label: row.get("voice_label"),
        is_system: false,
        order: row.get("sort_order"),
        created_at: created_at
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
        media_id: row.get("media_id"),
        owner_id: None,
    }
}

impl LocalCache {
    /// Insert a card, generating an id when none is set
    pub async fn insert_card(&self, card: &Card) -> CacheResult<Card> {
        let mut stored = card.clone();
        if stored.id.is_empty() {
            stored.id = generate_card_id();
        }
        stored.is_system = false;
        stored.owner_id = None;
        if stored.created_at.is_none() {
            stored.created_at = Some(Utc::now());
        }

        sqlx::query(
            r#"
            INSERT INTO cards (id, category_id, image_url, label, voice_label, sort_order, media_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.category_id)
        .bind(&stored.image_url)
        .bind(&stored.label)
        .bind(stored.voice_label.as_deref())
        .bind(stored.order)
        .bind(stored.media_id.as_deref())
        .bind(stored.created_at.map(|t| t.to_rfc3339()))
        .execute(self.pool())
        .await?;

        Ok(stored)
    }

    /// All cached cards in insertion order
    pub async fn list_cards(&self) -> CacheResult<Vec<Card>> {
        let rows = sqlx::query(
            r#"
            SELECT id, category_id, image_url, label, voice_label, sort_order, media_id, created_at
            FROM cards
            ORDER BY rowid
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_card).collect())
    }

    /// Apply a partial update (category move, order, hosted image)
    pub async fn update_card(&self, id: &str, patch: &CardPatch) -> CacheResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cards SET
                category_id = COALESCE(?, category_id),
                sort_order = COALESCE(?, sort_order),
                image_url = COALESCE(?, image_url),
                media_id = COALESCE(?, media_id)
            WHERE id = ?
            "#,
        )
        .bind(patch.category_id.as_deref())
        .bind(patch.order)
        .bind(patch.image_url.as_deref())
        .bind(patch.media_id.as_deref())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CacheError::NotFound(format!("card {}", id)));
        }
        Ok(())
    }

    pub async fn delete_card(&self, id: &str) -> CacheResult<()> {
        let result = sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CacheError::NotFound(format!("card {}", id)));
        }
        Ok(())
    }
}
