//! Remote store client
//!
//! Authenticated CRUD for user categories and cards against a PostgREST-style
//! backend. Every query is scoped by the `user_id` ownership column; the
//! board only ever sees what the backend returns as the caller's records.
//!
//! Backend rows use snake_case columns and a few different names (`name` for
//! a card label, `cloudinary_metadata` for the media handle). [`CategoryRow`]
//! and [`CardRow`] are the only place that mapping happens.

use aac_common::config::RemoteConfig;
use aac_common::models::{Card, CardPatch, Category, CategoryPatch, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("aac-board/", env!("CARGO_PKG_VERSION"));

/// Remote store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    /// No session, or the session token was rejected
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Owner-scoped CRUD over the authoritative store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Current session user, or `None` when anonymous
    async fn current_user(&self) -> Result<Option<UserId>, StoreError>;

    async fn list_categories(&self, owner: &UserId) -> Result<Vec<Category>, StoreError>;
    async fn insert_category(&self, owner: &UserId, category: &Category) -> Result<Category, StoreError>;
    async fn update_category(&self, owner: &UserId, id: &str, patch: &CategoryPatch) -> Result<(), StoreError>;
    async fn delete_category(&self, owner: &UserId, id: &str) -> Result<(), StoreError>;

    async fn list_cards(&self, owner: &UserId) -> Result<Vec<Card>, StoreError>;
    async fn insert_card(&self, owner: &UserId, card: &Card) -> Result<Card, StoreError>;
    async fn update_card(&self, owner: &UserId, id: &str, patch: &CardPatch) -> Result<(), StoreError>;
    async fn delete_card(&self, owner: &UserId, id: &str) -> Result<(), StoreError>;
}

/// Backend category row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl CategoryRow {
    pub fn from_category(category: &Category, owner: &UserId) -> Self {
        Self {
            id: category.id.clone(),
            name: category.name.clone(),
            icon: Some(category.icon.clone()),
            color: Some(category.color.clone()),
            group: Some(category.group.clone()),
            user_id: owner.to_string(),
            created_at: None,
        }
    }

    pub fn into_category(self) -> Category {
        Category {
            id: self.id,
            name: self.name,
            icon: self.icon.unwrap_or_else(|| "📁".to_string()),
            color: self.color.unwrap_or_else(|| "#6b7280".to_string()),
            is_system: false,
            group: self
                .group
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| aac_common::models::DEFAULT_GROUP.to_string()),
            is_temporary: false,
            owner_id: Some(UserId(self.user_id)),
        }
    }
}

/// Media host reference stored alongside a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudinaryMetadata {
    pub public_id: String,
    pub cloudinary_url: String,
}

/// Backend card row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardRow {
    pub id: String,
    /// Display label
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_label: Option<String>,
    pub image_url: String,
    pub category_id: String,
    pub user_id: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudinary_metadata: Option<CloudinaryMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl CardRow {
    pub fn from_card(card: &Card, owner: &UserId) -> Self {
        Self {
            id: card.id.clone(),
            name: card.label.clone(),
            voice_label: card.voice_label.clone(),
            image_url: card.image_url.clone(),
            category_id: card.category_id.clone(),
            user_id: owner.to_string(),
            order: card.order,
            cloudinary_metadata: card.media_id.as_ref().map(|public_id| CloudinaryMetadata {
                public_id: public_id.clone(),
                cloudinary_url: card.image_url.clone(),
            }),
            created_at: card.created_at,
        }
    }

    pub fn into_card(self) -> Card {
        Card {
            id: self.id,
            category_id: self.category_id,
            image_url: self.image_url,
            label: self.name,
            voice_label: self.voice_label.filter(|v| !v.trim().is_empty()),
            is_system: false,
            order: self.order,
            created_at: self.created_at,
            media_id: self.cloudinary_metadata.map(|m| m.public_id),
            owner_id: Some(UserId(self.user_id)),
        }
    }
}

/// Column map for a partial card update
pub fn card_patch_body(patch: &CardPatch) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    if let Some(category_id) = &patch.category_id {
        body.insert("category_id".into(), category_id.clone().into());
    }
    if let Some(order) = patch.order {
        body.insert("order".into(), order.into());
    }
    if let Some(image_url) = &patch.image_url {
        body.insert("image_url".into(), image_url.clone().into());
    }
    if let Some(public_id) = &patch.media_id {
        let url = patch.image_url.clone().unwrap_or_default();
        body.insert(
            "cloudinary_metadata".into(),
            serde_json::json!({ "public_id": public_id, "cloudinary_url": url }),
        );
    }
    serde_json::Value::Object(body)
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

/// PostgREST + auth endpoint client
pub struct PostgrestStore {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl PostgrestStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Row filter for one owner, optionally narrowed to one id
    fn scoped_query(owner: &UserId, id: Option<&str>) -> Vec<(String, String)> {
        let mut query = vec![("user_id".to_string(), format!("eq.{}", owner))];
        if let Some(id) = id {
            query.push(("id".to_string(), format!("eq.{}", id)));
        }
        query
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, StoreError> {
        let token = self.access_token.as_deref().ok_or(StoreError::Unauthorized)?;
        Ok(builder
            .header("apikey", &self.api_key)
            .bearer_auth(token))
    }

    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response, StoreError> {
        let response = self
            .authorized(builder)?
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => Err(StoreError::Unauthorized),
            403 => Err(StoreError::Forbidden(what.to_string())),
            404 => Err(StoreError::NotFound(what.to_string())),
            code => Err(StoreError::Api(code, error_text)),
        }
    }

    async fn json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }

    /// Single representation returned by an insert
    fn first_row<T>(rows: Vec<T>, what: &str) -> Result<T, StoreError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Parse(format!("empty representation for {}", what)))
    }

    /// Zero rows touched by an owner-scoped write means "not yours or gone"
    fn ensure_touched<T>(rows: &[T], what: &str) -> Result<(), StoreError> {
        if rows.is_empty() {
            Err(StoreError::NotFound(what.to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for PostgrestStore {
    async fn current_user(&self) -> Result<Option<UserId>, StoreError> {
        if self.access_token.is_none() {
            return Ok(None);
        }

        let url = format!("{}/auth/v1/user", self.base_url);
        match self.send(self.http_client.get(&url), "session").await {
            Ok(response) => {
                let user: AuthUser = Self::json(response).await?;
                debug!(user_id = %user.id, "Remote session resolved");
                Ok(Some(UserId(user.id)))
            }
            Err(StoreError::Unauthorized) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_categories(&self, owner: &UserId) -> Result<Vec<Category>, StoreError> {
        let request = self
            .http_client
            .get(self.table_url("categories"))
            .query(&Self::scoped_query(owner, None))
            .query(&[("select", "*"), ("order", "created_at.asc")]);

        let rows: Vec<CategoryRow> = Self::json(self.send(request, "categories").await?).await?;
        Ok(rows.into_iter().map(CategoryRow::into_category).collect())
    }

    async fn insert_category(&self, owner: &UserId, category: &Category) -> Result<Category, StoreError> {
        let request = self
            .http_client
            .post(self.table_url("categories"))
            .header("Prefer", "return=representation")
            .json(&CategoryRow::from_category(category, owner));

        let rows: Vec<CategoryRow> = Self::json(self.send(request, "category").await?).await?;
        Ok(Self::first_row(rows, "category")?.into_category())
    }

    async fn update_category(&self, owner: &UserId, id: &str, patch: &CategoryPatch) -> Result<(), StoreError> {
        let request = self
            .http_client
            .patch(self.table_url("categories"))
            .query(&Self::scoped_query(owner, Some(id)))
            .header("Prefer", "return=representation")
            .json(patch);

        let rows: Vec<serde_json::Value> = Self::json(self.send(request, id).await?).await?;
        Self::ensure_touched(&rows, &format!("category {}", id))
    }

    async fn delete_category(&self, owner: &UserId, id: &str) -> Result<(), StoreError> {
        let request = self
            .http_client
            .delete(self.table_url("categories"))
            .query(&Self::scoped_query(owner, Some(id)))
            .header("Prefer", "return=representation");

        let rows: Vec<serde_json::Value> = Self::json(self.send(request, id).await?).await?;
        Self::ensure_touched(&rows, &format!("category {}", id))
    }

    async fn list_cards(&self, owner: &UserId) -> Result<Vec<Card>, StoreError> {
        let request = self
            .http_client
            .get(self.table_url("cards"))
            .query(&Self::scoped_query(owner, None))
            .query(&[("select", "*"), ("order", "created_at.asc")]);

        let rows: Vec<CardRow> = Self::json(self.send(request, "cards").await?).await?;
        Ok(rows.into_iter().map(CardRow::into_card).collect())
    }

    async fn insert_card(&self, owner: &UserId, card: &Card) -> Result<Card, StoreError> {
        let request = self
            .http_client
            .post(self.table_url("cards"))
            .header("Prefer", "return=representation")
            .json(&CardRow::from_card(card, owner));

        let rows: Vec<CardRow> = Self::json(self.send(request, "card").await?).await?;
        Ok(Self::first_row(rows, "card")?.into_card())
    }

    async fn update_card(&self, owner: &UserId, id: &str, patch: &CardPatch) -> Result<(), StoreError> {
        let request = self
            .http_client
            .patch(self.table_url("cards"))
            .query(&Self::scoped_query(owner, Some(id)))
            .header("Prefer", "return=representation")
            .json(&card_patch_body(patch));

        let rows: Vec<serde_json::Value> = Self::json(self.send(request, id).await?).await?;
        Self::ensure_touched(&rows, &format!("card {}", id))
    }

    async fn delete_card(&self, owner: &UserId, id: &str) -> Result<(), StoreError> {
        let request = self
            .http_client
            .delete(self.table_url("cards"))
            .query(&Self::scoped_query(owner, Some(id)))
            .header("Prefer", "return=representation");

        let rows: Vec<serde_json::Value> = Self::json(self.send(request, id).await?).await?;
        Self::ensure_touched(&rows, &format!("card {}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> UserId {
        UserId::new("user-1")
    }

    #[test]
    fn test_card_row_maps_label_and_media_handle() {
        let json = serde_json::json!({
            "id": "c1",
            "name": "Bola",
            "image_url": "https://res.example/aac/bola.jpg",
            "category_id": "leisure",
            "user_id": "user-1",
            "order": 3,
            "cloudinary_metadata": {
                "public_id": "aac/bola",
                "cloudinary_url": "https://res.example/aac/bola.jpg"
            }
        });

        let card = serde_json::from_value::<CardRow>(json).unwrap().into_card();
        assert_eq!(card.label, "Bola");
        assert_eq!(card.order, 3);
        assert_eq!(card.media_id.as_deref(), Some("aac/bola"));
        assert_eq!(card.owner_id, Some(owner()));
        assert!(!card.is_system);
    }

    #[test]
    fn test_card_row_never_carries_client_owner() {
        let card = Card {
            id: "c1".to_string(),
            category_id: "food".to_string(),
            image_url: "data:image/jpeg;base64,AAAA".to_string(),
            label: "Pão".to_string(),
            voice_label: None,
            is_system: false,
            order: 0,
            created_at: None,
            media_id: None,
            owner_id: Some(UserId::new("someone-else")),
        };

        let row = CardRow::from_card(&card, &owner());
        assert_eq!(row.user_id, "user-1");
        assert!(row.cloudinary_metadata.is_none());
    }

    #[test]
    fn test_category_row_defaults_missing_group() {
        let json = serde_json::json!({
            "id": "hobbies-1a2b3c4d",
            "name": "Hobbies",
            "user_id": "user-1"
        });

        let category = serde_json::from_value::<CategoryRow>(json).unwrap().into_category();
        assert_eq!(category.group, "social");
        assert!(!category.is_system);
    }

    #[test]
    fn test_patch_body_uses_backend_columns() {
        let body = card_patch_body(&CardPatch {
            order: Some(2),
            image_url: Some("https://res.example/x.jpg".to_string()),
            media_id: Some("aac/x".to_string()),
            ..Default::default()
        });

        assert_eq!(body["order"], 2);
        assert_eq!(body["cloudinary_metadata"]["public_id"], "aac/x");
        assert!(body.get("category_id").is_none());
    }

    #[test]
    fn test_scoped_query_filters_by_owner_and_id() {
        let query = PostgrestStore::scoped_query(&owner(), Some("c1"));
        assert_eq!(query[0], ("user_id".to_string(), "eq.user-1".to_string()));
        assert_eq!(query[1], ("id".to_string(), "eq.c1".to_string()));
    }

    #[tokio::test]
    async fn test_no_token_means_anonymous() {
        let store = PostgrestStore::new(&RemoteConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "anon".to_string(),
            access_token: None,
        })
        .unwrap();

        assert_eq!(store.current_user().await.unwrap(), None);
        assert!(matches!(
            store.list_cards(&owner()).await,
            Err(StoreError::Unauthorized)
        ));
    }
}
