//! Canonical category and card model
//!
//! This is the single internal representation shared by the catalog, the
//! local cache, the remote store adapter and the board manager. Field mapping
//! to backend column names happens only at the remote store boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Group assigned to user categories that resemble no system category
pub const DEFAULT_GROUP: &str = "social";

/// Authenticated user identity as reported by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Picture card category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Stable slug id (fixed for system categories)
    pub id: String,
    pub name: String,
    /// Glyph shown next to the name
    pub icon: String,
    /// Display color token
    pub color: String,
    pub is_system: bool,
    /// Clustering tag used for display ordering
    pub group: String,
    /// Draft category that only exists during the creation flow
    #[serde(skip)]
    pub is_temporary: bool,
    /// Owner of a user category; `None` for system and local-only records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
}

impl Category {
    /// Build an immutable system category
    pub fn system(id: &str, name: &str, icon: &str, color: &str, group: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
            is_system: true,
            group: group.to_string(),
            is_temporary: false,
            owner_id: None,
        }
    }

    /// Build a new user category with a freshly derived id
    pub fn user(name: &str, icon: &str, color: &str, group: &str, owner_id: Option<UserId>) -> Self {
        Self {
            id: category_id_for(name),
            name: name.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
            is_system: false,
            group: group.to_string(),
            is_temporary: false,
            owner_id,
        }
    }
}

/// Partial category update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CategoryPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.icon.is_none() && self.color.is_none()
    }

    /// Apply the patch to a category in place
    pub fn apply(&self, category: &mut Category) {
        if let Some(name) = &self.name {
            category.name = name.clone();
        }
        if let Some(icon) = &self.icon {
            category.icon = icon.clone();
        }
        if let Some(color) = &self.color {
            category.color = color.clone();
        }
    }
}

/// Picture card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub category_id: String,
    /// Public URL, or a data URI before the image reaches the media host
    pub image_url: String,
    /// Display label
    pub label: String,
    /// Spoken text when it differs from the display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_label: Option<String>,
    pub is_system: bool,
    /// Position within the category (zero-based, not necessarily contiguous)
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Media host deletion handle ("public id")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
}

impl Card {
    /// Text handed to speech synthesis
    pub fn speech_text(&self) -> &str {
        match self.voice_label.as_deref() {
            Some(voice) if !voice.trim().is_empty() => voice,
            _ => &self.label,
        }
    }

    /// True when the image still lives inline and has not been uploaded
    pub fn needs_upload(&self) -> bool {
        !self.is_system && self.media_id.is_none() && self.image_url.starts_with("data:")
    }
}

/// Image reference stored on a card after ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Public URL, or a data URI when no media host is configured
    pub url: String,
    /// Media host deletion handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
}

impl MediaRef {
    /// Reference that needs no hosting (bundled asset or external URL)
    pub fn unhosted(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            public_id: None,
        }
    }
}

/// Partial card update (used by reorder and media sync)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
}

impl CardPatch {
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none()
            && self.order.is_none()
            && self.image_url.is_none()
            && self.media_id.is_none()
    }

    pub fn apply(&self, card: &mut Card) {
        if let Some(category_id) = &self.category_id {
            card.category_id = category_id.clone();
        }
        if let Some(order) = self.order {
            card.order = order;
        }
        if let Some(image_url) = &self.image_url {
            card.image_url = image_url.clone();
        }
        if let Some(media_id) = &self.media_id {
            card.media_id = Some(media_id.clone());
        }
    }
}

/// Lowercase slug of a display name ("Meus Jogos" -> "meus-jogos")
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for word in name.split_whitespace() {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
            .flat_map(char::to_lowercase)
            .collect();
        if cleaned.is_empty() {
            continue;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&cleaned);
    }
    slug
}

/// Derive a user category id from its name plus a uniqueness suffix
pub fn category_id_for(name: &str) -> String {
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    let slug = slugify(name);
    if slug.is_empty() {
        format!("category-{}", suffix)
    } else {
        format!("{}-{}", slug, suffix)
    }
}

/// Generate a user card id
pub fn generate_card_id() -> String {
    Uuid::new_v4().to_string()
}

/// Deterministic system card id from category and file stem
pub fn system_card_id(category_id: &str, file_stem: &str) -> String {
    format!("public-{}-{}", category_id, file_stem)
}
