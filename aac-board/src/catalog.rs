//! Bundled system catalog
//!
//! System categories are process constants. System cards are derived from
//! the bundled picture assets: one card per image found under
//! `<asset_root>/<category>/`, labelled from its file name.
//!
//! Loading fails soft. A missing asset root or a category folder without
//! pictures contributes zero cards and a warning; it never stops the board.

use aac_common::events::{BoardEvent, EventBus};
use aac_common::models::{system_card_id, Card, Category};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Image extensions recognised in the bundled catalog
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// The fixed system categories, in display-definition order
pub fn system_categories() -> Vec<Category> {
    vec![
        Category::system("social", "Social", "👥", "#9333ea", "social"),
        Category::system("actions", "Ações", "🏃", "#3b82f6", "actions"),
        Category::system("emotions", "Sentimentos", "😊", "#eab308", "expressions"),
        Category::system("opinion", "Opinião", "💭", "#0ea5e9", "communication"),
        Category::system("leisure", "Lazer", "🎮", "#6366f1", "activities"),
        Category::system("food", "Comidas e Bebidas", "🍎", "#ef4444", "daily"),
        Category::system("clothes", "Roupa", "👕", "#818cf8", "daily"),
        Category::system("objects", "Objetos", "📱", "#6b7280", "things"),
        Category::system("places", "Lugares", "🏠", "#22c55e", "places"),
        Category::system("body", "Corpo Humano", "👤", "#ec4899", "body"),
        Category::system("animals", "Animais", "🐾", "#f59e0b", "nature"),
        Category::system("colors", "Cores", "🎨", "#8b5cf6", "expressions"),
        Category::system("numbers", "Números", "🔢", "#14b8a6", "general"),
        Category::system("weather", "Tempo", "☀️", "#fbbf24", "weather"),
    ]
}

/// One bundled picture: catalog-relative path and public URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledAsset {
    /// Path relative to the asset root, `/`-separated (`food/apple.png`)
    pub path: String,
    pub url: String,
}

impl BundledAsset {
    pub fn new(path: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
        }
    }

    /// Directory segment holding the picture
    fn category_segment(&self) -> Option<&str> {
        let mut segments = self.path.rsplit('/');
        segments.next()?;
        segments.next()
    }

    /// File name without extension
    fn file_stem(&self) -> &str {
        let file_name = self.path.rsplit('/').next().unwrap_or(&self.path);
        match file_name.split_once('.') {
            Some((stem, _)) => stem,
            None => file_name,
        }
    }
}

/// Enumerable set of bundled pictures
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    assets: Vec<BundledAsset>,
}

impl AssetCatalog {
    pub fn new(assets: Vec<BundledAsset>) -> Self {
        Self { assets }
    }

    /// Scan an asset root for pictures
    ///
    /// Paths are sorted so the resulting card list is deterministic. A
    /// missing root yields an empty catalog and a warning.
    pub fn scan(root: &Path, url_prefix: &str) -> Self {
        if !root.is_dir() {
            warn!(root = %root.display(), "Asset root not found, catalog is empty");
            return Self::default();
        }

        let prefix = url_prefix.trim_end_matches('/');
        let mut assets: Vec<BundledAsset> = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable asset entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_image_path(entry.path()))
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(root).ok()?;
                let path = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                let url = format!("{}/{}", prefix, path);
                Some(BundledAsset::new(path, url))
            })
            .collect();

        assets.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(count = assets.len(), root = %root.display(), "Scanned bundled assets");

        Self { assets }
    }

    pub fn assets(&self) -> &[BundledAsset] {
        &self.assets
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Human label from a file stem: dashes become spaces, each word title-cased
///
/// ```
/// use aac_board::catalog::label_from_file_stem;
///
/// assert_eq!(label_from_file_stem("ice-CREAM"), "Ice Cream");
/// ```
pub fn label_from_file_stem(stem: &str) -> String {
    stem.replace('-', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive the immutable system cards for the given categories
///
/// Categories are visited in the given order; within a category assets keep
/// catalog order. Every card has `order = 0`. Assets whose stem repeats
/// within a category (`apple.png` next to `apple.webp`) keep the first one.
pub fn load_system_cards(
    catalog: &AssetCatalog,
    categories: &[Category],
    events: &EventBus,
) -> Vec<Card> {
    let mut cards = Vec::new();
    let mut seen = HashSet::new();

    for category in categories.iter().filter(|c| c.is_system) {
        let before = cards.len();

        for asset in catalog.assets().iter().filter(|asset| {
            asset
                .category_segment()
                .map(|segment| segment.eq_ignore_ascii_case(&category.id))
                .unwrap_or(false)
        }) {
            let stem = asset.file_stem();
            let id = system_card_id(&category.id, stem);
            if !seen.insert(id.clone()) {
                warn!(card_id = %id, path = %asset.path, "Duplicate bundled picture skipped");
                continue;
            }
            cards.push(Card {
                id,
                category_id: category.id.clone(),
                image_url: asset.url.clone(),
                label: label_from_file_stem(stem),
                voice_label: None,
                is_system: true,
                order: 0,
                created_at: None,
                media_id: None,
                owner_id: None,
            });
        }

        let found = cards.len() - before;
        if found == 0 {
            let message = format!("No bundled pictures found for category '{}'", category.id);
            warn!(category_id = %category.id, "{}", message);
            events.emit_lossy(BoardEvent::CatalogWarning {
                category_id: category.id.clone(),
                message,
            });
        } else {
            debug!(category_id = %category.id, count = found, "Loaded system cards");
        }
    }

    info!(total = cards.len(), "System catalog loaded");
    cards
}

/// Process-constant system content
#[derive(Debug, Clone, Default)]
pub struct SystemContent {
    pub categories: Vec<Category>,
    pub cards: Vec<Card>,
}

impl SystemContent {
    /// Build system content from a catalog
    pub fn load(catalog: &AssetCatalog, events: &EventBus) -> Self {
        let categories = system_categories();
        let cards = load_system_cards(catalog, &categories, events);
        Self { categories, cards }
    }
}
