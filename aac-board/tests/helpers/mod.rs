//! Test Helper Utilities
//!
//! In-memory fakes for the board's external collaborators plus builders for
//! common fixtures.

#![allow(dead_code)]

use aac_board::catalog::{system_categories, AssetCatalog, BundledAsset, SystemContent};
use aac_board::services::media_host::{MediaError, MediaHost, UploadedMedia};
use aac_board::services::media_pipeline::{ImageSource, MediaLimits, MediaPipeline};
use aac_board::services::remote_store::{RemoteStore, StoreError};
use aac_board::selection::{Speaker, Utterance};
use aac_board::{BoardManager, NewCard};
use aac_common::config::PolicyConfig;
use aac_common::events::EventBus;
use aac_common::models::{Card, CardPatch, Category, CategoryPatch, UserId};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const OWNER: &str = "user-1";

pub fn owner() -> UserId {
    UserId::new(OWNER)
}

/// In-memory remote store with failure injection
#[derive(Default)]
pub struct FakeRemoteStore {
    pub user: Mutex<Option<UserId>>,
    pub categories: Mutex<Vec<Category>>,
    pub cards: Mutex<Vec<Card>>,
    /// Every call fails with a network error
    pub offline: Mutex<bool>,
    /// Session lookup fails with a network error
    pub session_fails: Mutex<bool>,
    /// Card ids whose updates fail
    pub failing_card_updates: Mutex<HashSet<String>>,
    /// Card ids whose deletes fail
    pub failing_card_deletes: Mutex<HashSet<String>>,
    pub fail_card_inserts: Mutex<bool>,
    pub writes: AtomicUsize,
}

impl FakeRemoteStore {
    pub fn signed_in() -> Self {
        let store = Self::default();
        *store.user.lock().unwrap() = Some(owner());
        store
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn fail_update_of(&self, card_id: &str) {
        self.failing_card_updates.lock().unwrap().insert(card_id.to_string());
    }

    pub fn fail_delete_of(&self, card_id: &str) {
        self.failing_card_deletes.lock().unwrap().insert(card_id.to_string());
    }

    pub fn seed_category(&self, category: Category) {
        self.categories.lock().unwrap().push(category);
    }

    pub fn seed_card(&self, card: Card) {
        self.cards.lock().unwrap().push(card);
    }

    pub fn stored_card(&self, id: &str) -> Option<Card> {
        self.cards.lock().unwrap().iter().find(|c| c.id == id).cloned()
    }

    pub fn stored_cards(&self) -> Vec<Card> {
        self.cards.lock().unwrap().clone()
    }

    pub fn stored_categories(&self) -> Vec<Category> {
        self.categories.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if *self.offline.lock().unwrap() {
            Err(StoreError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn record_write(&self) -> Result<(), StoreError> {
        self.check_online()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FakeRemoteStore {
    async fn current_user(&self) -> Result<Option<UserId>, StoreError> {
        if *self.session_fails.lock().unwrap() {
            return Err(StoreError::Network("timeout".to_string()));
        }
        Ok(self.user.lock().unwrap().clone())
    }

    async fn list_categories(&self, owner: &UserId) -> Result<Vec<Category>, StoreError> {
        self.check_online()?;
        Ok(self
            .categories
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.owner_id.as_ref() == Some(owner))
            .cloned()
            .collect())
    }

    async fn insert_category(&self, owner: &UserId, category: &Category) -> Result<Category, StoreError> {
        self.record_write()?;
        let mut stored = category.clone();
        stored.owner_id = Some(owner.clone());
        self.categories.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn update_category(&self, owner: &UserId, id: &str, patch: &CategoryPatch) -> Result<(), StoreError> {
        self.record_write()?;
        let mut categories = self.categories.lock().unwrap();
        let category = categories
            .iter_mut()
            .find(|c| c.id == id && c.owner_id.as_ref() == Some(owner))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply(category);
        Ok(())
    }

    async fn delete_category(&self, owner: &UserId, id: &str) -> Result<(), StoreError> {
        self.record_write()?;
        let mut categories = self.categories.lock().unwrap();
        let before = categories.len();
        categories.retain(|c| !(c.id == id && c.owner_id.as_ref() == Some(owner)));
        if categories.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_cards(&self, owner: &UserId) -> Result<Vec<Card>, StoreError> {
        self.check_online()?;
        Ok(self
            .cards
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.owner_id.as_ref() == Some(owner))
            .cloned()
            .collect())
    }

    async fn insert_card(&self, owner: &UserId, card: &Card) -> Result<Card, StoreError> {
        self.record_write()?;
        if *self.fail_card_inserts.lock().unwrap() {
            return Err(StoreError::Api(500, "insert rejected".to_string()));
        }
        let mut stored = card.clone();
        stored.owner_id = Some(owner.clone());
        self.cards.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn update_card(&self, owner: &UserId, id: &str, patch: &CardPatch) -> Result<(), StoreError> {
        self.record_write()?;
        if self.failing_card_updates.lock().unwrap().contains(id) {
            return Err(StoreError::Network("reset by peer".to_string()));
        }
        let mut cards = self.cards.lock().unwrap();
        let card = cards
            .iter_mut()
            .find(|c| c.id == id && c.owner_id.as_ref() == Some(owner))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply(card);
        Ok(())
    }

    async fn delete_card(&self, owner: &UserId, id: &str) -> Result<(), StoreError> {
        self.record_write()?;
        if self.failing_card_deletes.lock().unwrap().contains(id) {
            return Err(StoreError::Api(500, "delete rejected".to_string()));
        }
        let mut cards = self.cards.lock().unwrap();
        let before = cards.len();
        cards.retain(|c| !(c.id == id && c.owner_id.as_ref() == Some(owner)));
        if cards.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Media host that remembers uploads and destroys
#[derive(Default)]
pub struct FakeMediaHost {
    pub uploads: Mutex<Vec<UploadedMedia>>,
    pub destroyed: Mutex<Vec<String>>,
    pub fail_uploads: Mutex<bool>,
    pub fail_destroys: Mutex<bool>,
    counter: AtomicUsize,
}

impl FakeMediaHost {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaHost for FakeMediaHost {
    async fn upload(&self, bytes: Vec<u8>, mime: &str, folder: &str) -> Result<UploadedMedia, MediaError> {
        if *self.fail_uploads.lock().unwrap() {
            return Err(MediaError::Network("upload timed out".to_string()));
        }
        assert_eq!(mime, "image/jpeg");
        assert!(!bytes.is_empty());

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let media = UploadedMedia {
            public_id: format!("{}/img-{}", folder, n),
            url: format!("https://media.example/{}/img-{}.jpg", folder, n),
        };
        self.uploads.lock().unwrap().push(media.clone());
        Ok(media)
    }

    async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        if *self.fail_destroys.lock().unwrap() {
            return Err(MediaError::Api(500, "destroy failed".to_string()));
        }
        self.destroyed.lock().unwrap().push(public_id.to_string());
        Ok(())
    }
}

/// Speaker that records utterances
#[derive(Default)]
pub struct RecordingSpeaker {
    pub spoken: Mutex<Vec<Utterance>>,
}

impl Speaker for RecordingSpeaker {
    fn speak(&self, utterance: &Utterance) {
        self.spoken.lock().unwrap().push(utterance.clone());
    }
}

/// Small PNG with some structure so JPEG encoding has work to do
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

pub fn png_source() -> ImageSource {
    ImageSource::Bytes {
        data: png_bytes(16, 16),
        mime: "image/png".to_string(),
    }
}

pub fn new_card(category_id: &str, label: &str) -> NewCard {
    NewCard {
        category_id: category_id.to_string(),
        label: label.to_string(),
        voice_label: None,
        image: ImageSource::Url(format!("https://cdn.example/{}.png", label.to_lowercase())),
    }
}

/// System content with a few bundled food and weather pictures
pub fn system_content(events: &EventBus) -> SystemContent {
    let catalog = AssetCatalog::new(vec![
        BundledAsset::new("food/apple.png", "/images/food/apple.png"),
        BundledAsset::new("food/bread.png", "/images/food/bread.png"),
        BundledAsset::new("weather/sunny.png", "/images/weather/sunny.png"),
    ]);
    SystemContent::load(&catalog, events)
}

/// System categories without any bundled cards
pub fn bare_system_content() -> SystemContent {
    SystemContent {
        categories: system_categories(),
        cards: Vec::new(),
    }
}

/// A user card owned by [`OWNER`] as the remote store would hold it
pub fn remote_card(id: &str, category_id: &str, label: &str, order: i64) -> Card {
    Card {
        id: id.to_string(),
        category_id: category_id.to_string(),
        image_url: format!("https://cdn.example/{}.png", id),
        label: label.to_string(),
        voice_label: None,
        is_system: false,
        order,
        created_at: None,
        media_id: None,
        owner_id: Some(owner()),
    }
}

pub fn remote_category(id: &str, name: &str) -> Category {
    let mut category = Category::user(name, "📁", "#123456", "social", Some(owner()));
    category.id = id.to_string();
    category
}

pub struct Board {
    pub manager: Arc<BoardManager>,
    pub store: Arc<FakeRemoteStore>,
    pub host: Arc<FakeMediaHost>,
    pub events: EventBus,
}

/// Manager over a fake remote store and media host, not yet initialized
pub fn board_with(store: FakeRemoteStore, system: SystemContent, policy: PolicyConfig) -> Board {
    let events = EventBus::new(256);
    let store = Arc::new(store);
    let host = Arc::new(FakeMediaHost::default());
    let pipeline = MediaPipeline::new(
        Some(host.clone() as Arc<dyn MediaHost>),
        MediaLimits::default(),
        "aac-test",
    );

    let manager = BoardManager::new(system, pipeline, policy, events.clone())
        .with_remote(store.clone() as Arc<dyn RemoteStore>);

    Board {
        manager: Arc::new(manager),
        store,
        host,
        events,
    }
}

/// Initialized manager for a signed-in owner with no bundled cards
pub async fn signed_in_board() -> Board {
    let board = board_with(
        FakeRemoteStore::signed_in(),
        bare_system_content(),
        PolicyConfig::default(),
    );
    board.manager.initialize().await;
    board
}
