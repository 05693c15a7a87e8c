//! # aac-board
//!
//! Card/category management and sync for an AAC picture board:
//! - [`catalog`]: bundled system categories and cards
//! - [`db`]: local offline cache (SQLite)
//! - [`services`]: remote store, media host, media pipeline and media sync
//! - [`manager`]: the reconciling card/category manager
//! - [`selection`]: the phrase being assembled and spoken

pub mod catalog;
pub mod db;
pub mod error;
pub mod manager;
pub mod selection;
pub mod services;

pub use error::{BoardError, BoardResult};
pub use manager::{BoardManager, BulkAddReport, NewCard, ReorderReport, Session};
pub use selection::{SelectionStore, Speaker, Utterance};

use aac_common::config::BoardConfig;
use aac_common::events::EventBus;
use catalog::{AssetCatalog, SystemContent};
use db::LocalCache;
use services::media_host::{CloudinaryHost, MediaHost, MediaError};
use services::media_pipeline::{MediaLimits, MediaPipeline};
use services::remote_store::PostgrestStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Assemble a manager from configuration
///
/// Missing optional collaborators degrade the board instead of failing:
/// no `[media]` means images stay inline, a cache that will not open is
/// reported by `initialize`. Call [`BoardManager::initialize`] next.
pub async fn build_manager(config: &BoardConfig, events: EventBus) -> BoardResult<BoardManager> {
    let catalog = AssetCatalog::scan(&config.catalog.asset_root, &config.catalog.url_prefix);
    let system = SystemContent::load(&catalog, &events);

    let pipeline = match &config.media {
        Some(media) => {
            let host: Option<Arc<dyn MediaHost>> = match CloudinaryHost::new(media) {
                Ok(host) => Some(Arc::new(host)),
                Err(MediaError::NotConfigured) => {
                    warn!("Media host credentials incomplete, images stay inline");
                    None
                }
                Err(e) => return Err(e.into()),
            };
            MediaPipeline::new(host, MediaLimits::from(media), media.folder.clone())
        }
        None => MediaPipeline::without_host(),
    };

    let mut manager = BoardManager::new(system, pipeline, config.policy.clone(), events);

    if let Some(remote) = &config.remote {
        let store = PostgrestStore::new(remote)?;
        info!(base_url = %remote.base_url, "Remote store configured");
        manager = manager.with_remote(Arc::new(store));
    }

    if config.cache.enabled {
        manager = match LocalCache::open(&config.cache.database_path).await {
            Ok(cache) => manager.with_cache(cache),
            Err(e) => manager.with_cache_unavailable(e.to_string()),
        };
    }

    Ok(manager)
}
