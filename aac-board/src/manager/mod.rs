//! Card/category manager
//!
//! Single owner of the merged board. At startup it reconciles the bundled
//! catalog with either the remote store (authenticated session) or the local
//! cache (local mode), then serves every mutation:
//!
//! - the capability gate runs first: no session, no writes
//! - system categories and cards are never written
//! - the backing store is written before memory changes (reorder excepted,
//!   which applies first and rolls back if the moved card cannot be saved)
//! - mutations on one category are serialized through [`KeyedLocks`]
//!
//! Errors leave this module as [`BoardError`] only.

mod locks;
pub mod state;

pub use locks::KeyedLocks;
pub use state::{infer_group, BoardState, ReorderPlan, Session, SiblingUpdate};

use crate::catalog::SystemContent;
use crate::db::LocalCache;
use crate::error::{BoardError, BoardResult};
use crate::services::media_pipeline::{ImageSource, MediaPipeline};
use crate::services::remote_store::RemoteStore;
use aac_common::config::PolicyConfig;
use aac_common::events::{BoardEvent, EventBus};
use aac_common::models::{generate_card_id, CardPatch, CategoryPatch, MediaRef, UserId};
use aac_common::{Card, Category};
use chrono::Utc;
use futures::future::try_join;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Attempts to pin a card's category before giving up on a moving target
const CARD_LOCK_ATTEMPTS: usize = 3;

/// Input for [`BoardManager::add_card`]
#[derive(Debug, Clone)]
pub struct NewCard {
    pub category_id: String,
    pub label: String,
    pub voice_label: Option<String>,
    pub image: ImageSource,
}

/// Result of [`BoardManager::reorder_card`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReorderReport {
    pub card_id: String,
    /// Siblings whose new order could not be persisted
    pub failed_siblings: Vec<String>,
}

impl ReorderReport {
    pub fn is_clean(&self) -> bool {
        self.failed_siblings.is_empty()
    }
}

/// Result of [`BoardManager::add_cards`]
#[derive(Debug, Default)]
pub struct BulkAddReport {
    pub created: Vec<Card>,
    pub total: usize,
    /// 1-based index of the item that stopped the batch, with its error
    pub failure: Option<(usize, BoardError)>,
}

impl BulkAddReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure_message(&self) -> Option<String> {
        self.failure
            .as_ref()
            .map(|(index, e)| format!("failed at item {}/{}: {}", index, self.total, e))
    }
}

/// Where writes for the current session go
enum Backing {
    Remote {
        store: Arc<dyn RemoteStore>,
        owner: UserId,
    },
    Local(LocalCache),
}

impl Backing {
    fn owner(&self) -> Option<UserId> {
        match self {
            Backing::Remote { owner, .. } => Some(owner.clone()),
            Backing::Local(_) => None,
        }
    }

    async fn insert_category(&self, category: &Category) -> BoardResult<Category> {
        match self {
            Backing::Remote { store, owner } => Ok(store.insert_category(owner, category).await?),
            Backing::Local(cache) => Ok(cache.insert_category(category).await?),
        }
    }

    async fn update_category(&self, id: &str, patch: &CategoryPatch) -> BoardResult<()> {
        match self {
            Backing::Remote { store, owner } => Ok(store.update_category(owner, id, patch).await?),
            Backing::Local(cache) => Ok(cache.update_category(id, patch).await?),
        }
    }

    async fn delete_category(&self, id: &str) -> BoardResult<()> {
        match self {
            Backing::Remote { store, owner } => Ok(store.delete_category(owner, id).await?),
            Backing::Local(cache) => {
                cache.delete_category(id).await?;
                Ok(())
            }
        }
    }

    async fn insert_card(&self, card: &Card) -> BoardResult<Card> {
        match self {
            Backing::Remote { store, owner } => Ok(store.insert_card(owner, card).await?),
            Backing::Local(cache) => Ok(cache.insert_card(card).await?),
        }
    }

    async fn update_card(&self, id: &str, patch: &CardPatch) -> BoardResult<()> {
        match self {
            Backing::Remote { store, owner } => Ok(store.update_card(owner, id, patch).await?),
            Backing::Local(cache) => Ok(cache.update_card(id, patch).await?),
        }
    }

    async fn delete_card(&self, id: &str) -> BoardResult<()> {
        match self {
            Backing::Remote { store, owner } => Ok(store.delete_card(owner, id).await?),
            Backing::Local(cache) => Ok(cache.delete_card(id).await?),
        }
    }
}

/// The board aggregate
pub struct BoardManager {
    system: SystemContent,
    pipeline: MediaPipeline,
    policy: PolicyConfig,
    events: EventBus,
    remote: Option<Arc<dyn RemoteStore>>,
    cache: Option<LocalCache>,
    cache_error: Option<String>,
    state: RwLock<BoardState>,
    locks: KeyedLocks,
}

impl BoardManager {
    /// Manager showing system content until [`initialize`](Self::initialize) runs
    pub fn new(system: SystemContent, pipeline: MediaPipeline, policy: PolicyConfig, events: EventBus) -> Self {
        let state = BoardState::system_only(&system, Session::Anonymous);
        Self {
            system,
            pipeline,
            policy,
            events,
            remote: None,
            cache: None,
            cache_error: None,
            state: RwLock::new(state),
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_cache(mut self, cache: LocalCache) -> Self {
        self.cache = Some(cache);
        self.cache_error = None;
        self
    }

    /// Record that the local cache failed to open; surfaced by `initialize`
    pub fn with_cache_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.cache = None;
        self.cache_error = Some(reason.into());
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn pipeline(&self) -> &MediaPipeline {
        &self.pipeline
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// Reconcile catalog, session and user content
    ///
    /// Never fails. Any problem leaves at least the system content in place
    /// and is reported through [`error`](Self::error).
    pub async fn initialize(&self) {
        let mut problems: Vec<String> = Vec::new();

        if let Some(reason) = &self.cache_error {
            warn!(reason = %reason, "Local cache unavailable, continuing without it");
            problems.push(format!("Local cache unavailable: {}", reason));
        }

        let session = self.detect_session(&mut problems).await;
        debug!(session = ?session, "Session resolved");

        let content = match &session {
            Session::Anonymous => Ok((Vec::new(), Vec::new())),
            Session::Authenticated(user) => self.fetch_remote(user).await,
            Session::Local => self.fetch_local().await,
        };

        let mut state = match content {
            Ok((categories, cards)) => {
                let reconciled = BoardState::reconcile(&self.system, session, categories, cards);
                for id in &reconciled.shadowed_categories {
                    warn!(category_id = %id, "User category shadows a system id, ignored");
                }
                if !reconciled.orphaned_cards.is_empty() {
                    info!(
                        count = reconciled.orphaned_cards.len(),
                        "Excluded cards whose category no longer exists"
                    );
                }
                reconciled.state
            }
            Err(e) => {
                warn!(error = %e, "Loading user content failed, showing system content only");
                problems.push(format!("Could not load your cards: {}", e));
                BoardState::system_only(&self.system, session)
            }
        };

        if !problems.is_empty() {
            let reason = problems.join("; ");
            self.events.emit_lossy(BoardEvent::InitializationDegraded {
                reason: reason.clone(),
            });
            state.error = Some(reason);
        }

        let (categories, cards) = (state.categories.len(), state.cards.len());
        *self.state.write().await = state;

        info!(categories, cards, "Board initialized");
        self.events.emit_lossy(BoardEvent::BoardLoaded {
            categories,
            cards,
            timestamp: Utc::now(),
        });
    }

    async fn detect_session(&self, problems: &mut Vec<String>) -> Session {
        let local_fallback = if self.policy.local_mode && self.cache.is_some() {
            Session::Local
        } else {
            Session::Anonymous
        };

        let Some(remote) = &self.remote else {
            return local_fallback;
        };

        match remote.current_user().await {
            Ok(Some(user)) => Session::Authenticated(user),
            Ok(None) => local_fallback,
            Err(e) => {
                let e = BoardError::from(e);
                warn!(error = %e, "Session check failed");
                problems.push(format!("Could not check your session: {}", e));
                local_fallback
            }
        }
    }

    async fn fetch_remote(&self, user: &UserId) -> BoardResult<(Vec<Category>, Vec<Card>)> {
        let remote = self.remote.as_ref().ok_or(BoardError::AuthRequired)?;
        let (categories, cards) =
            try_join(remote.list_categories(user), remote.list_cards(user)).await?;

        // Only trust records the backend reports as this user's
        let categories = categories
            .into_iter()
            .filter(|c| c.owner_id.as_ref() == Some(user))
            .collect();
        let cards = cards
            .into_iter()
            .filter(|c| c.owner_id.as_ref() == Some(user))
            .collect();
        Ok((categories, cards))
    }

    async fn fetch_local(&self) -> BoardResult<(Vec<Category>, Vec<Card>)> {
        let cache = self.cache.as_ref().ok_or(BoardError::AuthRequired)?;
        Ok(try_join(cache.list_categories(), cache.list_cards()).await?)
    }

    // ------------------------------------------------------------------
    // Readers
    // ------------------------------------------------------------------

    pub async fn snapshot(&self) -> BoardState {
        self.state.read().await.clone()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.state.read().await.categories.clone()
    }

    pub async fn cards(&self) -> Vec<Card> {
        self.state.read().await.cards.clone()
    }

    /// Cards of one category in display order
    pub async fn cards_in(&self, category_id: &str) -> Vec<Card> {
        self.state.read().await.cards_in(category_id)
    }

    pub async fn display_categories(&self) -> Vec<Category> {
        self.state.read().await.display_categories()
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub async fn session(&self) -> Session {
        self.state.read().await.session.clone()
    }

    // ------------------------------------------------------------------
    // Gate and ownership
    // ------------------------------------------------------------------

    async fn backing(&self) -> BoardResult<Backing> {
        match self.session().await {
            Session::Authenticated(owner) => {
                let store = self.remote.clone().ok_or(BoardError::AuthRequired)?;
                Ok(Backing::Remote { store, owner })
            }
            Session::Local => {
                let cache = self.cache.clone().ok_or(BoardError::AuthRequired)?;
                Ok(Backing::Local(cache))
            }
            Session::Anonymous => Err(BoardError::AuthRequired),
        }
    }

    /// A user category this session may modify
    fn owned_category(state: &BoardState, id: &str) -> BoardResult<Category> {
        let category = state
            .category(id)
            .ok_or_else(|| BoardError::NotFound(format!("category {}", id)))?;
        if category.is_system {
            return Err(BoardError::Immutable(format!("category {}", id)));
        }
        if !state.session.owns(category.owner_id.as_ref()) {
            return Err(BoardError::Forbidden(format!("category {} belongs to another user", id)));
        }
        Ok(category.clone())
    }

    /// A user card this session may modify
    fn owned_card(state: &BoardState, id: &str) -> BoardResult<Card> {
        let card = state
            .card(id)
            .ok_or_else(|| BoardError::NotFound(format!("card {}", id)))?;
        if card.is_system {
            return Err(BoardError::Immutable(format!("card {}", id)));
        }
        if !state.session.owns(card.owner_id.as_ref()) {
            return Err(BoardError::Forbidden(format!("card {} belongs to another user", id)));
        }
        Ok(card.clone())
    }

    /// A category that may receive user cards
    fn writable_target(&self, state: &BoardState, id: &str) -> BoardResult<()> {
        let category = state
            .category(id)
            .ok_or_else(|| BoardError::NotFound(format!("category {}", id)))?;
        if category.is_system {
            if !self.policy.allow_cards_in_system_categories {
                return Err(BoardError::Forbidden(format!(
                    "cards cannot be added to system category {}",
                    id
                )));
            }
            return Ok(());
        }
        if !state.session.owns(category.owner_id.as_ref()) {
            return Err(BoardError::Forbidden(format!("category {} belongs to another user", id)));
        }
        Ok(())
    }

    /// Lock the category a card currently lives in
    ///
    /// Re-checks after acquiring, since a concurrent reorder may have moved
    /// the card while we waited.
    async fn lock_card(&self, card_id: &str) -> BoardResult<(Card, tokio::sync::OwnedMutexGuard<()>)> {
        for _ in 0..CARD_LOCK_ATTEMPTS {
            let category_id = {
                let state = self.state.read().await;
                Self::owned_card(&state, card_id)?.category_id
            };

            let guard = self.locks.lock(&category_id).await;
            let state = self.state.read().await;
            let card = Self::owned_card(&state, card_id)?;
            if card.category_id == category_id {
                return Ok((card, guard));
            }
            debug!(card_id = %card_id, "Card moved while waiting for its category lock, retrying");
        }

        Err(BoardError::NotFound(format!("card {} is being moved", card_id)))
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    pub async fn add_category(&self, name: &str, icon: &str, color: &str) -> BoardResult<Category> {
        let backing = self.backing().await?;

        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::Validation("category name must not be empty".to_string()));
        }

        let group = infer_group(name, &self.system.categories);
        let category = Category::user(name, icon, color, &group, backing.owner());
        let mut stored = backing.insert_category(&category).await?;
        stored.is_system = false;
        stored.is_temporary = false;

        {
            let mut state = self.state.write().await;
            state.categories.push(stored.clone());
            state.temporary = None;
        }

        info!(category_id = %stored.id, group = %stored.group, "Category added");
        self.events.emit_lossy(BoardEvent::CategoryAdded {
            category_id: stored.id.clone(),
        });
        Ok(stored)
    }

    pub async fn update_category(&self, id: &str, patch: CategoryPatch) -> BoardResult<Category> {
        let backing = self.backing().await?;
        let _guard = self.locks.lock(id).await;

        let current = Self::owned_category(&*self.state.read().await, id)?;
        if patch.is_empty() {
            return Ok(current);
        }
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(BoardError::Validation("category name must not be empty".to_string()));
            }
        }

        backing.update_category(id, &patch).await?;

        let mut updated = current;
        patch.apply(&mut updated);
        {
            let mut state = self.state.write().await;
            if let Some(entry) = state.categories.iter_mut().find(|c| c.id == id) {
                *entry = updated.clone();
            }
        }

        info!(category_id = %id, "Category updated");
        self.events.emit_lossy(BoardEvent::CategoryUpdated {
            category_id: id.to_string(),
        });
        Ok(updated)
    }

    /// Delete a user category and every card in it
    ///
    /// Cards are removed one at a time. If any card cannot be deleted the
    /// category stays, the cards that were deleted are gone from memory and
    /// a [`BoardError::PartialDelete`] lists the failures.
    pub async fn delete_category(&self, id: &str) -> BoardResult<usize> {
        let backing = self.backing().await?;
        let _guard = self.locks.lock(id).await;

        let cards: Vec<Card> = {
            let state = self.state.read().await;
            Self::owned_category(&state, id)?;
            state.cards.iter().filter(|c| c.category_id == id).cloned().collect()
        };

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for card in &cards {
            match self.remove_card_record(&backing, card).await {
                Ok(()) => deleted.push(card.id.clone()),
                Err(e) => {
                    warn!(card_id = %card.id, category_id = %id, error = %e, "Cascade card delete failed");
                    failed.push(card.id.clone());
                }
            }
        }

        self.state
            .write()
            .await
            .cards
            .retain(|c| !deleted.contains(&c.id));

        if !failed.is_empty() {
            error!(
                category_id = %id,
                deleted = deleted.len(),
                failed = failed.len(),
                "Category delete incomplete"
            );
            return Err(BoardError::PartialDelete {
                target: format!("category {}", id),
                deleted: deleted.len(),
                failed,
            });
        }

        backing.delete_category(id).await?;

        {
            let mut state = self.state.write().await;
            state.categories.retain(|c| c.id != id);
            state.cards.retain(|c| c.category_id != id);
        }

        info!(category_id = %id, cards_removed = deleted.len(), "Category deleted");
        self.events.emit_lossy(BoardEvent::CategoryDeleted {
            category_id: id.to_string(),
            cards_removed: deleted.len(),
        });
        Ok(deleted.len())
    }

    /// Draft category shown while the creation flow is open
    pub async fn set_temporary_category(&self, name: &str, icon: &str, color: &str) -> BoardResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::Validation("category name must not be empty".to_string()));
        }

        let group = infer_group(name, &self.system.categories);
        let mut draft = Category::user(name, icon, color, &group, None);
        draft.is_temporary = true;

        self.state.write().await.temporary = Some(draft.clone());
        Ok(draft)
    }

    pub async fn clear_temporary_category(&self) {
        self.state.write().await.temporary = None;
    }

    // ------------------------------------------------------------------
    // Cards
    // ------------------------------------------------------------------

    pub async fn add_card(&self, new_card: NewCard) -> BoardResult<Card> {
        let backing = self.backing().await?;

        let label = new_card.label.trim().to_string();
        if label.is_empty() {
            return Err(BoardError::Validation("card label must not be empty".to_string()));
        }

        let _guard = self.locks.lock(&new_card.category_id).await;
        self.writable_target(&*self.state.read().await, &new_card.category_id)?;

        let media = self.pipeline.ingest(new_card.image).await?;

        let order = self.state.read().await.next_order(&new_card.category_id);
        let card = Card {
            id: generate_card_id(),
            category_id: new_card.category_id.clone(),
            image_url: media.url,
            label,
            voice_label: new_card
                .voice_label
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            is_system: false,
            order,
            created_at: Some(Utc::now()),
            media_id: media.public_id,
            owner_id: backing.owner(),
        };

        let mut stored = match backing.insert_card(&card).await {
            Ok(stored) => stored,
            Err(e) => {
                if let Some(public_id) = &card.media_id {
                    self.pipeline.delete(public_id).await;
                }
                return Err(e);
            }
        };
        stored.is_system = false;

        self.state.write().await.cards.push(stored.clone());

        info!(card_id = %stored.id, category_id = %stored.category_id, order = stored.order, "Card added");
        self.events.emit_lossy(BoardEvent::CardAdded {
            card_id: stored.id.clone(),
            category_id: stored.category_id.clone(),
        });
        Ok(stored)
    }

    /// Add cards one after another, stopping at the first failure
    ///
    /// Cards created before the failure are kept.
    pub async fn add_cards(&self, items: Vec<NewCard>) -> BoardResult<BulkAddReport> {
        self.backing().await?;

        let mut report = BulkAddReport {
            total: items.len(),
            ..Default::default()
        };

        for (index, item) in items.into_iter().enumerate() {
            match self.add_card(item).await {
                Ok(card) => report.created.push(card),
                Err(e) => {
                    warn!(item = index + 1, total = report.total, error = %e, "Bulk add stopped");
                    report.failure = Some((index + 1, e));
                    break;
                }
            }
        }

        Ok(report)
    }

    pub async fn delete_card(&self, id: &str) -> BoardResult<()> {
        let backing = self.backing().await?;
        let (card, _guard) = self.lock_card(id).await?;

        self.remove_card_record(&backing, &card).await?;
        self.state.write().await.cards.retain(|c| c.id != id);

        info!(card_id = %id, category_id = %card.category_id, "Card deleted");
        self.events.emit_lossy(BoardEvent::CardDeleted {
            card_id: id.to_string(),
            category_id: card.category_id,
        });
        Ok(())
    }

    /// Media (best-effort) then record; caller holds the category lock
    async fn remove_card_record(&self, backing: &Backing, card: &Card) -> BoardResult<()> {
        if let Some(public_id) = &card.media_id {
            self.pipeline.delete(public_id).await;
        }

        match backing.delete_card(&card.id).await {
            Ok(()) => Ok(()),
            // Already gone from the store is the outcome we wanted
            Err(BoardError::NotFound(_)) => {
                debug!(card_id = %card.id, "Card already absent from backing store");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Move a card and renumber the target category
    ///
    /// Indices address the display order of [`cards_in`](Self::cards_in) and
    /// are clamped. Moving a system card fails with `Immutable`. The moved
    /// card is written first; if that fails nothing changes. Sibling
    /// writes follow one by one, and failures are logged and reported without
    /// undoing the new in-memory order.
    pub async fn reorder_card(
        &self,
        source_category_id: &str,
        target_category_id: &str,
        source_index: usize,
        target_index: usize,
    ) -> BoardResult<ReorderReport> {
        let backing = self.backing().await?;
        let _guards = self
            .locks
            .lock_many(&[source_category_id, target_category_id])
            .await;

        let plan = {
            let mut state = self.state.write().await;
            if state.category(source_category_id).is_none() {
                return Err(BoardError::NotFound(format!("category {}", source_category_id)));
            }
            self.writable_target(&state, target_category_id)?;

            let plan = state.plan_reorder(source_category_id, target_category_id, source_index, target_index)?;
            Self::owned_card(&state, &plan.card_id)?;
            for sibling in &plan.siblings {
                Self::owned_card(&state, &sibling.card_id)?;
            }

            state.apply_reorder(&plan);
            plan
        };

        if let Err(e) = backing.update_card(&plan.card_id, &plan.moved_patch()).await {
            warn!(card_id = %plan.card_id, error = %e, "Moved card write failed, reverting reorder");
            self.state.write().await.revert_reorder(&plan);
            return Err(e);
        }

        let mut report = ReorderReport {
            card_id: plan.card_id.clone(),
            failed_siblings: Vec::new(),
        };
        for sibling in &plan.siblings {
            let patch = CardPatch {
                order: Some(sibling.order),
                ..Default::default()
            };
            if let Err(e) = backing.update_card(&sibling.card_id, &patch).await {
                warn!(
                    card_id = %sibling.card_id,
                    order = sibling.order,
                    error = %e,
                    "Sibling order write failed, backing store keeps the old order"
                );
                report.failed_siblings.push(sibling.card_id.clone());
            }
        }

        info!(
            card_id = %plan.card_id,
            source_category_id = %source_category_id,
            target_category_id = %target_category_id,
            order = plan.order,
            renumbered = plan.siblings.len(),
            "Card reordered"
        );
        self.events.emit_lossy(BoardEvent::CardsReordered {
            card_id: plan.card_id,
            source_category_id: source_category_id.to_string(),
            target_category_id: target_category_id.to_string(),
        });
        Ok(report)
    }

    /// Delete every user card the session owns, keeping categories
    pub async fn clear_custom_cards(&self) -> BoardResult<usize> {
        self.backing().await?;

        let ids: Vec<String> = {
            let state = self.state.read().await;
            state
                .cards
                .iter()
                .filter(|c| !c.is_system && state.session.owns(c.owner_id.as_ref()))
                .map(|c| c.id.clone())
                .collect()
        };

        let mut deleted = 0;
        let mut failed = Vec::new();
        for id in ids {
            match self.delete_card(&id).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(card_id = %id, error = %e, "Custom card delete failed");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            return Err(BoardError::PartialDelete {
                target: "custom cards".to_string(),
                deleted,
                failed,
            });
        }

        info!(deleted, "Custom cards cleared");
        Ok(deleted)
    }

    // ------------------------------------------------------------------
    // Media sync hooks
    // ------------------------------------------------------------------

    /// User cards whose image is still inline
    pub async fn pending_uploads(&self) -> Vec<Card> {
        let state = self.state.read().await;
        state
            .cards
            .iter()
            .filter(|c| c.needs_upload() && state.session.owns(c.owner_id.as_ref()))
            .cloned()
            .collect()
    }

    /// Point a card at its hosted image
    pub async fn attach_media(&self, card_id: &str, media: &MediaRef) -> BoardResult<Card> {
        let backing = self.backing().await?;
        let (card, _guard) = self.lock_card(card_id).await?;

        let patch = CardPatch {
            image_url: Some(media.url.clone()),
            media_id: media.public_id.clone(),
            ..Default::default()
        };
        backing.update_card(card_id, &patch).await?;

        let mut updated = card;
        patch.apply(&mut updated);
        if let Some(entry) = self.state.write().await.card_mut(card_id) {
            *entry = updated.clone();
        }

        debug!(card_id = %card_id, "Hosted image attached");
        Ok(updated)
    }
}
