//! Reconciled board state
//!
//! Pure data: no I/O and no locking. The manager owns one [`BoardState`]
//! behind a lock and uses the helpers here to merge sources, compute
//! orderings and plan reorders.

use crate::catalog::SystemContent;
use crate::error::{BoardError, BoardResult};
use aac_common::models::{CardPatch, UserId, DEFAULT_GROUP};
use aac_common::{Card, Category};
use std::collections::HashSet;

/// Who is driving the board
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    /// No session: system content only, mutations rejected
    #[default]
    Anonymous,
    /// No remote session, writes go to the local cache
    Local,
    Authenticated(UserId),
}

impl Session {
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Session::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn can_write(&self) -> bool {
        !matches!(self, Session::Anonymous)
    }

    /// Whether a user record with this owner belongs to the session
    pub fn owns(&self, owner: Option<&UserId>) -> bool {
        match self {
            Session::Authenticated(user) => owner == Some(user),
            Session::Local => owner.is_none(),
            Session::Anonymous => false,
        }
    }
}

/// Merged view of system and user content
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    /// System categories first, then user categories in load order
    pub categories: Vec<Category>,
    /// Insertion order is the tie-break for equal `order` values
    pub cards: Vec<Card>,
    pub session: Session,
    /// Non-fatal error surfaced by the last initialization
    pub error: Option<String>,
    /// Draft category shown during the creation flow
    pub temporary: Option<Category>,
}

/// Outcome of merging user content over system content
#[derive(Debug, Default)]
pub struct Reconciled {
    pub state: BoardState,
    pub shadowed_categories: Vec<String>,
    pub orphaned_cards: Vec<String>,
}

impl BoardState {
    pub fn system_only(system: &SystemContent, session: Session) -> Self {
        Self {
            categories: system.categories.clone(),
            cards: system.cards.clone(),
            session,
            error: None,
            temporary: None,
        }
    }

    /// Merge user records over system content
    ///
    /// User categories whose id collides with a system id are dropped, as
    /// are user cards whose category does not resolve.
    pub fn reconcile(
        system: &SystemContent,
        session: Session,
        user_categories: Vec<Category>,
        user_cards: Vec<Card>,
    ) -> Reconciled {
        let mut state = Self::system_only(system, session);
        let mut known: HashSet<String> = state.categories.iter().map(|c| c.id.clone()).collect();
        let mut shadowed_categories = Vec::new();
        let mut orphaned_cards = Vec::new();

        for mut category in user_categories {
            if known.contains(&category.id) {
                shadowed_categories.push(category.id);
                continue;
            }
            category.is_system = false;
            category.is_temporary = false;
            if category.group.is_empty() {
                category.group = DEFAULT_GROUP.to_string();
            }
            known.insert(category.id.clone());
            state.categories.push(category);
        }

        let system_card_ids: HashSet<&str> = system.cards.iter().map(|c| c.id.as_str()).collect();
        let mut user_kept = Vec::new();
        for mut card in user_cards {
            if !known.contains(&card.category_id) || system_card_ids.contains(card.id.as_str()) {
                orphaned_cards.push(card.id);
                continue;
            }
            card.is_system = false;
            user_kept.push(card);
        }
        state.cards.extend(user_kept);

        Reconciled {
            state,
            shadowed_categories,
            orphaned_cards,
        }
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn card_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id == id)
    }

    /// All cards of a category, ascending by `order`, ties in insertion order
    pub fn cards_in(&self, category_id: &str) -> Vec<Card> {
        let mut cards: Vec<Card> = self
            .cards
            .iter()
            .filter(|c| c.category_id == category_id)
            .cloned()
            .collect();
        // sort_by_key is stable
        cards.sort_by_key(|c| c.order);
        cards
    }

    /// Order for a card appended to `category_id`
    pub fn next_order(&self, category_id: &str) -> i64 {
        self.cards
            .iter()
            .filter(|c| c.category_id == category_id)
            .map(|c| c.order)
            .max()
            .map(|max| max + 1)
            .unwrap_or(0)
    }

    /// Categories (plus the draft) sorted by group, then name
    pub fn display_categories(&self) -> Vec<Category> {
        let mut categories = self.categories.clone();
        if let Some(temporary) = &self.temporary {
            categories.push(temporary.clone());
        }
        categories.sort_by(|a, b| a.group.cmp(&b.group).then_with(|| a.name.cmp(&b.name)));
        categories
    }

    /// Compute a move without touching state
    ///
    /// Indices address the display views returned by [`cards_in`]. The source
    /// index is clamped to the last card and must name a user card. System
    /// cards sort ahead of user cards, so the target index is clamped into
    /// `pinned..=len`. User cards in the target view are renumbered to their
    /// position; system cards are never written.
    ///
    /// [`cards_in`]: BoardState::cards_in
    pub fn plan_reorder(
        &self,
        source_category_id: &str,
        target_category_id: &str,
        source_index: usize,
        target_index: usize,
    ) -> BoardResult<ReorderPlan> {
        let mut source_view = self.cards_in(source_category_id);
        if source_view.is_empty() {
            return Err(BoardError::NotFound(format!(
                "no cards in category {}",
                source_category_id
            )));
        }

        let source_index = source_index.min(source_view.len() - 1);
        if source_view[source_index].is_system {
            return Err(BoardError::Immutable(format!(
                "card {}",
                source_view[source_index].id
            )));
        }
        let moved = source_view.remove(source_index);

        let mut target_view = if source_category_id == target_category_id {
            source_view
        } else {
            self.cards_in(target_category_id)
        };
        let pinned = target_view.iter().take_while(|c| c.is_system).count();
        let target_index = target_index.clamp(pinned, target_view.len());
        target_view.insert(target_index, moved.clone());

        let mut siblings = Vec::new();
        let mut moved_order = 0;
        for (position, card) in target_view.iter().enumerate() {
            let position = position as i64;
            if card.id == moved.id {
                moved_order = position;
            } else if !card.is_system && card.order != position {
                siblings.push(SiblingUpdate {
                    card_id: card.id.clone(),
                    previous: card.order,
                    order: position,
                });
            }
        }

        Ok(ReorderPlan {
            card_id: moved.id,
            previous_category_id: moved.category_id,
            previous_order: moved.order,
            target_category_id: target_category_id.to_string(),
            order: moved_order,
            siblings,
        })
    }

    /// Apply a plan in memory
    pub fn apply_reorder(&mut self, plan: &ReorderPlan) {
        if let Some(card) = self.card_mut(&plan.card_id) {
            card.category_id = plan.target_category_id.clone();
            card.order = plan.order;
        }
        for sibling in &plan.siblings {
            if let Some(card) = self.card_mut(&sibling.card_id) {
                card.order = sibling.order;
            }
        }
    }

    /// Undo [`apply_reorder`](Self::apply_reorder)
    pub fn revert_reorder(&mut self, plan: &ReorderPlan) {
        if let Some(card) = self.card_mut(&plan.card_id) {
            card.category_id = plan.previous_category_id.clone();
            card.order = plan.previous_order;
        }
        for sibling in &plan.siblings {
            if let Some(card) = self.card_mut(&sibling.card_id) {
                card.order = sibling.previous;
            }
        }
    }
}

/// A planned card move plus the sibling renumbering it causes
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderPlan {
    pub card_id: String,
    pub previous_category_id: String,
    pub previous_order: i64,
    pub target_category_id: String,
    pub order: i64,
    /// Target siblings whose order changes
    pub siblings: Vec<SiblingUpdate>,
}

impl ReorderPlan {
    pub fn moved_patch(&self) -> CardPatch {
        CardPatch {
            category_id: Some(self.target_category_id.clone()),
            order: Some(self.order),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiblingUpdate {
    pub card_id: String,
    pub previous: i64,
    pub order: i64,
}

/// Group for a new user category
///
/// First system category (in fixed order) whose name contains the new name,
/// or is contained by it, case-insensitively. Falls back to `social`.
pub fn infer_group(name: &str, system_categories: &[Category]) -> String {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return DEFAULT_GROUP.to_string();
    }

    system_categories
        .iter()
        .filter(|c| c.is_system)
        .find(|c| {
            let existing = c.name.to_lowercase();
            existing.contains(&needle) || needle.contains(&existing)
        })
        .map(|c| c.group.clone())
        .unwrap_or_else(|| DEFAULT_GROUP.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::system_categories;

    fn user_card(id: &str, category_id: &str, order: i64) -> Card {
        Card {
            id: id.to_string(),
            category_id: category_id.to_string(),
            image_url: format!("/images/{}.png", id),
            label: id.to_string(),
            voice_label: None,
            is_system: false,
            order,
            created_at: None,
            media_id: None,
            owner_id: None,
        }
    }

    fn system() -> SystemContent {
        SystemContent {
            categories: system_categories(),
            cards: Vec::new(),
        }
    }

    fn state_with(cards: Vec<Card>) -> BoardState {
        BoardState::reconcile(&system(), Session::Local, Vec::new(), cards).state
    }

    fn labels(cards: &[Card]) -> Vec<&str> {
        cards.iter().map(|c| c.label.as_str()).collect()
    }

    #[test]
    fn test_group_inference() {
        let categories = system_categories();
        assert_eq!(infer_group("Hobbies", &categories), "social");
        assert_eq!(infer_group("comidas", &categories), "daily");
        assert_eq!(infer_group("Animais de estimação", &categories), "nature");
        assert_eq!(infer_group("Cores vivas", &categories), "expressions");
    }

    #[test]
    fn test_group_inference_first_match_wins() {
        // "o" is contained in several system names; the first in fixed order wins
        let categories = system_categories();
        let first = categories
            .iter()
            .find(|c| c.name.to_lowercase().contains('o'))
            .unwrap();
        assert_eq!(infer_group("o", &categories), first.group);
    }

    #[test]
    fn test_sort_is_stable_for_equal_orders() {
        let state = state_with(vec![
            user_card("b", "food", 1),
            user_card("x", "food", 0),
            user_card("y", "food", 1),
            user_card("z", "food", 0),
        ]);
        assert_eq!(labels(&state.cards_in("food")), vec!["x", "z", "b", "y"]);
    }

    #[test]
    fn test_reconcile_drops_orphans_and_shadowed_ids() {
        let mut shadow = Category::user("Food", "🍎", "#000000", "daily", None);
        shadow.id = "food".to_string();
        let hobbies = Category::user("Hobbies", "🎮", "#123456", "social", None);
        let hobbies_id = hobbies.id.clone();

        let reconciled = BoardState::reconcile(
            &system(),
            Session::Local,
            vec![shadow, hobbies],
            vec![user_card("a", &hobbies_id, 0), user_card("lost", "deleted-cat", 0)],
        );

        assert_eq!(reconciled.shadowed_categories, vec!["food".to_string()]);
        assert_eq!(reconciled.orphaned_cards, vec!["lost".to_string()]);
        assert!(reconciled.state.category("food").unwrap().is_system);
        assert_eq!(reconciled.state.cards.len(), 1);
    }

    #[test]
    fn test_next_order_appends() {
        let state = state_with(vec![user_card("a", "food", 0), user_card("b", "food", 7)]);
        assert_eq!(state.next_order("food"), 8);
        assert_eq!(state.next_order("weather"), 0);
    }

    #[test]
    fn test_reorder_within_category() {
        let mut state = state_with(vec![
            user_card("Apple", "food", 0),
            user_card("Bread", "food", 1),
            user_card("Milk", "food", 2),
        ]);

        let plan = state.plan_reorder("food", "food", 2, 0).unwrap();
        assert_eq!(plan.order, 0);
        assert_eq!(plan.siblings.len(), 2);

        state.apply_reorder(&plan);
        let view = state.cards_in("food");
        assert_eq!(labels(&view), vec!["Milk", "Apple", "Bread"]);
        assert_eq!(view.iter().map(|c| c.order).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_reorder_across_categories_renumbers_target_densely() {
        let mut state = state_with(vec![
            user_card("Apple", "food", 0),
            user_card("Sun", "weather", 3),
            user_card("Rain", "weather", 9),
        ]);

        let plan = state.plan_reorder("food", "weather", 0, 1).unwrap();
        state.apply_reorder(&plan);

        let weather = state.cards_in("weather");
        assert_eq!(labels(&weather), vec!["Sun", "Apple", "Rain"]);
        assert_eq!(weather.iter().map(|c| c.order).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(state.cards_in("food").is_empty());
    }

    #[test]
    fn test_reorder_clamps_out_of_range_indices() {
        let mut state = state_with(vec![
            user_card("Apple", "food", 0),
            user_card("Bread", "food", 1),
            user_card("Milk", "food", 2),
        ]);

        let plan = state.plan_reorder("food", "food", 0, 99).unwrap();
        state.apply_reorder(&plan);
        assert_eq!(labels(&state.cards_in("food")), vec!["Bread", "Milk", "Apple"]);

        let plan = state.plan_reorder("food", "food", 99, 0).unwrap();
        assert_eq!(plan.card_id, "Apple");
    }

    #[test]
    fn test_reorder_empty_source_not_found() {
        let state = state_with(Vec::new());
        assert!(matches!(
            state.plan_reorder("food", "food", 0, 0),
            Err(BoardError::NotFound(_))
        ));
    }

    fn pictured_food(user_cards: Vec<Card>) -> BoardState {
        let mut system = system();
        for id in ["Apple", "Bread"] {
            let mut card = user_card(id, "food", 0);
            card.is_system = true;
            system.cards.push(card);
        }
        BoardState::reconcile(&system, Session::Local, Vec::new(), user_cards).state
    }

    #[test]
    fn test_reorder_rejects_system_card_at_source_index() {
        let state = pictured_food(vec![user_card("Soup", "food", 1), user_card("Rice", "food", 2)]);

        let result = state.plan_reorder("food", "food", 0, 3);
        assert!(matches!(result, Err(BoardError::Immutable(_))));
    }

    #[test]
    fn test_reorder_orders_match_display_positions_after_pinned_system_cards() {
        let mut state = pictured_food(vec![user_card("Soup", "food", 1), user_card("Rice", "food", 2)]);

        let plan = state.plan_reorder("food", "food", 3, 0).unwrap();
        assert_eq!(plan.card_id, "Rice");
        assert_eq!(plan.order, 2);
        assert!(plan.siblings.iter().all(|s| s.card_id == "Soup"));

        state.apply_reorder(&plan);
        let view = state.cards_in("food");
        assert_eq!(labels(&view), vec!["Apple", "Bread", "Rice", "Soup"]);
        for (position, card) in view.iter().enumerate().filter(|(_, c)| !c.is_system) {
            assert_eq!(card.order, position as i64);
        }
    }

    #[test]
    fn test_revert_restores_previous_values() {
        let mut state = state_with(vec![user_card("Apple", "food", 4), user_card("Sun", "weather", 5)]);
        let before = state.cards.clone();

        let plan = state.plan_reorder("food", "weather", 0, 0).unwrap();
        state.apply_reorder(&plan);
        state.revert_reorder(&plan);

        assert_eq!(state.cards, before);
    }

    #[test]
    fn test_display_categories_grouped_then_named() {
        let mut state = state_with(Vec::new());
        state.temporary = Some(Category::user("Zzz", "📁", "#000000", "actions", None));

        let display = state.display_categories();
        let groups: Vec<&str> = display.iter().map(|c| c.group.as_str()).collect();
        let mut sorted = groups.clone();
        sorted.sort();
        assert_eq!(groups, sorted);

        let daily: Vec<&str> = display
            .iter()
            .filter(|c| c.group == "daily")
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(daily, vec!["Comidas e Bebidas", "Roupa"]);
        assert!(display.iter().any(|c| c.name == "Zzz"));
    }

    #[test]
    fn test_session_ownership() {
        let user = UserId::new("u1");
        let other = UserId::new("u2");
        let session = Session::Authenticated(user.clone());

        assert!(session.owns(Some(&user)));
        assert!(!session.owns(Some(&other)));
        assert!(!session.owns(None));
        assert!(Session::Local.owns(None));
        assert!(!Session::Anonymous.can_write());
    }
}
