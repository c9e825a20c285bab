//! Flashcard Storage
//!
//! Every read and write is scoped by owner: another user's set or card is
//! indistinguishable from one that does not exist.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Flashcard, FlashcardSet, GeneratedCard, ListQuery, SortField, SortOrder};

/// Flashcard persistence (Strategy pattern)
#[async_trait]
pub trait FlashcardStore: Send + Sync {
    async fn insert_set(&self, set: &FlashcardSet) -> Result<()>;

    /// Insert all cards for a set; all-or-nothing
    async fn insert_cards(
        &self,
        set_id: Uuid,
        cards: &[GeneratedCard],
        now: DateTime<Utc>,
    ) -> Result<Vec<Flashcard>>;

    async fn get_set(&self, id: Uuid, user_id: &str) -> Result<Option<FlashcardSet>>;

    async fn cards_for_set(&self, set_id: Uuid) -> Result<Vec<Flashcard>>;

    /// One page of the user's sets plus the total count
    async fn list_sets(&self, user_id: &str, query: &ListQuery) -> Result<(Vec<FlashcardSet>, u64)>;

    async fn update_set(
        &self,
        id: Uuid,
        user_id: &str,
        title: String,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<FlashcardSet>>;

    /// Delete a set and its cards. Returns false when nothing was deleted.
    async fn delete_set(&self, id: Uuid, user_id: &str) -> Result<bool>;

    /// Count a review on a card the user owns through its set
    async fn record_review(
        &self,
        card_id: Uuid,
        user_id: &str,
        correct: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Flashcard>>;
}

#[derive(Default)]
struct Tables {
    sets: HashMap<Uuid, FlashcardSet>,
    cards: HashMap<Uuid, Flashcard>,
}

/// In-memory store (for development and tests)
#[derive(Default)]
pub struct MemoryFlashcardStore {
    tables: RwLock<Tables>,
}

impl MemoryFlashcardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare(a: &FlashcardSet, b: &FlashcardSet, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Title => a.title.cmp(&b.title),
    }
}

#[async_trait]
impl FlashcardStore for MemoryFlashcardStore {
    async fn insert_set(&self, set: &FlashcardSet) -> Result<()> {
        self.tables.write().await.sets.insert(set.id, set.clone());
        Ok(())
    }

    async fn insert_cards(
        &self,
        set_id: Uuid,
        cards: &[GeneratedCard],
        now: DateTime<Utc>,
    ) -> Result<Vec<Flashcard>> {
        let mut tables = self.tables.write().await;
        if !tables.sets.contains_key(&set_id) {
            return Err(crate::error::DeckError::Storage(format!(
                "set {set_id} does not exist"
            )));
        }

        let inserted: Vec<Flashcard> = cards
            .iter()
            .map(|card| Flashcard {
                id: Uuid::new_v4(),
                set_id,
                question: card.question.clone(),
                answer: card.answer.clone(),
                difficulty: card.difficulty,
                times_reviewed: 0,
                times_correct: 0,
                last_reviewed_at: None,
                created_at: now,
            })
            .collect();

        for card in &inserted {
            tables.cards.insert(card.id, card.clone());
        }
        Ok(inserted)
    }

    async fn get_set(&self, id: Uuid, user_id: &str) -> Result<Option<FlashcardSet>> {
        Ok(self
            .tables
            .read()
            .await
            .sets
            .get(&id)
            .filter(|set| set.user_id == user_id)
            .cloned())
    }

    async fn cards_for_set(&self, set_id: Uuid) -> Result<Vec<Flashcard>> {
        let tables = self.tables.read().await;
        let mut cards: Vec<Flashcard> = tables
            .cards
            .values()
            .filter(|card| card.set_id == set_id)
            .cloned()
            .collect();
        cards.sort_by_key(|card| card.created_at);
        Ok(cards)
    }

    async fn list_sets(&self, user_id: &str, query: &ListQuery) -> Result<(Vec<FlashcardSet>, u64)> {
        let tables = self.tables.read().await;
        let mut sets: Vec<&FlashcardSet> = tables
            .sets
            .values()
            .filter(|set| set.user_id == user_id)
            .collect();

        sets.sort_by(|a, b| {
            let ordering = compare(a, b, query.sort_by).then_with(|| a.id.cmp(&b.id));
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = sets.len() as u64;
        let page = sets
            .into_iter()
            .skip(query.offset())
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn update_set(
        &self,
        id: Uuid,
        user_id: &str,
        title: String,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<FlashcardSet>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .sets
            .get_mut(&id)
            .filter(|set| set.user_id == user_id)
            .map(|set| {
                set.title = title;
                set.description = description;
                set.updated_at = now;
                set.clone()
            }))
    }

    async fn delete_set(&self, id: Uuid, user_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let owned = tables.sets.get(&id).is_some_and(|set| set.user_id == user_id);
        if !owned {
            return Ok(false);
        }

        tables.sets.remove(&id);
        tables.cards.retain(|_, card| card.set_id != id);
        Ok(true)
    }

    async fn record_review(
        &self,
        card_id: Uuid,
        user_id: &str,
        correct: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Flashcard>> {
        let mut tables = self.tables.write().await;
        let Some(set_id) = tables.cards.get(&card_id).map(|card| card.set_id) else {
            return Ok(None);
        };
        if !tables.sets.get(&set_id).is_some_and(|set| set.user_id == user_id) {
            return Ok(None);
        }

        Ok(tables.cards.get_mut(&card_id).map(|card| {
            card.record_review(correct, now);
            card.clone()
        }))
    }
}
