//! Deck Management
//!
//! Browsing, editing and reviewing stored sets.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{DeckError, Result};
use crate::model::{
    Flashcard, FlashcardSet, ListParams, ListQuery, Page, Pagination, SetSummary, SetUpdate,
    SetWithCards,
};
use crate::store::FlashcardStore;

const SET: &str = "Flashcard set";
const CARD: &str = "Flashcard";

#[derive(Clone)]
pub struct DeckService {
    store: Arc<dyn FlashcardStore>,
}

impl DeckService {
    pub fn new(store: Arc<dyn FlashcardStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, user_id: &str, params: ListParams) -> Result<Page<SetSummary>> {
        let query = ListQuery::try_from(params)?;
        let (sets, total) = self.store.list_sets(user_id, &query).await?;

        Ok(Page {
            data: sets.iter().map(SetSummary::from).collect(),
            pagination: Pagination::new(&query, total),
        })
    }

    pub async fn get(&self, user_id: &str, set_id: Uuid) -> Result<SetWithCards> {
        let set = self
            .store
            .get_set(set_id, user_id)
            .await?
            .ok_or(DeckError::NotFound(SET))?;
        let flashcards = self.store.cards_for_set(set.id).await?;

        Ok(SetWithCards { set, flashcards })
    }

    pub async fn update(
        &self,
        user_id: &str,
        set_id: Uuid,
        update: SetUpdate,
        now: DateTime<Utc>,
    ) -> Result<FlashcardSet> {
        let title = update
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DeckError::InvalidInput("Title is required".into()))?
            .to_string();
        let description = update
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        self.store
            .update_set(set_id, user_id, title, description, now)
            .await?
            .ok_or(DeckError::NotFound(SET))
    }

    pub async fn delete(&self, user_id: &str, set_id: Uuid) -> Result<()> {
        if self.store.delete_set(set_id, user_id).await? {
            tracing::info!(%set_id, user_id, "Flashcard set deleted");
            Ok(())
        } else {
            Err(DeckError::NotFound(SET))
        }
    }

    pub async fn review(
        &self,
        user_id: &str,
        card_id: Uuid,
        correct: bool,
        now: DateTime<Utc>,
    ) -> Result<Flashcard> {
        self.store
            .record_review(card_id, user_id, correct, now)
            .await?
            .ok_or(DeckError::NotFound(CARD))
    }
}
