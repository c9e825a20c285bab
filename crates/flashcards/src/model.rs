//! Domain Models
//!
//! Flashcard sets, their cards, and the listing/pagination types used to
//! browse them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DeckError, Result};

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;

/// A titled deck generated from one batch of notes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub original_notes: String,
    pub flashcard_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single question/answer card
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: Uuid,
    pub set_id: Uuid,
    pub question: String,
    pub answer: String,

    /// 1 = basic recall, 5 = complex application
    pub difficulty: u8,

    pub times_reviewed: u32,
    pub times_correct: u32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Flashcard {
    /// Count one review
    pub fn record_review(&mut self, correct: bool, now: DateTime<Utc>) {
        self.times_reviewed = self.times_reviewed.saturating_add(1);
        if correct {
            self.times_correct = self.times_correct.saturating_add(1);
        }
        self.last_reviewed_at = Some(now);
    }
}

/// A validated card produced by the model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCard {
    pub question: String,
    pub answer: String,
    pub difficulty: u8,
}

/// Set with its cards
#[derive(Clone, Debug, Serialize)]
pub struct SetWithCards {
    #[serde(flatten)]
    pub set: FlashcardSet,
    pub flashcards: Vec<Flashcard>,
}

/// Listing view of a set (notes omitted)
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SetSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub flashcard_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&FlashcardSet> for SetSummary {
    fn from(set: &FlashcardSet) -> Self {
        Self {
            id: set.id,
            title: set.title.clone(),
            description: set.description.clone(),
            flashcard_count: set.flashcard_count,
            created_at: set.created_at,
            updated_at: set.updated_at,
        }
    }
}

/// Title/description edit
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SetUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Validated listing parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl ListQuery {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub const fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

/// Raw listing parameters as received on the query string
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
}

impl TryFrom<ListParams> for ListQuery {
    type Error = DeckError;

    fn try_from(params: ListParams) -> Result<Self> {
        let defaults = Self::default();

        let page = match params.page.as_deref() {
            None => defaults.page,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| DeckError::InvalidInput("page must be a positive integer".into()))?,
        };

        let limit = match params.limit.as_deref() {
            None => defaults.limit,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|l| (1..=Self::MAX_LIMIT).contains(l))
                .ok_or_else(|| {
                    DeckError::InvalidInput(format!("limit must be between 1 and {}", Self::MAX_LIMIT))
                })?,
        };

        let sort_by = match params.sort_by.as_deref() {
            None => defaults.sort_by,
            Some("created_at") => SortField::CreatedAt,
            Some("updated_at") => SortField::UpdatedAt,
            Some("title") => SortField::Title,
            Some(other) => {
                return Err(DeckError::InvalidInput(format!("cannot sort by `{other}`")));
            }
        };

        let sort_order = match params.sort_order.as_deref() {
            None => defaults.sort_order,
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(_) => {
                return Err(DeckError::InvalidInput("sort_order must be asc or desc".into()));
            }
        };

        Ok(Self {
            page,
            limit,
            sort_by,
            sort_order,
        })
    }
}

/// Pagination block returned with a page of results
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    pub fn new(query: &ListQuery, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(query.limit.max(1)));
        Self {
            page: query.page,
            limit: query.limit,
            total,
            total_pages,
            has_next: u64::from(query.page) < total_pages,
            has_previous: query.page > 1,
        }
    }
}

/// One page of results
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_math() {
        let query = ListQuery {
            page: 2,
            limit: 10,
            ..ListQuery::default()
        };
        let p = Pagination::new(&query, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_previous);
        assert_eq!(query.offset(), 10);

        let empty = Pagination::new(&ListQuery::default(), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_previous);
    }

    #[test]
    fn list_params_defaults_and_bounds() {
        let query = ListQuery::try_from(ListParams::default()).unwrap();
        assert_eq!(query, ListQuery::default());
        assert_eq!(query.sort_order, SortOrder::Desc);

        let params = |limit: &str| ListParams {
            limit: Some(limit.into()),
            ..ListParams::default()
        };
        assert_eq!(ListQuery::try_from(params("100")).unwrap().limit, 100);
        assert!(ListQuery::try_from(params("101")).is_err());
        assert!(ListQuery::try_from(params("0")).is_err());

        let bad_page = ListParams {
            page: Some("0".into()),
            ..ListParams::default()
        };
        assert!(matches!(ListQuery::try_from(bad_page), Err(DeckError::InvalidInput(_))));

        let bad_sort = ListParams {
            sort_by: Some("id; drop table".into()),
            ..ListParams::default()
        };
        assert!(ListQuery::try_from(bad_sort).is_err());
    }

    #[test]
    fn review_counts() {
        let now = Utc::now();
        let mut card = Flashcard {
            id: Uuid::new_v4(),
            set_id: Uuid::new_v4(),
            question: "q".into(),
            answer: "a".into(),
            difficulty: 1,
            times_reviewed: 0,
            times_correct: 0,
            last_reviewed_at: None,
            created_at: now,
        };
        card.record_review(true, now);
        card.record_review(false, now);
        assert_eq!(card.times_reviewed, 2);
        assert_eq!(card.times_correct, 1);
        assert_eq!(card.last_reviewed_at, Some(now));
    }
}
