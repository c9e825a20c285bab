//! # flashcards
//!
//! Turns study notes into flashcard decks and tracks how well each card is
//! known.
//!
//! ## Generation Pipeline
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐   ┌──────────┐   ┌─────────┐
//! │  notes   │──▶│ quota gate │──▶│ LLM fallback │──▶│  strict  │──▶│  store  │
//! │ (≥50 ch) │   │ (429 stop) │   │  A → B → …   │   │  parse   │   │ set+cards│
//! └──────────┘   └────────────┘   └──────────────┘   └──────────┘   └─────────┘
//! ```
//!
//! Model output is never repaired: anything other than a non-empty JSON array
//! of `{question, answer, difficulty}` objects is rejected. If storing the
//! cards fails the freshly created set is deleted again, and usage is only
//! counted once both are stored.

pub mod error;
pub mod generator;
pub mod model;
pub mod service;
pub mod store;

pub use error::{DeckError, Result};
pub use generator::{FLASHCARD_SYSTEM_PROMPT, FlashcardGenerator, GenerateRequest, GeneratedSet, parse_cards};
pub use model::{
    Flashcard, FlashcardSet, GeneratedCard, ListParams, ListQuery, Page, Pagination, SetSummary,
    SetUpdate, SetWithCards, SortField, SortOrder,
};
pub use service::DeckService;
pub use store::{FlashcardStore, MemoryFlashcardStore};
