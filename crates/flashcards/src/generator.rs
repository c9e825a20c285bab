//! Flashcard Generation
//!
//! Notes → prompt → model (with fallback) → strict parse → persisted set.
//! The quota is checked before the model is called, and usage is only
//! recorded once the set and its cards are stored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use study_core::ModelFallbackClient;
use study_payments::{EntitlementGate, Usage};
use uuid::Uuid;

use crate::error::{DeckError, Result};
use crate::model::{FlashcardSet, GeneratedCard, MAX_DIFFICULTY, MIN_DIFFICULTY, SetWithCards};
use crate::store::FlashcardStore;

/// Minimum length of the notes, after trimming
pub const MIN_NOTES_CHARS: usize = 50;

/// System prompt for flashcard generation
pub const FLASHCARD_SYSTEM_PROMPT: &str = r#"You are an expert educational content creator. Your task is to analyze study notes and create high-quality flashcards that promote active recall and effective learning.

Instructions:
1. Create between 5-20 flashcards based on the content length and complexity
2. Focus on key concepts, definitions, processes, and important details
3. Make questions specific and unambiguous
4. Ensure answers are concise but complete
5. Vary question types: definitions, examples, comparisons, applications
6. Use clear, educational language
7. Prioritize the most important information

Return your response as a JSON array of objects with this exact structure:
[
  {
    "question": "Clear, specific question that tests understanding",
    "answer": "Comprehensive but concise answer",
    "difficulty": 1-5 (1=basic recall, 5=complex application)
  }
]

Important: Return ONLY the JSON array, no additional text or explanation."#;

/// Generation request body
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Trimmed, validated generation input
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudyNotes {
    pub title: String,
    pub description: Option<String>,
    pub notes: String,
}

impl GenerateRequest {
    pub fn validate(&self) -> Result<StudyNotes> {
        let title = self.title.as_deref().map(str::trim).unwrap_or_default();
        let notes = self.notes.as_deref().map(str::trim).unwrap_or_default();

        if title.is_empty() || notes.chars().count() < MIN_NOTES_CHARS {
            return Err(DeckError::InvalidInput(format!(
                "Title and notes (minimum {MIN_NOTES_CHARS} characters) are required"
            )));
        }

        Ok(StudyNotes {
            title: title.to_string(),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            notes: notes.to_string(),
        })
    }
}

/// User prompt for a batch of notes
pub fn user_prompt(notes: &StudyNotes) -> String {
    let description = notes
        .description
        .as_deref()
        .map(|d| format!("Description: {d}"))
        .unwrap_or_default();

    format!(
        "Create flashcards from these study notes:\n\nTitle: {}\n{description}\n\nNotes:\n{}",
        notes.title, notes.notes
    )
}

/// Parse model output as a strict JSON array of cards.
///
/// Nothing is coerced: prose around the array, a non-array, an empty array,
/// or a card without question/answer text is rejected.
pub fn parse_cards(raw: &str) -> Result<Vec<GeneratedCard>> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| DeckError::InvalidAiOutput(format!("not valid JSON: {e}")))?;

    let Value::Array(items) = value else {
        return Err(DeckError::InvalidAiOutput("expected a JSON array".into()));
    };
    if items.is_empty() {
        return Err(DeckError::InvalidAiOutput(
            "No flashcards generated from the provided notes".into(),
        ));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_card(index, item))
        .collect()
}

fn parse_card(index: usize, item: &Value) -> Result<GeneratedCard> {
    let text = |field: &str| {
        item.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DeckError::InvalidAiOutput(format!("card {index} has no {field}")))
    };

    let difficulty = match item.get("difficulty") {
        None | Some(Value::Null) => MIN_DIFFICULTY,
        Some(Value::Number(n)) => clamp_difficulty(n.as_f64().unwrap_or_default()),
        Some(_) => {
            return Err(DeckError::InvalidAiOutput(format!(
                "card {index} has a non-numeric difficulty"
            )));
        }
    };

    Ok(GeneratedCard {
        question: text("question")?,
        answer: text("answer")?,
        difficulty,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_difficulty(raw: f64) -> u8 {
    // 0 reads as "unset"
    if raw.abs() < f64::EPSILON {
        return MIN_DIFFICULTY;
    }
    raw.round()
        .clamp(f64::from(MIN_DIFFICULTY), f64::from(MAX_DIFFICULTY)) as u8
}

/// Result of a successful generation
#[derive(Clone, Debug, Serialize)]
pub struct GeneratedSet {
    pub flashcard_set: SetWithCards,
    pub usage: Usage,
}

/// Generates and stores flashcard sets
pub struct FlashcardGenerator {
    llm: ModelFallbackClient,
    gate: EntitlementGate,
    store: Arc<dyn FlashcardStore>,
}

impl FlashcardGenerator {
    pub fn new(llm: ModelFallbackClient, gate: EntitlementGate, store: Arc<dyn FlashcardStore>) -> Self {
        Self { llm, gate, store }
    }

    pub fn models(&self) -> &[String] {
        self.llm.models()
    }

    pub async fn generate(
        &self,
        user_id: &str,
        email: Option<&str>,
        request: &GenerateRequest,
        now: DateTime<Utc>,
    ) -> Result<GeneratedSet> {
        let notes = request.validate()?;

        self.gate.check_quota(user_id, email, now).await?;

        let completion = self
            .llm
            .complete(FLASHCARD_SYSTEM_PROMPT, &user_prompt(&notes))
            .await?;

        let cards = parse_cards(&completion.content).inspect_err(|err| {
            tracing::warn!(model = %completion.model, error = %err, "Unusable model output");
        })?;
        let count = u32::try_from(cards.len())
            .map_err(|_| DeckError::InvalidAiOutput("too many cards".into()))?;

        let set = FlashcardSet {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title: notes.title,
            description: notes.description,
            original_notes: notes.notes,
            flashcard_count: count,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_set(&set).await?;

        let flashcards = match self.store.insert_cards(set.id, &cards, now).await {
            Ok(flashcards) => flashcards,
            Err(err) => {
                tracing::error!(set_id = %set.id, error = %err, "Card insert failed, removing set");
                if let Err(cleanup) = self.store.delete_set(set.id, user_id).await {
                    tracing::error!(set_id = %set.id, error = %cleanup, "Set cleanup failed");
                }
                return Err(err);
            }
        };

        let usage = self.gate.record_generation(user_id, count, now).await?;

        tracing::info!(
            set_id = %set.id,
            user_id,
            cards = count,
            model = %completion.model,
            remaining = usage.remaining,
            "Flashcard set generated"
        );

        Ok(GeneratedSet {
            flashcard_set: SetWithCards { set, flashcards },
            usage,
        })
    }
}
