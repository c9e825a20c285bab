//! # study-core
//!
//! Provider-agnostic LLM access for studycards.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  ModelFallbackClient                      │
//! │  ┌──────────────────┐        ┌────────────────────────┐  │
//! │  │ candidate models │──────▶ │  LlmProvider (Strategy) │  │
//! │  │  A → B → C → D   │        │  Groq, test fakes, ...  │  │
//! │  └──────────────────┘        └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait is injected explicitly so callers can be exercised
//! without network access. `ModelFallbackClient` walks the candidate list and
//! only moves on when a model has been retired by the provider.

pub mod error;
pub mod fallback;
pub mod message;
pub mod provider;

pub use error::{CoreError, Result};
pub use fallback::{ModelFallbackClient, is_model_retired};
pub use message::{Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
