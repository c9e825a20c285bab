//! # study-runtime
//!
//! Runtime providers for studycards.
//!
//! ## Providers
//!
//! - **Groq** (default): OpenAI-compatible chat completions hosted by Groq
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use study_core::ModelFallbackClient;
//! use study_runtime::GroqProvider;
//!
//! let provider = Arc::new(GroqProvider::from_env()?);
//! let client = ModelFallbackClient::new(provider, vec!["llama-3.3-70b-versatile".into()])?;
//! let completion = client.complete(system_prompt, user_prompt).await?;
//! ```

pub mod groq;

pub use groq::{GroqConfig, GroqProvider};

// Re-export core types for convenience
pub use study_core::{
    Completion, CoreError, GenerationOptions, LlmProvider, Message, ModelFallbackClient, Result,
    Role,
};
