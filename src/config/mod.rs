//! Configuration module for regqa.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::Prompts;
pub use settings::{
    ChunkingSettings, EmbeddingSettings, GeneralSettings, GenerationSettings, IndexSettings,
    PromptSettings, RetrievalSettings, Settings,
};
