//! Configuration settings for regqa.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory containing the source regulation documents.
    pub documents_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Timeout for embedding/generation API requests, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.regqa".to_string(),
            documents_dir: "docs".to_string(),
            log_level: "info".to_string(),
            request_timeout_secs: 300,
        }
    }
}

/// Text splitting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Target maximum passage length in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent fallback-split passages, in characters.
    /// Clamped to chunk_size / 4 by the splitter.
    pub chunk_overlap: usize,
    /// Passages shorter than this are dropped (unless sole content).
    pub min_chunk_length: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_length: 50,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Number of texts encoded per upstream request.
    pub batch_size: usize,
    /// Whether to L2-normalize vectors (inner product == cosine).
    pub normalize: bool,
    /// Debug only: substitute random vectors when the embedding call fails.
    /// Every substitution is logged; never enable this in production.
    pub allow_random_fallback: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 768,
            batch_size: 8,
            normalize: true,
            allow_random_fallback: false,
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Directory holding the persisted index artifacts.
    pub dir: String,
    /// Index blob filename.
    pub index_file: String,
    /// Index metadata filename.
    pub metadata_file: String,
    /// Passage store filename.
    pub store_file: String,
    /// Reuse a persisted index when the new document count is within this
    /// fractional growth of the last build.
    pub reuse_growth_tolerance: f64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            dir: "~/.regqa/index".to_string(),
            index_file: "index.bin".to_string(),
            metadata_file: "metadata.json".to_string(),
            store_file: "passages.json".to_string(),
            reuse_growth_tolerance: 0.10,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of passages to retrieve per query.
    pub top_k: usize,
    /// Minimum similarity score for a passage to count as relevant.
    pub similarity_threshold: f32,
    /// Number of retrieved passages actually placed in the prompt.
    pub context_passages: usize,
    /// Capacity of the retriever's query cache.
    pub cache_size: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 10,
            similarity_threshold: 0.25,
            context_passages: 3,
            cache_size: 256,
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// LLM model for answer generation.
    pub model: String,
    /// Sampling temperature. Low to keep answers grounded.
    pub temperature: f32,
    /// Maximum tokens to generate per answer.
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 2048,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Override for the system prompt.
    pub system: Option<String>,
    /// Override for the multiple-choice question template.
    pub choice_template: Option<String>,
    /// Override for the free-text question template.
    pub qa_template: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::RegQaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("regqa")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded documents directory path.
    pub fn documents_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.documents_dir)
    }

    /// Get the expanded index directory path.
    pub fn index_dir(&self) -> PathBuf {
        Self::expand_path(&self.index.dir)
    }

    /// Request timeout for upstream API calls.
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.general.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.min_chunk_length, 50);
        assert_eq!(settings.embedding.dimensions, 768);
        assert!(settings.embedding.normalize);
        assert!(!settings.embedding.allow_random_fallback);
        assert_eq!(settings.retrieval.top_k, 10);
        assert!((settings.index.reuse_growth_tolerance - 0.10).abs() < f64::EPSILON);
        assert_eq!(settings.request_timeout(), std::time::Duration::from_secs(300));
    }

    #[test]
    fn request_timeout_is_configurable() {
        let text = "[general]\nrequest_timeout_secs = 30\n";
        let settings: Settings = toml::from_str(text).unwrap();
        assert_eq!(settings.request_timeout(), std::time::Duration::from_secs(30));
    }

    #[test]
    fn toml_round_trip() {
        let settings = Settings::default();
        let text = toml::to_string_pretty(&settings).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back.chunking.chunk_overlap, settings.chunking.chunk_overlap);
        assert_eq!(back.generation.model, settings.generation.model);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let text = "[chunking]\nchunk_size = 512\n";
        let settings: Settings = toml::from_str(text).unwrap();
        assert_eq!(settings.chunking.chunk_size, 512);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.retrieval.top_k, 10);
    }
}
