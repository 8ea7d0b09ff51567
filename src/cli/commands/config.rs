//! Config command implementation.

use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the config command.
pub fn run_config(init: bool, settings: Settings) -> Result<()> {
    let path = Settings::default_config_path();

    if init {
        if path.exists() {
            Output::warning(&format!("Configuration already exists at {}", path.display()));
        } else {
            settings.save_to(&path)?;
            Output::success(&format!("Wrote default configuration to {}", path.display()));
        }
        return Ok(());
    }

    Output::header("Configuration");
    Output::kv("File", &path.display().to_string());
    Output::kv("Data dir", &settings.data_dir().display().to_string());
    Output::kv("Documents dir", &settings.documents_dir().display().to_string());
    Output::kv("Index dir", &settings.index_dir().display().to_string());
    Output::kv("Embedding model", &settings.embedding.model);
    Output::kv("Generation model", &settings.generation.model);
    Output::kv("Chunk size", &settings.chunking.chunk_size.to_string());
    Output::kv("Top k", &settings.retrieval.top_k.to_string());
    Ok(())
}
