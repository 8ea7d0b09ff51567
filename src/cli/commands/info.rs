//! Info command implementation.

use super::build_embedder;
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::KnowledgeBase;
use anyhow::Result;

/// Run the info command.
pub fn run_info(settings: Settings) -> Result<()> {
    let embedder = build_embedder(&settings);
    let mut kb = KnowledgeBase::new(&settings, embedder)?;

    if !kb.can_load_existing() {
        Output::warning("No knowledge base found. Run `regqa build` first.");
        return Ok(());
    }
    kb.load()?;

    Output::header("Knowledge base");
    if let Some(stats) = kb.stats() {
        Output::kv("Passages", &stats.total_vectors.to_string());
        Output::kv("Documents", &stats.document_count.to_string());
        Output::kv("Dimension", &stats.vector_dimension.to_string());
        Output::kv("Index type", &stats.index_type);
        Output::kv("Built at", &stats.created_at);
        Output::kv("Location", &stats.storage_path.display().to_string());
    }
    Ok(())
}
