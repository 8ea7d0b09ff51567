//! Build command implementation.

use super::build_embedder;
use crate::cli::Output;
use crate::config::Settings;
use crate::document::{DocumentLoader, TextDirectoryLoader};
use crate::pipeline::KnowledgeBase;
use anyhow::Result;
use std::path::PathBuf;

/// Run the build command.
pub async fn run_build(
    documents: Option<PathBuf>,
    force: bool,
    settings: Settings,
) -> Result<()> {
    let documents_dir = documents.unwrap_or_else(|| settings.documents_dir());
    Output::info(&format!("Loading documents from {}", documents_dir.display()));

    let docs = TextDirectoryLoader::new().load_documents(&documents_dir)?;
    if docs.is_empty() {
        Output::warning("No documents found; nothing to index.");
        return Ok(());
    }
    Output::info(&format!("Loaded {} documents", docs.len()));

    let embedder = build_embedder(&settings);
    let mut kb = KnowledgeBase::new(&settings, embedder)?;

    let spinner = Output::spinner("Building knowledge base (splitting and embedding)...");
    let report = kb.build(&docs, force).await;
    spinner.finish_and_clear();

    let report = report?;
    if report.reused_existing {
        Output::success(&format!(
            "Reused existing index: {} passages from {} documents",
            report.passages_indexed, report.documents_indexed
        ));
        Output::info("Pass --force to rebuild from scratch.");
    } else {
        Output::success(&format!(
            "Indexed {} passages from {} documents",
            report.passages_indexed, report.documents_indexed
        ));
    }

    if let Some(stats) = kb.stats() {
        Output::kv("Index", &stats.storage_path.display().to_string());
        Output::kv("Dimension", &stats.vector_dimension.to_string());
    }
    Ok(())
}
