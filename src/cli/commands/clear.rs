//! Clear command implementation.

use super::build_embedder;
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::KnowledgeBase;
use anyhow::Result;

/// Run the clear command.
pub fn run_clear(settings: Settings) -> Result<()> {
    let embedder = build_embedder(&settings);
    let mut kb = KnowledgeBase::new(&settings, embedder)?;

    if !kb.can_load_existing() {
        Output::info("No persisted knowledge base to clear.");
        return Ok(());
    }

    kb.clear()?;
    Output::success("Knowledge base cleared.");
    Ok(())
}
