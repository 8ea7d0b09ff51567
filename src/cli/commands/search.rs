//! Search command implementation.

use super::build_retriever;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: usize,
    min_score: Option<f32>,
    settings: Settings,
) -> Result<()> {
    let min_score = min_score.unwrap_or(settings.retrieval.similarity_threshold);
    let retriever = build_retriever(&settings)?;

    let spinner = Output::spinner("Searching...");
    let results = retriever.retrieve(query, limit).await;
    spinner.finish_and_clear();

    let results: Vec<_> = results?
        .into_iter()
        .filter(|p| p.score >= min_score)
        .collect();

    if results.is_empty() {
        Output::warning("No results found matching your query.");
        return Ok(());
    }

    Output::success(&format!("Found {} results", results.len()));
    for passage in &results {
        Output::search_result(
            &passage.id,
            passage.metadata.get("filename").map(String::as_str),
            passage.score,
            &passage.text,
        );
    }
    Ok(())
}
