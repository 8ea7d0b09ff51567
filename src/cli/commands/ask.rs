//! Ask command implementation.

use super::build_retriever;
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::generation::OpenAIGenerator;
use crate::qa::{QaEngine, QuestionKind};
use anyhow::Result;
use std::sync::Arc;

/// Run the ask command.
pub async fn run_ask(question: &str, options: Option<String>, settings: Settings) -> Result<()> {
    let retriever = build_retriever(&settings)?;
    let generator = Arc::new(OpenAIGenerator::with_timeout(
        &settings.generation,
        settings.request_timeout(),
    ));
    let prompts = Prompts::from_settings(&settings.prompts);
    let engine = QaEngine::new(retriever, generator, prompts, &settings.retrieval);

    let kind = if options.is_some() {
        QuestionKind::Choice
    } else {
        QuestionKind::FreeText
    };

    let spinner = Output::spinner("Thinking...");
    let answer = engine
        .answer(question, kind, options.as_deref().unwrap_or(""))
        .await;
    spinner.finish_and_clear();
    let answer = answer?;

    Output::header("Answer");
    println!("{}", answer.text);
    if let Some(letters) = answer.letters_display() {
        Output::success(&format!("Extracted answer: {}", letters));
    }

    if !answer.sources.is_empty() {
        Output::header("Sources");
        for source in &answer.sources {
            Output::kv(
                &source.id,
                &format!(
                    "{} (score {:.3})",
                    source.metadata.get("filename").map(String::as_str).unwrap_or("-"),
                    source.score
                ),
            );
        }
    }
    Ok(())
}
