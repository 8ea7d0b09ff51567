//! Batch command implementation: answer a JSONL question file.

use super::build_retriever;
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::generation::OpenAIGenerator;
use crate::qa::{QaEngine, QuestionKind};
use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// One input line. Unknown categories are answered as free-text.
#[derive(Debug, Deserialize)]
struct BatchQuestion {
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    question: String,
    /// Option block for choice questions.
    #[serde(default)]
    content: String,
}

fn default_category() -> String {
    "问答题".to_string()
}

/// One output line.
#[derive(Debug, Serialize)]
struct BatchResult {
    id: serde_json::Value,
    category: String,
    question: String,
    content: String,
    answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer_letters: Option<String>,
    num_sources: usize,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the batch command.
pub async fn run_batch(
    input: PathBuf,
    output: PathBuf,
    start: usize,
    limit: Option<usize>,
    settings: Settings,
) -> Result<()> {
    let file = std::fs::File::open(&input)
        .with_context(|| format!("cannot open question file {}", input.display()))?;
    let mut questions: Vec<BatchQuestion> = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let question: BatchQuestion = serde_json::from_str(&line)
            .with_context(|| format!("bad JSON on line {}", line_no + 1))?;
        questions.push(question);
    }

    let end = limit
        .map(|n| (start + n).min(questions.len()))
        .unwrap_or(questions.len());
    if start >= end {
        Output::warning("Nothing to process in the selected range.");
        return Ok(());
    }
    let slice = &questions[start..end];
    Output::info(&format!(
        "Answering {} questions ({} choice, {} free-text)",
        slice.len(),
        slice.iter().filter(|q| q.category == "选择题").count(),
        slice.iter().filter(|q| q.category != "选择题").count(),
    ));

    let retriever = build_retriever(&settings)?;
    let generator = Arc::new(OpenAIGenerator::with_timeout(
        &settings.generation,
        settings.request_timeout(),
    ));
    let prompts = Prompts::from_settings(&settings.prompts);
    let engine = QaEngine::new(retriever, generator, prompts, &settings.retrieval);

    let out_file = std::fs::File::create(&output)
        .with_context(|| format!("cannot create result file {}", output.display()))?;
    let mut writer = BufWriter::new(out_file);

    let progress = Output::progress_bar(slice.len() as u64, "answering");
    let mut failures = 0usize;

    for question in slice {
        let kind = QuestionKind::from_category(&question.category);
        let result = match engine.answer(&question.question, kind, &question.content).await {
            Ok(answer) => BatchResult {
                id: question.id.clone(),
                category: kind.category().to_string(),
                question: question.question.clone(),
                content: question.content.clone(),
                answer: answer.text.clone(),
                answer_letters: answer.letters_display(),
                num_sources: answer.sources.len(),
                timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                error: None,
            },
            // One failed question must not abort the batch.
            Err(e) => {
                failures += 1;
                BatchResult {
                    id: question.id.clone(),
                    category: kind.category().to_string(),
                    question: question.question.clone(),
                    content: question.content.clone(),
                    answer: format!("处理失败: {}", e),
                    answer_letters: None,
                    num_sources: 0,
                    timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                    error: Some(e.to_string()),
                }
            }
        };
        serde_json::to_writer(&mut writer, &result)?;
        writer.write_all(b"\n")?;
        progress.inc(1);
    }
    writer.flush()?;
    progress.finish_and_clear();

    if failures > 0 {
        Output::warning(&format!("{} questions failed; see the error fields", failures));
    }
    Output::success(&format!(
        "Wrote {} results to {}",
        slice.len(),
        output.display()
    ));
    Ok(())
}
