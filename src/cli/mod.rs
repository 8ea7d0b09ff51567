//! CLI module for regqa.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// regqa - Regulation Question Answering
///
/// A retrieval-augmented QA tool over Chinese financial-regulation documents.
/// Builds a local vector index from regulation texts and answers both
/// multiple-choice and free-text questions against it.
#[derive(Parser, Debug)]
#[command(name = "regqa")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build (or rebuild) the knowledge base from regulation documents
    Build {
        /// Directory of source documents (defaults to the configured one)
        #[arg(short, long)]
        documents: Option<PathBuf>,

        /// Force a full rebuild even if a persisted index is reusable
        #[arg(short, long)]
        force: bool,
    },

    /// Ask a question against the knowledge base
    Ask {
        /// The question to ask
        question: String,

        /// Option block for a multiple-choice question, e.g. "A. 6%\nB. 8%".
        /// When present the answer letters are extracted and printed.
        #[arg(short, long)]
        options: Option<String>,
    },

    /// Search for relevant passages without generating an answer
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Minimum similarity score
        #[arg(short, long)]
        min_score: Option<f32>,
    },

    /// Answer a JSONL file of questions and write results as JSONL
    Batch {
        /// Input question file (one JSON object per line)
        input: PathBuf,

        /// Output result file
        #[arg(short, long, default_value = "results.jsonl")]
        output: PathBuf,

        /// First question index to process (zero-based)
        #[arg(long, default_value = "0")]
        start: usize,

        /// Process at most this many questions
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show knowledge base statistics
    Info,

    /// Delete the persisted knowledge base
    Clear,

    /// Show or initialize the configuration
    Config {
        /// Write a default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
}
