//! regqa - Retrieval-Augmented QA over Chinese Financial Regulations
//!
//! A local-first pipeline for building a searchable knowledge base from
//! regulatory documents and answering questions against it.
//!
//! # Overview
//!
//! regqa allows you to:
//! - Split regulation documents into retrievable passages while preserving
//!   headings, numbered clauses, and tables
//! - Embed passages and index them for exact nearest-neighbor search
//! - Persist, reload, and query the index from the command line
//! - Answer free-text and multiple-choice questions with an LLM, including
//!   normalized extraction of selected option letters
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `document` - Source document loading abstraction
//! - `chunking` - Structure-aware text splitting
//! - `embedding` - Embedding generation
//! - `index` - Flat inner-product vector index and passage store
//! - `pipeline` - Knowledge base build/persist/load lifecycle
//! - `retrieval` - Top-k passage retrieval with query caching
//! - `extraction` - Multiple-choice answer extraction
//! - `generation` - LLM answer generation
//! - `qa` - Question answering engine tying it all together
//!
//! # Example
//!
//! ```rust,no_run
//! use regqa::config::Settings;
//! use regqa::pipeline::KnowledgeBase;
//! use regqa::document::{DocumentLoader, TextDirectoryLoader};
//! use regqa::embedding::OpenAIEmbedder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let embedder = Arc::new(OpenAIEmbedder::with_config(
//!         &settings.embedding.model,
//!         settings.embedding.dimensions as usize,
//!     ));
//!     let mut kb = KnowledgeBase::new(&settings, embedder)?;
//!
//!     let documents = TextDirectoryLoader::new().load_documents(&settings.documents_dir())?;
//!     let report = kb.build(&documents, false).await?;
//!     println!("Indexed {} passages", report.passages_indexed);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extraction;
pub mod generation;
pub mod index;
pub mod openai;
pub mod pipeline;
pub mod qa;
pub mod retrieval;

pub use error::{RegQaError, Result};
