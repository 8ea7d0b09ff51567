//! CLI command implementations.

mod ask;
mod batch;
mod build;
mod clear;
mod config;
mod info;
mod search;

pub use ask::run_ask;
pub use batch::run_batch;
pub use build::run_build;
pub use clear::run_clear;
pub use config::run_config;
pub use info::run_info;
pub use search::run_search;

use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder, RandomFallbackEmbedder};
use crate::pipeline::KnowledgeBase;
use crate::retrieval::Retriever;
use anyhow::Result;
use std::sync::{Arc, RwLock};

/// Construct the configured embedder.
fn build_embedder(settings: &Settings) -> Arc<dyn Embedder> {
    let base: Arc<dyn Embedder> = Arc::new(
        OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )
        .with_batch_size(settings.embedding.batch_size)
        .with_normalize(settings.embedding.normalize)
        .with_timeout(settings.request_timeout()),
    );

    if settings.embedding.allow_random_fallback {
        Output::warning("Random embedding fallback is enabled; results may be garbage");
        Arc::new(RandomFallbackEmbedder::new(base))
    } else {
        base
    }
}

/// Load the persisted knowledge base, or fail with a hint to build first.
fn load_knowledge_base(settings: &Settings) -> Result<(Arc<RwLock<KnowledgeBase>>, Arc<dyn Embedder>)> {
    let embedder = build_embedder(settings);
    let mut kb = KnowledgeBase::new(settings, embedder.clone())?;
    if !kb.can_load_existing() {
        anyhow::bail!("No knowledge base found. Run `regqa build` first.");
    }
    kb.load()?;
    Ok((Arc::new(RwLock::new(kb)), embedder))
}

/// Retriever over the loaded knowledge base.
fn build_retriever(settings: &Settings) -> Result<Arc<Retriever>> {
    let (kb, embedder) = load_knowledge_base(settings)?;
    Ok(Arc::new(Retriever::new(
        embedder,
        kb,
        settings.retrieval.cache_size,
    )))
}
