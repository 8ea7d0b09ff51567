//! Debug-only fallback embedder.
//!
//! Wraps a real embedder and substitutes random unit vectors when the
//! upstream call fails. Every substitution is logged loudly so fake
//! embeddings can never be mistaken for genuine ones. Must be enabled
//! explicitly via `embedding.allow_random_fallback`; never the default.

use super::{l2_normalize, Embedder};
use crate::error::Result;
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Embedder that degrades to random vectors instead of failing.
pub struct RandomFallbackEmbedder {
    inner: Arc<dyn Embedder>,
    substitutions: AtomicU64,
}

impl RandomFallbackEmbedder {
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self {
            inner,
            substitutions: AtomicU64::new(0),
        }
    }

    /// Number of random vectors handed out so far.
    pub fn substitution_count(&self) -> u64 {
        self.substitutions.load(Ordering::Relaxed)
    }

    fn random_vector(&self) -> Vec<f32> {
        let mut rng = rand::thread_rng();
        let mut vector: Vec<f32> = (0..self.inner.dimensions())
            .map(|_| rng.gen_range(-1.0f32..1.0))
            .collect();
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for RandomFallbackEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self.inner.embed(text).await {
            Ok(v) => Ok(v),
            Err(e) => {
                self.substitutions.fetch_add(1, Ordering::Relaxed);
                warn!("RANDOM EMBEDDING SUBSTITUTED (debug fallback), cause: {}", e);
                Ok(self.random_vector())
            }
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self.inner.embed_batch(texts).await {
            Ok(v) => Ok(v),
            Err(e) => {
                self.substitutions
                    .fetch_add(texts.len() as u64, Ordering::Relaxed);
                warn!(
                    "RANDOM EMBEDDINGS SUBSTITUTED for {} texts (debug fallback), cause: {}",
                    texts.len(),
                    e
                );
                Ok((0..texts.len()).map(|_| self.random_vector()).collect())
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}
