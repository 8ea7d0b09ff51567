//! Similarity retrieval over the knowledge base.
//!
//! The retriever embeds a query, scans the index, and maps result rows back
//! to passages. Repeated queries are served from a small LRU cache keyed by
//! (query text, k).

use crate::embedding::Embedder;
use crate::error::{RegQaError, Result};
use crate::pipeline::KnowledgeBase;
use lru::LruCache;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, instrument};

/// A passage returned from retrieval, with its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub id: String,
    pub text: String,
    /// Inner-product similarity in [-1, 1] for normalized vectors.
    pub score: f32,
    pub metadata: BTreeMap<String, String>,
}

/// Retriever over a shared knowledge base.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    knowledge_base: Arc<RwLock<KnowledgeBase>>,
    cache: Mutex<LruCache<(String, usize), Vec<RetrievedPassage>>>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        knowledge_base: Arc<RwLock<KnowledgeBase>>,
        cache_size: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            embedder,
            knowledge_base,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Retrieve the `k` most similar passages for a query, best first.
    ///
    /// Scores are not filtered here; callers apply their own similarity
    /// threshold so that a near-miss can still be inspected.
    #[instrument(skip(self, query))]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        if k == 0 {
            return Err(RegQaError::InvalidInput("k must be >= 1".to_string()));
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(RegQaError::InvalidInput("query must not be empty".to_string()));
        }

        let cache_key = (query.to_string(), k);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&cache_key) {
                debug!("Query cache hit for k={}", k);
                return Ok(hit.clone());
            }
        }

        let query_vector = self.embedder.embed(query).await?;

        let results = {
            let kb = self
                .knowledge_base
                .read()
                .map_err(|_| RegQaError::Index("knowledge base lock poisoned".to_string()))?;
            let scored = kb.search(&query_vector, k)?;
            scored
                .into_iter()
                .map(|(row, score)| {
                    let passage = kb.passage_by_row(row).ok_or_else(|| {
                        RegQaError::CorruptPersistedState(format!(
                            "index row {} has no passage",
                            row
                        ))
                    })?;
                    Ok(RetrievedPassage {
                        id: passage.id.clone(),
                        text: passage.text.clone(),
                        score,
                        metadata: passage.doc_metadata.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        debug!("Retrieved {} passages", results.len());
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(cache_key, results.clone());
        }
        Ok(results)
    }

    /// Drop all cached query results. Call after a rebuild.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::document::SourceDocument;
    use crate::embedding::l2_normalize;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls so cache behavior is observable.
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn encode(text: &str) -> Vec<f32> {
            let mut v = vec![0.01f32; 16];
            for (i, c) in text.chars().enumerate() {
                v[(c as usize + i) % 16] += 1.0;
            }
            l2_normalize(&mut v);
            v
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::encode(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| Self::encode(t)).collect())
        }

        fn dimensions(&self) -> usize {
            16
        }
    }

    async fn built_kb(dir: &std::path::Path, embedder: Arc<dyn Embedder>) -> KnowledgeBase {
        let mut settings = Settings::default();
        settings.index.dir = dir.join("index").to_string_lossy().into_owned();
        settings.chunking.chunk_size = 120;
        settings.chunking.chunk_overlap = 10;
        settings.chunking.min_chunk_length = 4;

        let mut kb = KnowledgeBase::new(&settings, embedder).unwrap();
        let docs = vec![
            SourceDocument::with_filename(
                "第一条 商业银行应当建立资本充足率管理制度。".to_string(),
                "a.txt",
            ),
            SourceDocument::with_filename(
                "第二条 商业银行应当披露流动性风险信息。".to_string(),
                "b.txt",
            ),
            SourceDocument::with_filename(
                "第三条 监管机构负责现场检查与非现场监管。".to_string(),
                "c.txt",
            ),
        ];
        kb.build(&docs, true).await.unwrap();
        kb
    }

    #[tokio::test]
    async fn retrieves_scored_passages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(CountingEmbedder::new());
        let kb = built_kb(dir.path(), embedder.clone()).await;
        let retriever = Retriever::new(embedder, Arc::new(RwLock::new(kb)), 8);

        // k larger than the corpus returns every passage, not an error.
        let results = retriever.retrieve("资本充足率管理", 10).await.unwrap();
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(results.iter().all(|r| r.metadata.contains_key("filename")));
    }

    #[tokio::test]
    async fn cache_skips_repeat_embedding() {
        let dir = tempfile::tempdir().unwrap();
        let counting = Arc::new(CountingEmbedder::new());
        let embedder: Arc<dyn Embedder> = counting.clone();
        let kb = built_kb(dir.path(), embedder.clone()).await;
        let retriever = Retriever::new(embedder, Arc::new(RwLock::new(kb)), 8);

        let first = retriever.retrieve("流动性风险", 2).await.unwrap();
        let second = retriever.retrieve("流动性风险", 2).await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.len(), second.len());

        // Different k is a different cache entry.
        retriever.retrieve("流动性风险", 3).await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);

        retriever.clear_cache();
        retriever.retrieve("流动性风险", 2).await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejects_bad_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(CountingEmbedder::new());
        let kb = built_kb(dir.path(), embedder.clone()).await;
        let retriever = Retriever::new(embedder, Arc::new(RwLock::new(kb)), 8);

        assert!(matches!(
            retriever.retrieve("问题", 0).await,
            Err(RegQaError::InvalidInput(_))
        ));
        assert!(matches!(
            retriever.retrieve("   ", 3).await,
            Err(RegQaError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn unbuilt_knowledge_base_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(CountingEmbedder::new());
        let mut settings = Settings::default();
        settings.index.dir = dir.path().join("index").to_string_lossy().into_owned();
        let kb = KnowledgeBase::new(&settings, embedder.clone()).unwrap();
        let retriever = Retriever::new(embedder, Arc::new(RwLock::new(kb)), 8);

        assert!(matches!(
            retriever.retrieve("问题", 3).await,
            Err(RegQaError::IndexUnavailable)
        ));
    }
}
