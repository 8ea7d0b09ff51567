//! Knowledge base lifecycle: build, persist, load, clear.
//!
//! The persisted state is three artifacts that only exist together: the
//! index blob, the index metadata, and the passage store. A build replaces
//! all three atomically or leaves the previous state untouched.

use crate::chunking::{SplitterConfig, TextSplitter};
use crate::config::Settings;
use crate::document::SourceDocument;
use crate::embedding::Embedder;
use crate::error::{RegQaError, Result};
use crate::index::{FlatIndex, IndexMetadata, Passage, PassageStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// In-memory state of a built or loaded knowledge base.
struct BuiltState {
    index: FlatIndex,
    store: PassageStore,
    metadata: IndexMetadata,
}

/// Summary of a completed build.
#[derive(Debug)]
pub struct BuildReport {
    /// Number of passages in the index.
    pub passages_indexed: usize,
    /// Number of source documents that produced passages.
    pub documents_indexed: usize,
    /// True when an existing persisted index was reused instead of rebuilt.
    pub reused_existing: bool,
}

/// Statistics for a loaded knowledge base.
#[derive(Debug, Clone)]
pub struct KnowledgeBaseStats {
    pub total_vectors: usize,
    pub vector_dimension: usize,
    pub index_type: String,
    pub created_at: String,
    pub document_count: usize,
    pub storage_path: PathBuf,
}

/// The knowledge base: a vector index plus its aligned passage store.
///
/// Single-writer: builds and loads require `&mut self`; no concurrent
/// mutation is supported.
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    splitter: TextSplitter,
    index_dir: PathBuf,
    index_path: PathBuf,
    metadata_path: PathBuf,
    store_path: PathBuf,
    reuse_growth_tolerance: f64,
    state: Option<BuiltState>,
}

impl KnowledgeBase {
    pub fn new(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let index_dir = settings.index_dir();
        std::fs::create_dir_all(&index_dir)?;

        Ok(Self {
            splitter: TextSplitter::new(SplitterConfig::from(&settings.chunking)),
            index_path: index_dir.join(&settings.index.index_file),
            metadata_path: index_dir.join(&settings.index.metadata_file),
            store_path: index_dir.join(&settings.index.store_file),
            reuse_growth_tolerance: settings.index.reuse_growth_tolerance,
            index_dir,
            embedder,
            state: None,
        })
    }

    /// Whether an index is available in memory.
    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// Whether all three persisted artifacts are present on disk.
    pub fn can_load_existing(&self) -> bool {
        self.index_path.exists() && self.metadata_path.exists() && self.store_path.exists()
    }

    /// Build the knowledge base from documents.
    ///
    /// Unless `force_rebuild` is set, a persisted index is reused when the
    /// incoming document count is within the growth tolerance of the last
    /// build. The reuse path never partially updates; it only reloads.
    #[instrument(skip(self, documents), fields(documents = documents.len()))]
    pub async fn build(
        &mut self,
        documents: &[SourceDocument],
        force_rebuild: bool,
    ) -> Result<BuildReport> {
        if !force_rebuild && self.can_load_existing() {
            if let Some(last_count) = self.persisted_document_count() {
                let within_tolerance = documents.len() as f64
                    <= last_count as f64 * (1.0 + self.reuse_growth_tolerance);
                if within_tolerance {
                    match self.load() {
                        Ok(()) => {
                            info!("Reusing persisted index ({} documents last build)", last_count);
                            let state = self.state.as_ref().ok_or(RegQaError::IndexUnavailable)?;
                            return Ok(BuildReport {
                                passages_indexed: state.store.len(),
                                documents_indexed: state.metadata.document_count,
                                reused_existing: true,
                            });
                        }
                        Err(e) => {
                            warn!("Persisted index unusable ({}); rebuilding", e);
                        }
                    }
                }
            }
        }

        info!("Performing full rebuild from {} documents", documents.len());
        let mut store = PassageStore::new();
        let mut texts: Vec<String> = Vec::new();
        let mut documents_indexed = 0usize;

        for (doc_index, doc) in documents.iter().enumerate() {
            let chunks = self.splitter.split(&doc.text);
            if chunks.is_empty() {
                warn!("Document {} produced no passages; skipping", doc_index);
                continue;
            }
            documents_indexed += 1;
            let mut chunk_index = 0usize;
            for chunk in chunks {
                let passage = Passage::new(
                    doc_index,
                    chunk_index,
                    chunk.clone(),
                    doc.metadata.clone(),
                );
                // A bad passage must not abort the rest of the batch.
                if let Err(e) = store.push(passage) {
                    warn!("Skipping passage doc_{}_chunk_{}: {}", doc_index, chunk_index, e);
                    continue;
                }
                texts.push(chunk);
                chunk_index += 1;
            }
        }

        if texts.is_empty() {
            return Err(RegQaError::InvalidInput(
                "no usable documents to index".to_string(),
            ));
        }

        info!("Embedding {} passages", texts.len());
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(RegQaError::Embedding(format!(
                "embedded {} of {} passages",
                vectors.len(),
                texts.len()
            )));
        }

        let mut index = FlatIndex::new(self.embedder.dimensions())?;
        index.add(&vectors)?;
        debug_assert_eq!(index.row_count(), store.len());

        // Only documents that actually produced passages are counted, so
        // stats and the reuse heuristic agree with the report.
        let metadata = IndexMetadata::new(store.len(), index.dimension(), documents_indexed);
        let state = BuiltState {
            index,
            store,
            metadata,
        };

        // Persist before replacing in-memory state, so a failed write
        // leaves both memory and disk as they were.
        self.persist_state(&state)?;
        let report = BuildReport {
            passages_indexed: state.store.len(),
            documents_indexed,
            reused_existing: false,
        };
        self.state = Some(state);
        info!("Build complete: {} passages indexed", report.passages_indexed);
        Ok(report)
    }

    /// Load the persisted knowledge base into memory.
    ///
    /// All three artifacts must be present and mutually consistent.
    #[instrument(skip(self))]
    pub fn load(&mut self) -> Result<()> {
        if !self.can_load_existing() {
            return Err(RegQaError::CorruptPersistedState(
                "persisted index artifacts are missing".to_string(),
            ));
        }

        let index = FlatIndex::load(&self.index_path)?;
        let store = PassageStore::load(&self.store_path)?;
        let metadata: IndexMetadata =
            serde_json::from_str(&std::fs::read_to_string(&self.metadata_path)?).map_err(|e| {
                RegQaError::CorruptPersistedState(format!("unreadable metadata: {}", e))
            })?;

        if index.row_count() != store.len() || index.row_count() != metadata.total_vectors {
            return Err(RegQaError::CorruptPersistedState(format!(
                "row counts disagree: index {}, store {}, metadata {}",
                index.row_count(),
                store.len(),
                metadata.total_vectors
            )));
        }
        if index.dimension() != metadata.vector_dimension {
            return Err(RegQaError::CorruptPersistedState(format!(
                "dimension disagrees: index {}, metadata {}",
                index.dimension(),
                metadata.vector_dimension
            )));
        }

        info!("Loaded index with {} vectors", index.row_count());
        self.state = Some(BuiltState {
            index,
            store,
            metadata,
        });
        Ok(())
    }

    /// Remove the persisted artifacts and reset in-memory state.
    pub fn clear(&mut self) -> Result<()> {
        for path in [&self.index_path, &self.metadata_path, &self.store_path] {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        self.state = None;
        info!("Knowledge base cleared");
        Ok(())
    }

    /// Search the index directly with an already-embedded query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        let state = self.state.as_ref().ok_or(RegQaError::IndexUnavailable)?;
        state.index.search(query, k)
    }

    /// Passage stored at an index row.
    pub fn passage_by_row(&self, row: usize) -> Option<&Passage> {
        self.state.as_ref().and_then(|s| s.store.get_by_row(row))
    }

    /// Number of indexed passages, if loaded.
    pub fn passage_count(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.store.len())
    }

    /// Current statistics, if loaded.
    pub fn stats(&self) -> Option<KnowledgeBaseStats> {
        self.state.as_ref().map(|s| KnowledgeBaseStats {
            total_vectors: s.metadata.total_vectors,
            vector_dimension: s.metadata.vector_dimension,
            index_type: s.metadata.index_type.clone(),
            created_at: s.metadata.created_at.clone(),
            document_count: s.metadata.document_count,
            storage_path: self.index_dir.clone(),
        })
    }

    fn persisted_document_count(&self) -> Option<usize> {
        let text = std::fs::read_to_string(&self.metadata_path).ok()?;
        let metadata: IndexMetadata = serde_json::from_str(&text).ok()?;
        Some(metadata.document_count)
    }

    /// Write all three artifacts via temp files and atomic renames.
    fn persist_state(&self, state: &BuiltState) -> Result<()> {
        let index_tmp = tempfile::NamedTempFile::new_in(&self.index_dir)?;
        state.index.save(index_tmp.path())?;

        let metadata_tmp = tempfile::NamedTempFile::new_in(&self.index_dir)?;
        std::fs::write(
            metadata_tmp.path(),
            serde_json::to_string_pretty(&state.metadata)?,
        )?;

        let store_tmp = tempfile::NamedTempFile::new_in(&self.index_dir)?;
        state.store.save(store_tmp.path())?;

        // All writes succeeded; rename into place.
        index_tmp
            .persist(&self.index_path)
            .map_err(|e| RegQaError::Index(format!("failed to persist index blob: {}", e)))?;
        metadata_tmp
            .persist(&self.metadata_path)
            .map_err(|e| RegQaError::Index(format!("failed to persist metadata: {}", e)))?;
        store_tmp
            .persist(&self.store_path)
            .map_err(|e| RegQaError::Index(format!("failed to persist passage store: {}", e)))?;

        debug!("Persisted index artifacts to {}", self.index_dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::l2_normalize;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    /// Deterministic embedder: hashes characters into a fixed-width vector.
    struct StubEmbedder {
        dimensions: usize,
    }

    impl StubEmbedder {
        fn encode(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.01f32; self.dimensions];
            for (i, c) in text.chars().enumerate() {
                v[(c as usize + i) % self.dimensions] += 1.0;
            }
            l2_normalize(&mut v);
            v
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> crate::error::Result<Vec<f32>> {
            Ok(self.encode(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| self.encode(t)).collect())
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }

    fn settings_in(dir: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.index.dir = dir.join("index").to_string_lossy().into_owned();
        settings.chunking.chunk_size = 200;
        settings.chunking.chunk_overlap = 20;
        settings.chunking.min_chunk_length = 5;
        settings
    }

    fn documents() -> Vec<SourceDocument> {
        let clause = "商业银行应当建立全面风险管理体系，覆盖信用风险、市场风险与操作风险。".repeat(8);
        vec![
            SourceDocument::with_filename(format!("第一条 {}", clause), "a.txt"),
            SourceDocument::with_filename(format!("第二条 {}", clause), "b.txt"),
            SourceDocument::with_filename("资本充足率不得低于百分之八。".to_string(), "c.txt"),
        ]
    }

    fn kb(dir: &std::path::Path) -> KnowledgeBase {
        KnowledgeBase::new(&settings_in(dir), Arc::new(StubEmbedder { dimensions: 16 })).unwrap()
    }

    #[tokio::test]
    async fn build_aligns_store_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut kb = kb(dir.path());

        let report = kb.build(&documents(), true).await.unwrap();
        assert!(!report.reused_existing);
        assert!(report.passages_indexed >= 3);
        assert_eq!(report.documents_indexed, 3);

        let stats = kb.stats().unwrap();
        assert_eq!(stats.total_vectors, kb.passage_count().unwrap());
        assert_eq!(stats.vector_dimension, 16);
        assert_eq!(stats.index_type, "flat_ip");
        assert_eq!(stats.document_count, 3);
    }

    #[tokio::test]
    async fn persist_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        let query = {
            let mut kb = kb(dir.path());
            kb.build(&documents(), true).await.unwrap();
            let embedder = StubEmbedder { dimensions: 16 };
            let query = embedder.encode("资本充足率");
            let before = kb.search(&query, 3).unwrap();

            let mut fresh = self::kb(dir.path());
            fresh.load().unwrap();
            let after = fresh.search(&query, 3).unwrap();

            assert_eq!(before.len(), after.len());
            for (b, a) in before.iter().zip(after.iter()) {
                assert_eq!(b.0, a.0);
                assert!((b.1 - a.1).abs() < 1e-5);
            }
            assert_eq!(fresh.passage_count(), kb.passage_count());
            query
        };

        // Same ids come back by positional correspondence.
        let mut again = kb(dir.path());
        again.load().unwrap();
        let results = again.search(&query, 1).unwrap();
        assert!(again.passage_by_row(results[0].0).is_some());
    }

    #[tokio::test]
    async fn reuse_within_growth_tolerance() {
        let dir = tempfile::tempdir().unwrap();
        let mut kb = kb(dir.path());
        kb.build(&documents(), true).await.unwrap();

        let mut second = self::kb(dir.path());
        let report = second.build(&documents(), false).await.unwrap();
        assert!(report.reused_existing);

        // Forcing always rebuilds.
        let report = second.build(&documents(), true).await.unwrap();
        assert!(!report.reused_existing);
    }

    #[tokio::test]
    async fn doubled_corpus_triggers_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let mut kb = kb(dir.path());
        kb.build(&documents(), true).await.unwrap();

        let mut many = documents();
        many.extend(documents());
        let report = kb.build(&many, false).await.unwrap();
        assert!(!report.reused_existing);
        assert_eq!(kb.stats().unwrap().document_count, 6);
    }

    #[tokio::test]
    async fn missing_artifact_blocks_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut kb = kb(dir.path());
        kb.build(&documents(), true).await.unwrap();

        let settings = settings_in(dir.path());
        std::fs::remove_file(settings.index_dir().join(&settings.index.metadata_file)).unwrap();

        let mut fresh = self::kb(dir.path());
        assert!(!fresh.can_load_existing());
        assert!(matches!(
            fresh.load(),
            Err(RegQaError::CorruptPersistedState(_))
        ));
    }

    #[tokio::test]
    async fn row_count_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let mut kb = kb(dir.path());
        kb.build(&documents(), true).await.unwrap();

        // Tamper with the metadata to disagree with the index.
        let settings = settings_in(dir.path());
        let metadata_path = settings.index_dir().join(&settings.index.metadata_file);
        let mut metadata: crate::index::IndexMetadata =
            serde_json::from_str(&std::fs::read_to_string(&metadata_path).unwrap()).unwrap();
        metadata.total_vectors += 5;
        std::fs::write(&metadata_path, serde_json::to_string(&metadata).unwrap()).unwrap();

        let mut fresh = self::kb(dir.path());
        assert!(matches!(
            fresh.load(),
            Err(RegQaError::CorruptPersistedState(_))
        ));
    }

    #[tokio::test]
    async fn clear_removes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut kb = kb(dir.path());
        kb.build(&documents(), true).await.unwrap();
        assert!(kb.can_load_existing());

        kb.clear().unwrap();
        assert!(!kb.can_load_existing());
        assert!(!kb.is_loaded());
        assert!(matches!(
            kb.search(&[0.0; 16], 1),
            Err(RegQaError::IndexUnavailable)
        ));
    }

    #[tokio::test]
    async fn empty_corpus_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut kb = kb(dir.path());
        let result = kb.build(&[], true).await;
        assert!(matches!(result, Err(RegQaError::InvalidInput(_))));
        // No partial artifacts left behind.
        assert!(!kb.can_load_existing());
    }

    #[tokio::test]
    async fn skips_empty_documents_but_indexes_rest() {
        let dir = tempfile::tempdir().unwrap();
        let mut kb = kb(dir.path());
        let mut docs = documents();
        docs.push(SourceDocument::with_filename("    ".to_string(), "blank.txt"));

        let report = kb.build(&docs, true).await.unwrap();
        assert_eq!(report.documents_indexed, 3);
        // The blank document is absent from the persisted stats too.
        assert_eq!(kb.stats().unwrap().document_count, 3);
    }
}
