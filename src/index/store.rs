//! Passage store: id -> passage mapping aligned with index rows.
//!
//! Iteration order equals insertion order equals index row order. That
//! correspondence is the invariant the whole retrieval path rests on, so
//! the store (de)serializes as a JSON object whose key order is preserved.

use crate::error::{RegQaError, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Compute the content hash of a passage text (hex SHA-256).
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{:x}", digest)
}

/// A stored passage. Immutable once created; content changes produce a new
/// id on the next build.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    /// Stable id within one index build: `doc_<i>_chunk_<j>`.
    pub id: String,
    /// Passage text.
    pub text: String,
    /// Index of the owning document in the build input.
    pub doc_index: usize,
    /// Index of this chunk within the owning document.
    pub chunk_index: usize,
    /// Metadata copied from the owning document.
    pub doc_metadata: BTreeMap<String, String>,
    /// Hex digest of `text`, for change detection across rebuilds.
    pub content_hash: String,
}

impl Passage {
    pub fn new(
        doc_index: usize,
        chunk_index: usize,
        text: String,
        doc_metadata: BTreeMap<String, String>,
    ) -> Self {
        let content_hash = content_hash(&text);
        Self {
            id: format!("doc_{}_chunk_{}", doc_index, chunk_index),
            text,
            doc_index,
            chunk_index,
            doc_metadata,
            content_hash,
        }
    }
}

/// On-disk record shape; the id lives in the surrounding object key.
#[derive(Serialize, Deserialize)]
struct PassageRecord {
    text: String,
    doc_index: usize,
    chunk_index: usize,
    doc_metadata: BTreeMap<String, String>,
    content_hash: String,
}

/// Insertion-ordered mapping from passage id to passage.
#[derive(Debug, Default, Clone)]
pub struct PassageStore {
    passages: Vec<Passage>,
    by_id: HashMap<String, usize>,
}

impl PassageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Append a passage; its row is the current length. Duplicate ids would
    /// break row alignment and are rejected.
    pub fn push(&mut self, passage: Passage) -> Result<()> {
        if self.by_id.contains_key(&passage.id) {
            return Err(RegQaError::Index(format!(
                "duplicate passage id: {}",
                passage.id
            )));
        }
        self.by_id.insert(passage.id.clone(), self.passages.len());
        self.passages.push(passage);
        Ok(())
    }

    /// Look up the passage stored at an index row.
    pub fn get_by_row(&self, row: usize) -> Option<&Passage> {
        self.passages.get(row)
    }

    /// Look up a passage by id.
    pub fn get(&self, id: &str) -> Option<&Passage> {
        self.by_id.get(id).map(|&row| &self.passages[row])
    }

    /// Iterate passages in row order.
    pub fn iter(&self) -> impl Iterator<Item = &Passage> {
        self.passages.iter()
    }

    /// Number of distinct source documents represented.
    pub fn document_count(&self) -> usize {
        let mut docs: Vec<usize> = self.passages.iter().map(|p| p.doc_index).collect();
        docs.sort_unstable();
        docs.dedup();
        docs.len()
    }

    /// Save the store as a JSON object, keys in row order.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load a store written by [`PassageStore::save`].
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let store: PassageStore = serde_json::from_reader(reader).map_err(|e| {
            RegQaError::CorruptPersistedState(format!("unreadable passage store: {}", e))
        })?;
        Ok(store)
    }
}

impl Serialize for PassageStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.passages.len()))?;
        for passage in &self.passages {
            let record = PassageRecord {
                text: passage.text.clone(),
                doc_index: passage.doc_index,
                chunk_index: passage.chunk_index,
                doc_metadata: passage.doc_metadata.clone(),
                content_hash: passage.content_hash.clone(),
            };
            map.serialize_entry(&passage.id, &record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PassageStore {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        struct StoreVisitor;

        impl<'de> Visitor<'de> for StoreVisitor {
            type Value = PassageStore;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of passage id to passage record")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut store = PassageStore::new();
                // MapAccess yields entries in document order, which is how
                // row alignment survives the round trip.
                while let Some((id, record)) = access.next_entry::<String, PassageRecord>()? {
                    let passage = Passage {
                        id,
                        text: record.text,
                        doc_index: record.doc_index,
                        chunk_index: record.chunk_index,
                        doc_metadata: record.doc_metadata,
                        content_hash: record.content_hash,
                    };
                    store
                        .push(passage)
                        .map_err(|e| serde::de::Error::custom(e.to_string()))?;
                }
                Ok(store)
            }
        }

        deserializer.deserialize_map(StoreVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(doc: usize, chunk: usize, text: &str) -> Passage {
        Passage::new(doc, chunk, text.to_string(), BTreeMap::new())
    }

    #[test]
    fn ids_follow_naming_scheme() {
        let p = passage(3, 7, "内容");
        assert_eq!(p.id, "doc_3_chunk_7");
        assert_eq!(p.content_hash, content_hash("内容"));
    }

    #[test]
    fn push_preserves_row_order() {
        let mut store = PassageStore::new();
        store.push(passage(0, 0, "甲")).unwrap();
        store.push(passage(0, 1, "乙")).unwrap();
        store.push(passage(1, 0, "丙")).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.get_by_row(1).unwrap().text, "乙");
        assert_eq!(store.get("doc_1_chunk_0").unwrap().text, "丙");
        assert_eq!(store.document_count(), 2);
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut store = PassageStore::new();
        store.push(passage(0, 0, "甲")).unwrap();
        assert!(store.push(passage(0, 0, "乙")).is_err());
    }

    #[test]
    fn json_round_trip_preserves_order() {
        let mut store = PassageStore::new();
        // Deliberately non-lexicographic ids: doc_10 sorts before doc_2.
        for doc in [2usize, 10, 1] {
            store.push(passage(doc, 0, &format!("文档{}", doc))).unwrap();
        }

        let json = serde_json::to_string(&store).unwrap();
        let back: PassageStore = serde_json::from_str(&json).unwrap();

        assert_eq!(back.len(), 3);
        for (row, passage) in store.iter().enumerate() {
            assert_eq!(back.get_by_row(row).unwrap().id, passage.id);
        }
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passages.json");

        let mut store = PassageStore::new();
        let mut meta = BTreeMap::new();
        meta.insert("filename".to_string(), "办法.txt".to_string());
        store
            .push(Passage::new(0, 0, "第一条 内容。".to_string(), meta))
            .unwrap();
        store.save(&path).unwrap();

        let back = PassageStore::load(&path).unwrap();
        assert_eq!(back.len(), 1);
        let p = back.get_by_row(0).unwrap();
        assert_eq!(p.doc_metadata.get("filename").unwrap(), "办法.txt");
        assert_eq!(p.content_hash, content_hash("第一条 内容。"));
    }
}
