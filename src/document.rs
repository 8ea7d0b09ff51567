//! Source document abstraction.
//!
//! Rich format readers (docx, pdf) are external collaborators; the crate
//! only depends on the `DocumentLoader` seam and ships a plain-text loader.

use crate::error::{RegQaError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// A raw document as produced by a loader, before splitting.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Full document text.
    pub text: String,
    /// Opaque metadata copied onto every passage (e.g., filename).
    pub metadata: BTreeMap<String, String>,
}

impl SourceDocument {
    /// Create a document with a single `filename` metadata entry.
    pub fn with_filename(text: String, filename: &str) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("filename".to_string(), filename.to_string());
        Self { text, metadata }
    }
}

/// Trait for document loading implementations.
pub trait DocumentLoader: Send + Sync {
    /// Load all documents found under a directory.
    fn load_documents(&self, dir: &Path) -> Result<Vec<SourceDocument>>;
}

/// Loader for plain-text and markdown files in a directory tree.
pub struct TextDirectoryLoader {
    extensions: Vec<&'static str>,
}

impl TextDirectoryLoader {
    pub fn new() -> Self {
        Self {
            extensions: vec!["txt", "md"],
        }
    }

    fn load_recursive(&self, dir: &Path, out: &mut Vec<SourceDocument>) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.path());

        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                self.load_recursive(&path, out)?;
                continue;
            }
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| self.extensions.contains(&ext));
            if !matches {
                continue;
            }
            // A single unreadable file must not abort the batch.
            match std::fs::read_to_string(&path) {
                Ok(text) if !text.trim().is_empty() => {
                    let name = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown");
                    debug!("Loaded document: {} ({} chars)", name, text.chars().count());
                    out.push(SourceDocument::with_filename(text, name));
                }
                Ok(_) => {
                    debug!("Skipping empty document: {}", path.display());
                }
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                }
            }
        }
        Ok(())
    }
}

impl Default for TextDirectoryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for TextDirectoryLoader {
    fn load_documents(&self, dir: &Path) -> Result<Vec<SourceDocument>> {
        if !dir.exists() {
            return Err(RegQaError::DocumentLoad(format!(
                "document directory does not exist: {}",
                dir.display()
            )));
        }
        let mut documents = Vec::new();
        self.load_recursive(dir, &mut documents)?;
        debug!("Loaded {} documents from {}", documents.len(), dir.display());
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_text_files_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "第一条 测试内容。").unwrap();
        std::fs::write(dir.path().join("b.md"), "# 标题\n正文。").unwrap();
        std::fs::write(dir.path().join("c.bin"), [0u8, 1, 2]).unwrap();
        std::fs::write(dir.path().join("empty.txt"), "   ").unwrap();

        let docs = TextDirectoryLoader::new()
            .load_documents(dir.path())
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.get("filename").unwrap(), "a.txt");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let result =
            TextDirectoryLoader::new().load_documents(Path::new("/nonexistent/regqa-docs"));
        assert!(matches!(result, Err(RegQaError::DocumentLoad(_))));
    }
}
