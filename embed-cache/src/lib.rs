//! Content-addressed embedding cache.
//!
//! Embedding computation is the expensive part of an experiment run, and it
//! depends only on the `(embedder, chunker-config)` pair — not on anything
//! else in the configuration. This crate persists `(passages, vectors)`
//! under a deterministic [`CacheKey`] so repeated runs with an identical
//! pair skip the provider entirely.
//!
//! Layout on disk, one directory per key:
//!
//! ```text
//! <root>/<cache_key>/
//!   passages.jsonl    # one passage per line
//!   embeddings.json   # JSON array of vectors, ordered 1:1 with passages
//!   metadata.json     # CacheMetadata
//! ```
//!
//! Writes are atomic: an entry is staged in a temp-named sibling directory
//! and committed with a single `rename`, so a concurrent reader observes
//! either nothing or the complete entry, never a torn write. A writer that
//! loses the rename race discards its staging directory; the winner's entry
//! is equivalent by construction.

mod entry;
mod errors;
mod key;

pub use entry::{CacheEntry, CacheMetadata};
pub use errors::CacheError;
pub use key::CacheKey;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Filesystem-backed embedding cache rooted at one directory.
pub struct EmbeddingCache {
    root: PathBuf,
}

impl EmbeddingCache {
    /// Opens (and creates, if needed) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the entry for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Loads the entry for `key`, or `None` on a miss.
    ///
    /// Unreadable files and shape mismatches (vector count != passage count)
    /// are treated as corruption: the entry is discarded and reported as a
    /// miss so the caller recomputes. This never returns an error for a bad
    /// entry — only for a failure to inspect the cache root itself.
    pub fn get<P: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> Result<Option<CacheEntry<P>>, CacheError> {
        let dir = self.entry_path(key);
        if !dir.is_dir() {
            debug!("cache miss: {key}");
            return Ok(None);
        }

        match load_entry(&dir) {
            Ok(entry) => {
                info!(
                    "cache hit: {key} ({} passages, dim={})",
                    entry.metadata.passage_count, entry.metadata.embedding_dimension
                );
                Ok(Some(entry))
            }
            Err(e) => {
                warn!("cache entry {key} unreadable ({e}); discarding and treating as miss");
                let _ = fs::remove_dir_all(&dir);
                Ok(None)
            }
        }
    }

    /// Persists an entry for `key` atomically.
    ///
    /// All files are written into a temp-named staging directory which is
    /// committed with a single `rename`. If another writer committed the same
    /// key first, the staging directory is discarded and the call succeeds —
    /// both writers computed the same content by the caching invariant.
    ///
    /// # Errors
    /// Returns [`CacheError::ShapeMismatch`] when `vectors` and `passages`
    /// differ in length, and I/O errors from the staging writes.
    pub fn put<P: Serialize>(
        &self,
        key: &CacheKey,
        passages: &[P],
        vectors: &[Vec<f32>],
        embedder: &str,
        chunker: &str,
        chunker_params: &[(String, String)],
    ) -> Result<(), CacheError> {
        if passages.len() != vectors.len() {
            return Err(CacheError::ShapeMismatch {
                vectors: vectors.len(),
                passages: passages.len(),
            });
        }

        let staging = self
            .root
            .join(format!(".tmp-{}-{}", key.as_str(), std::process::id()));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let metadata = CacheMetadata {
            cache_key: key.as_str().to_string(),
            embedder: embedder.to_string(),
            chunker: chunker.to_string(),
            chunker_params: chunker_params.iter().cloned().collect::<BTreeMap<_, _>>(),
            passage_count: passages.len(),
            embedding_dimension: vectors.first().map(|v| v.len()).unwrap_or(0),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        if let Err(e) = write_entry(&staging, passages, vectors, &metadata) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        let dest = self.entry_path(key);
        match fs::rename(&staging, &dest) {
            Ok(()) => {
                info!("cache store: {key} ({} passages)", passages.len());
                Ok(())
            }
            Err(e) if dest.is_dir() => {
                // Lost the commit race; the winner's entry is equivalent.
                debug!("cache entry {key} already present ({e}); dropping staged copy");
                let _ = fs::remove_dir_all(&staging);
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                Err(e.into())
            }
        }
    }

    /// Lists all committed keys, sorted. Staging directories are skipped.
    pub fn list_keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(".tmp-") {
                continue;
            }
            keys.push(CacheKey::from_raw(name));
        }
        keys.sort();
        Ok(keys)
    }

    /// Deletes the entry for `key`. Returns whether anything was removed.
    ///
    /// Operator maintenance only; the pipeline never deletes entries.
    pub fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let dir = self.entry_path(key);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        info!("cache delete: {key}");
        Ok(true)
    }

    /// Reads the metadata record of `key`, or `None` if absent/unreadable.
    pub fn metadata(&self, key: &CacheKey) -> Option<CacheMetadata> {
        let path = self.entry_path(key).join("metadata.json");
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Total size in bytes of the entry's files (0 if absent).
    pub fn size_bytes(&self, key: &CacheKey) -> u64 {
        let dir = self.entry_path(key);
        let Ok(entries) = fs::read_dir(dir) else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum()
    }
}

fn write_entry<P: Serialize>(
    dir: &Path,
    passages: &[P],
    vectors: &[Vec<f32>],
    metadata: &CacheMetadata,
) -> Result<(), CacheError> {
    let mut w = BufWriter::new(File::create(dir.join("passages.jsonl"))?);
    for p in passages {
        serde_json::to_writer(&mut w, p)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;

    let f = BufWriter::new(File::create(dir.join("embeddings.json"))?);
    serde_json::to_writer(f, vectors)?;

    let f = BufWriter::new(File::create(dir.join("metadata.json"))?);
    serde_json::to_writer_pretty(f, metadata)?;
    Ok(())
}

fn load_entry<P: DeserializeOwned>(dir: &Path) -> Result<CacheEntry<P>, CacheError> {
    let metadata: CacheMetadata =
        serde_json::from_str(&fs::read_to_string(dir.join("metadata.json"))?)?;

    let mut passages = Vec::new();
    let reader = BufReader::new(File::open(dir.join("passages.jsonl"))?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        passages.push(serde_json::from_str(&line)?);
    }

    let vectors: Vec<Vec<f32>> =
        serde_json::from_str(&fs::read_to_string(dir.join("embeddings.json"))?)?;

    if vectors.len() != passages.len() {
        return Err(CacheError::ShapeMismatch {
            vectors: vectors.len(),
            passages: passages.len(),
        });
    }

    Ok(CacheEntry {
        passages,
        vectors,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct TestPassage {
        doc_id: String,
        index: usize,
        text: String,
    }

    fn sample_passages() -> Vec<TestPassage> {
        vec![
            TestPassage {
                doc_id: "d1".into(),
                index: 0,
                text: "first".into(),
            },
            TestPassage {
                doc_id: "d1".into(),
                index: 1,
                text: "second".into(),
            },
        ]
    }

    fn sample_key() -> CacheKey {
        CacheKey::derive(
            "nomic-embed-text",
            "recursive",
            &[
                ("chunk_size".into(), "500".into()),
                ("chunk_overlap".into(), "100".into()),
            ],
        )
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        let key = sample_key();
        let passages = sample_passages();
        let vectors = vec![vec![0.1, 0.2], vec![0.3, 0.4]];

        cache
            .put(&key, &passages, &vectors, "nomic-embed-text", "recursive", &[])
            .unwrap();

        let entry = cache.get::<TestPassage>(&key).unwrap().expect("hit");
        assert_eq!(entry.passages, passages);
        assert_eq!(entry.vectors, vectors);
        assert_eq!(entry.metadata.passage_count, 2);
        assert_eq!(entry.metadata.embedding_dimension, 2);
    }

    #[test]
    fn miss_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        let got = cache.get::<TestPassage>(&sample_key()).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn shape_mismatch_rejected_at_put() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        let err = cache
            .put(&sample_key(), &sample_passages(), &[vec![0.1]], "m", "c", &[])
            .unwrap_err();
        assert!(matches!(err, CacheError::ShapeMismatch { .. }));
    }

    #[test]
    fn corrupt_entry_is_discarded_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        let key = sample_key();
        let vectors = vec![vec![0.1], vec![0.2]];
        cache
            .put(&key, &sample_passages(), &vectors, "m", "c", &[])
            .unwrap();

        // Drop one vector so counts disagree on load.
        let emb_path = cache.entry_path(&key).join("embeddings.json");
        fs::write(&emb_path, "[[0.1]]").unwrap();

        assert!(cache.get::<TestPassage>(&key).unwrap().is_none());
        // The broken entry is gone; the next put can recompute and commit.
        assert!(!cache.entry_path(&key).exists());
    }

    #[test]
    fn second_writer_losing_the_race_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        let key = sample_key();
        let passages = sample_passages();
        let vectors = vec![vec![0.1], vec![0.2]];

        cache.put(&key, &passages, &vectors, "m", "c", &[]).unwrap();
        // Same key committed again: rename loses, call still succeeds.
        cache.put(&key, &passages, &vectors, "m", "c", &[]).unwrap();

        assert!(cache.get::<TestPassage>(&key).unwrap().is_some());
        assert_eq!(cache.list_keys().unwrap().len(), 1);
    }

    #[test]
    fn maintenance_operations() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        let key = sample_key();
        cache
            .put(&key, &sample_passages(), &[vec![0.1], vec![0.2]], "m", "c", &[])
            .unwrap();

        assert_eq!(cache.list_keys().unwrap(), vec![key.clone()]);
        assert!(cache.size_bytes(&key) > 0);
        assert_eq!(cache.metadata(&key).unwrap().passage_count, 2);

        assert!(cache.delete(&key).unwrap());
        assert!(!cache.delete(&key).unwrap());
        assert!(cache.list_keys().unwrap().is_empty());
    }
}
