//! Document and query-set loaders.
//!
//! The document source is a collaborator behind [`DocumentSource`]; the
//! bundled implementation reads local files and directories. JSONL rows are
//! mapped tolerantly: id and text are picked from the usual key candidates,
//! everything else is preserved in `extra`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{ExperimentError, Result};
use crate::record::{Document, QueryRecord};

/// Source of documents for one run.
pub trait DocumentSource: Send + Sync {
    fn load(&self) -> Result<Vec<Document>>;
}

/// Filesystem-backed document source.
///
/// Each location may be a file or a directory (scanned non-recursively, in
/// name order for determinism). Supported formats: `.jsonl` (one record per
/// line), `.json` (a record or an array of records), `.txt`/`.md` (whole
/// file as one document, file stem as id).
pub struct FsDocumentSource {
    locations: Vec<PathBuf>,
}

impl FsDocumentSource {
    pub fn new(locations: Vec<PathBuf>) -> Self {
        Self { locations }
    }
}

impl DocumentSource for FsDocumentSource {
    fn load(&self) -> Result<Vec<Document>> {
        let mut docs = Vec::new();
        for location in &self.locations {
            if !location.exists() {
                return Err(ExperimentError::Fatal(format!(
                    "document source unreachable: {}",
                    location.display()
                )));
            }
            if location.is_dir() {
                let mut entries: Vec<PathBuf> = fs::read_dir(location)?
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_file())
                    .collect();
                entries.sort();
                for path in entries {
                    load_file(&path, &mut docs)?;
                }
            } else {
                load_file(location, &mut docs)?;
            }
        }
        info!("loaded {} documents", docs.len());
        Ok(docs)
    }
}

fn load_file(path: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "jsonl" => {
            let reader = BufReader::new(File::open(path)?);
            for (i, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(&line) {
                    Ok(v) => {
                        if let Some(doc) = map_document(v) {
                            docs.push(doc);
                        }
                    }
                    Err(e) => {
                        warn!("skipping malformed JSON on {} line {}: {e}", path.display(), i + 1);
                    }
                }
            }
        }
        "json" => {
            let v: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
            match v {
                Value::Array(items) => {
                    docs.extend(items.into_iter().filter_map(map_document));
                }
                other => {
                    if let Some(doc) = map_document(other) {
                        docs.push(doc);
                    }
                }
            }
        }
        "txt" | "md" => {
            let text = fs::read_to_string(path)?;
            if !text.trim().is_empty() {
                docs.push(Document {
                    id: path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string()),
                    text,
                    extra: BTreeMap::new(),
                });
            }
        }
        other => {
            debug!("ignoring unsupported file type `{other}`: {}", path.display());
        }
    }
    Ok(())
}

/// Maps a loose JSON record into a [`Document`].
fn map_document(v: Value) -> Option<Document> {
    let obj = v.as_object()?;
    let id = pick_str(obj, &["id", "rec_idx", "doc_id"])?.to_string();
    let text = pick_str(obj, &["text", "content", "body"])?.to_string();
    if text.trim().is_empty() {
        return None;
    }
    let extra: BTreeMap<String, Value> = obj
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "text" | "content" | "body"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Some(Document { id, text, extra })
}

/// Reads the JSONL query set with ground truth and user profiles.
///
/// Accepted keys per row: `query_id`/`id`, `query`/`text`,
/// `ground_truth_docs` (strings or objects carrying `rec_idx`/`id`),
/// `user_profile`.
///
/// # Errors
/// `ExperimentError::Fatal` when the file is unreadable or yields no queries
/// — a run without queries has nothing to measure.
pub fn load_query_set(path: impl AsRef<Path>) -> Result<Vec<QueryRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        ExperimentError::Fatal(format!("query set unreadable: {}: {e}", path.display()))
    })?;

    let mut queries = Vec::new();
    let reader = BufReader::new(file);
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let v: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!("skipping malformed query on line {}: {e}", i + 1);
                continue;
            }
        };
        match map_query(v, i) {
            Some(q) => queries.push(q),
            None => warn!("skipping query on line {} without text", i + 1),
        }
    }

    if queries.is_empty() {
        return Err(ExperimentError::Fatal(format!(
            "query set is empty: {}",
            path.display()
        )));
    }
    info!("loaded {} queries from {}", queries.len(), path.display());
    Ok(queries)
}

fn map_query(v: Value, line_idx: usize) -> Option<QueryRecord> {
    let obj = v.as_object()?;
    let query_id = pick_str(obj, &["query_id", "id"])
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("q{}", line_idx + 1));
    let text = pick_str(obj, &["query", "text"])?.to_string();

    let ground_truth = obj
        .get("ground_truth_docs")
        .or_else(|| obj.get("ground_truth"))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(m) => {
                        pick_str(m, &["rec_idx", "id", "doc_id"]).map(|s| s.to_string())
                    }
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let profile = obj.get("user_profile").cloned().unwrap_or(Value::Null);

    Some(QueryRecord {
        query_id,
        text,
        profile,
        ground_truth,
    })
}

/// Pick string by keys from a JSON map.
fn pick_str<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    for k in keys {
        if let Some(s) = obj.get(*k).and_then(|v| v.as_str()) {
            return Some(s);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_jsonl_documents_with_extra_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "docs.jsonl",
            r#"{"rec_idx": "50436465", "text": "backend engineer posting", "company": "acme"}
{"id": "d2", "content": "data science posting"}
"#,
        );
        let docs = FsDocumentSource::new(vec![path]).load().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "50436465");
        assert_eq!(docs[0].extra["company"], "acme");
        assert_eq!(docs[1].id, "d2");
        assert_eq!(docs[1].text, "data science posting");
    }

    #[test]
    fn loads_plain_text_files_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.txt", "first document");
        write_file(dir.path(), "b.txt", "second document");
        let docs = FsDocumentSource::new(vec![dir.path().to_path_buf()])
            .load()
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a");
        assert_eq!(docs[1].id, "b");
    }

    #[test]
    fn missing_location_is_fatal() {
        let err = FsDocumentSource::new(vec![PathBuf::from("no/such/dir")])
            .load()
            .unwrap_err();
        assert!(matches!(err, ExperimentError::Fatal(_)));
    }

    #[test]
    fn query_set_accepts_string_and_object_ground_truth() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "queries.jsonl",
            r#"{"query_id": "437", "query": "backend jobs", "ground_truth_docs": [{"rec_idx": "111"}, "222"], "user_profile": {"major": "cs"}}
{"query": "data jobs"}
"#,
        );
        let queries = load_query_set(&path).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].query_id, "437");
        assert_eq!(queries[0].ground_truth, vec!["111", "222"]);
        assert_eq!(queries[0].profile["major"], "cs");
        // Missing id falls back to the line number.
        assert_eq!(queries[1].query_id, "q2");
        assert!(queries[1].ground_truth.is_empty());
    }

    #[test]
    fn empty_query_set_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "queries.jsonl", "\n\n");
        let err = load_query_set(&path).unwrap_err();
        assert!(matches!(err, ExperimentError::Fatal(_)));
    }
}
