//! Flatten result files into one row per page for a vector-store loader.

use crate::checkpoint::{parse_batch_name, read_batch};
use crate::error::{EnrichError, EnrichResult};
use pagewise_core::{DocumentHash, DocumentRecord, SparseVector};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One page as the vector store ingests it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRow<'a> {
    pub hash: &'a str,
    pub file_name: &'a str,
    pub page: usize,
    pub content: &'a str,
    pub entity: &'a str,
    pub time: &'a str,
    pub enabled: bool,
    pub embedding: &'a [f32],
    pub sparse_vector: &'a SparseVector,
}

/// Rows for every page of every record. Records whose per-page sequences
/// disagree in length are skipped.
pub fn rows(records: &BTreeMap<DocumentHash, DocumentRecord>) -> Vec<VectorRow<'_>> {
    let mut rows = Vec::new();

    for (hash, record) in records {
        if let Err(e) = record.validate(record.page_count()) {
            warn!("Skipping {}: {}", hash, e);
            continue;
        }

        for (page, content) in record.contextualized_pages.iter().enumerate() {
            rows.push(VectorRow {
                hash,
                file_name: &record.file_name,
                page,
                content,
                entity: &record.metadata.entity,
                time: &record.metadata.time,
                enabled: true,
                embedding: &record.dense_embeddings[page],
                sparse_vector: &record.sparse_embeddings[page],
            });
        }
    }

    rows
}

/// Merge every checkpoint batch file (`{stem}_{index:04}.json`) in `dir`.
/// Other JSON files, such as the OCR input or the mapping, are ignored.
pub fn collect_dir(dir: &Path) -> EnrichResult<BTreeMap<DocumentHash, DocumentRecord>> {
    let pattern = format!("{}/*_*.json", glob::Pattern::escape(&dir.to_string_lossy()));
    let entries = glob::glob(&pattern).map_err(|e| EnrichError::Input {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut batches: Vec<(String, usize, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter_map(|path| {
            let (stem, index) = parse_batch_name(path.file_name()?.to_str()?)?;
            Some((stem.to_string(), index, path))
        })
        .collect();
    batches.sort();

    let mut merged = BTreeMap::new();
    for (_, _, path) in batches {
        let records = read_batch(&path)?;
        info!("Read {} records from {}", records.len(), path.display());
        for (hash, record) in records {
            if merged.insert(hash.clone(), record).is_some() {
                warn!("Document {} appears in more than one batch", hash);
            }
        }
    }
    Ok(merged)
}

/// Write rows as JSON Lines. Returns the number of rows written.
pub fn write_jsonl(rows: &[VectorRow<'_>], out: &Path) -> EnrichResult<usize> {
    let mut writer = BufWriter::new(File::create(out)?);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointStore;
    use pagewise_core::FileMetadata;
    use serde_json::Value;

    fn record(pages: usize) -> DocumentRecord {
        DocumentRecord {
            file_name: "a.pdf".to_string(),
            metadata: FileMetadata {
                entity: "广东".to_string(),
                time: "2023".to_string(),
            },
            contextualized_pages: (0..pages).map(|i| format!("page {}", i)).collect(),
            dense_embeddings: vec![vec![1.0, 0.0]; pages],
            sparse_embeddings: (0..pages).map(|i| [(i as u32, 0.5)].into_iter().collect()).collect(),
        }
    }

    #[test]
    fn test_rows_per_page() {
        let mut records = BTreeMap::new();
        records.insert("h1".to_string(), record(2));
        let mut broken = record(2);
        broken.dense_embeddings.pop();
        records.insert("h2".to_string(), broken);

        let rows = rows(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].page, 1);
        assert_eq!(rows[1].content, "page 1");
        assert_eq!(rows[1].entity, "广东");
        assert!(rows.iter().all(|r| r.hash == "h1" && r.enabled));
    }

    #[test]
    fn test_export_round() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "run");
        store.write_batch(0, &[("h1".to_string(), record(1))]).unwrap();
        store.write_batch(1, &[("h2".to_string(), record(2))]).unwrap();

        let records = collect_dir(dir.path()).unwrap();
        assert_eq!(records.len(), 2);

        let out = dir.path().join("rows.jsonl");
        assert_eq!(write_jsonl(&rows(&records), &out).unwrap(), 3);

        let text = std::fs::read_to_string(&out).unwrap();
        let first: Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["hash"], "h1");
        assert_eq!(first["time"], "2023");
        assert_eq!(first["sparse_vector"]["0"], 0.5);
    }

    #[test]
    fn test_collect_dir_beside_input_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ocr.json"),
            r#"{"ocr_results:ocr_h1": {"text": ["page"]}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("mapping.json"), r#"{"h1": "a.pdf"}"#).unwrap();
        std::fs::write(dir.path().join("vectors.jsonl"), "").unwrap();

        let store = CheckpointStore::for_input(&dir.path().join("ocr.json"));
        store.write_batch(0, &[("h1".to_string(), record(1))]).unwrap();
        store.write_batch(1, &[("h2".to_string(), record(2))]).unwrap();

        let records = collect_dir(dir.path()).unwrap();
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["h1", "h2"]);
    }
}
