//! OCR input and file-name mapping.

use crate::error::{EnrichError, EnrichResult};
use pagewise_core::{document_hash, DocumentHash, DocumentUnit};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default mapping file name, looked up next to the input file.
pub const MAPPING_FILE_NAME: &str = "mapping.json";

/// One entry of the OCR file. Fields other than `text` are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrEntry {
    #[serde(default)]
    pub text: Vec<Option<String>>,
}

impl OcrEntry {
    /// Page texts with null pages read as empty.
    pub fn pages(&self) -> Vec<String> {
        self.text.iter().map(|page| page.clone().unwrap_or_default()).collect()
    }
}

/// OCR results keyed as in the file (possibly with the cache prefix).
pub type OcrFile = BTreeMap<String, OcrEntry>;

/// Map from document hash to original file name.
pub type FileNameMapping = HashMap<String, String>;

fn read_json<T: DeserializeOwned>(path: &Path) -> EnrichResult<T> {
    let input_error = |message: String| EnrichError::Input {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(|e| input_error(e.to_string()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| input_error(e.to_string()))
}

pub fn load_ocr_file(path: &Path) -> EnrichResult<OcrFile> {
    read_json(path)
}

pub fn load_mapping(path: &Path) -> EnrichResult<FileNameMapping> {
    read_json(path)
}

/// `mapping.json` in the directory of `input`.
pub fn default_mapping_path(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) => parent.join(MAPPING_FILE_NAME),
        None => PathBuf::from(MAPPING_FILE_NAME),
    }
}

/// The documents of one run, sorted by hash.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: BTreeMap<DocumentHash, DocumentUnit>,
    unmapped: Vec<String>,
}

impl DocumentSet {
    /// Join OCR entries with their file names. Entries without a mapping are
    /// skipped and remembered by key.
    pub fn from_ocr(ocr: OcrFile, mapping: &FileNameMapping) -> Self {
        let mut set = Self::default();

        for (key, entry) in ocr {
            let hash = document_hash(&key);
            let Some(file_name) = mapping.get(hash).or_else(|| mapping.get(&key)) else {
                warn!("No file name mapped for {}, skipping", key);
                set.unmapped.push(key);
                continue;
            };

            let document = DocumentUnit::new(hash, file_name.clone(), entry.pages());
            if set.documents.insert(hash.to_string(), document).is_some() {
                warn!("Document {} appears under more than one key, keeping {}", hash, key);
            }
        }

        set
    }

    /// Load the OCR file and mapping from disk.
    pub fn load(input: &Path, mapping: &Path) -> EnrichResult<Self> {
        let ocr = load_ocr_file(input)?;
        let mapping = load_mapping(mapping)?;
        let set = Self::from_ocr(ocr, &mapping);
        info!(
            "Loaded {} documents from {} ({} unmapped)",
            set.len(),
            input.display(),
            set.unmapped.len()
        );
        Ok(set)
    }

    pub fn from_documents(documents: impl IntoIterator<Item = DocumentUnit>) -> Self {
        Self {
            documents: documents
                .into_iter()
                .map(|document| (document.hash.clone(), document))
                .collect(),
            unmapped: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Document hashes in sorted order.
    pub fn hashes(&self) -> impl Iterator<Item = &DocumentHash> {
        self.documents.keys()
    }

    pub fn get(&self, hash: &str) -> Option<&DocumentUnit> {
        self.documents.get(hash)
    }

    /// OCR keys skipped for lack of a file name.
    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }
}

/// Summary numbers for an OCR file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OcrStats {
    pub documents: usize,
    pub pages: usize,
    /// Keys whose pages are all blank (or that have no pages).
    pub blank_documents: Vec<String>,
    /// Keys with no mapping entry, when a mapping was given.
    pub unmapped: Vec<String>,
}

impl OcrStats {
    pub fn collect(ocr: &OcrFile, mapping: Option<&FileNameMapping>) -> Self {
        let mut stats = Self {
            documents: ocr.len(),
            ..Self::default()
        };

        for (key, entry) in ocr {
            stats.pages += entry.text.len();

            let blank = entry
                .text
                .iter()
                .all(|page| page.as_deref().map_or(true, |text| text.trim().is_empty()));
            if blank {
                stats.blank_documents.push(key.clone());
            }

            if let Some(mapping) = mapping {
                let hash = document_hash(key);
                if !mapping.contains_key(hash) && !mapping.contains_key(key) {
                    stats.unmapped.push(key.clone());
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ocr() -> OcrFile {
        serde_json::from_str(
            r#"{
                "ocr_results:ocr_bbb": {"text": ["第一页", null, "第三页"], "pages": 3},
                "aaa": {"text": ["cover"]},
                "ocr_results:ocr_ccc": {"text": [null, "  "]},
                "ddd": {}
            }"#,
        )
        .unwrap()
    }

    fn mapping() -> FileNameMapping {
        [
            ("aaa".to_string(), "a.pdf".to_string()),
            ("bbb".to_string(), "b.pdf".to_string()),
            ("ccc".to_string(), "c.pdf".to_string()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_document_set_joins_mapping() {
        let set = DocumentSet::from_ocr(ocr(), &mapping());

        assert_eq!(set.len(), 3);
        assert_eq!(set.hashes().collect::<Vec<_>>(), vec!["aaa", "bbb", "ccc"]);
        assert_eq!(set.unmapped(), &["ddd".to_string()]);

        let b = set.get("bbb").unwrap();
        assert_eq!(b.file_name, "b.pdf");
        assert_eq!(b.pages, vec!["第一页", "", "第三页"]);
    }

    #[test]
    fn test_prefixed_and_bare_key_collide() {
        let ocr: OcrFile = serde_json::from_str(
            r#"{
                "abc": {"text": ["bare"]},
                "ocr_results:ocr_abc": {"text": ["prefixed"]}
            }"#,
        )
        .unwrap();
        let mapping: FileNameMapping = [("abc".to_string(), "x.pdf".to_string())]
            .into_iter()
            .collect();

        let set = DocumentSet::from_ocr(ocr, &mapping);
        assert_eq!(set.len(), 1);
        assert!(set.unmapped().is_empty());
        // Keys are visited in sorted order; the later one is kept
        assert_eq!(set.get("abc").unwrap().pages, vec!["prefixed"]);
    }

    #[test]
    fn test_stats() {
        let stats = OcrStats::collect(&ocr(), Some(&mapping()));
        assert_eq!(stats.documents, 4);
        assert_eq!(stats.pages, 6);
        assert_eq!(stats.blank_documents, vec!["ddd", "ocr_results:ocr_ccc"]);
        assert_eq!(stats.unmapped, vec!["ddd"]);

        let stats = OcrStats::collect(&ocr(), None);
        assert!(stats.unmapped.is_empty());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ocr.json");
        std::fs::write(&input, r#"{"ocr_results:ocr_h1": {"text": ["p"]}}"#).unwrap();
        std::fs::write(default_mapping_path(&input), r#"{"h1": "one.pdf"}"#).unwrap();

        let set = DocumentSet::load(&input, &default_mapping_path(&input)).unwrap();
        assert_eq!(set.get("h1").unwrap().file_name, "one.pdf");
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_ocr_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, EnrichError::Input { .. }));
    }
}
