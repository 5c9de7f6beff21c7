//! Core domain types for Pagewise.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable content hash identifying a document.
pub type DocumentHash = String;

/// Prefix the OCR cache puts in front of every document hash.
pub const OCR_KEY_PREFIX: &str = "ocr_results:ocr_";

/// Strip the OCR cache prefix from a key, leaving the document hash.
pub fn document_hash(key: &str) -> &str {
    key.strip_prefix(OCR_KEY_PREFIX).unwrap_or(key)
}

/// A source document with its OCR'd pages, the unit of work of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUnit {
    pub hash: DocumentHash,
    pub file_name: String,
    /// Raw page texts in reading order. Entries may be empty.
    pub pages: Vec<String>,
}

impl DocumentUnit {
    pub fn new(hash: impl Into<String>, file_name: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            hash: hash.into(),
            file_name: file_name.into(),
            pages,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Fail if the document has nothing to enrich.
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(Error::EmptyDocument(self.file_name.clone()));
        }
        Ok(())
    }
}

/// Metadata derived from a document's file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Region or province named in the file, empty if none.
    #[serde(default)]
    pub entity: String,
    /// Year, or comma-separated years for a range, empty if none.
    #[serde(default)]
    pub time: String,
}

/// Sparse vector as a map from term index to weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseVector(pub BTreeMap<u32, f32>);

impl SparseVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(u32, f32)> for SparseVector {
    fn from_iter<I: IntoIterator<Item = (u32, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Page-level retrieval record produced for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub file_name: String,
    #[serde(default)]
    pub metadata: FileMetadata,
    #[serde(alias = "processed_content")]
    pub contextualized_pages: Vec<String>,
    #[serde(alias = "embeddings")]
    pub dense_embeddings: Vec<Vec<f32>>,
    pub sparse_embeddings: Vec<SparseVector>,
}

impl DocumentRecord {
    pub fn page_count(&self) -> usize {
        self.contextualized_pages.len()
    }

    /// Check that every per-page sequence has one entry per source page.
    pub fn validate(&self, expected_pages: usize) -> Result<()> {
        let fields = [
            ("contextualized pages", self.contextualized_pages.len()),
            ("dense embeddings", self.dense_embeddings.len()),
            ("sparse embeddings", self.sparse_embeddings.len()),
        ];

        for (field, actual) in fields {
            if actual != expected_pages {
                return Err(Error::LengthMismatch {
                    file_name: self.file_name.clone(),
                    field,
                    expected: expected_pages,
                    actual,
                });
            }
        }

        Ok(())
    }
}

/// Terminal state of one document in a batch.
#[derive(Debug, Clone)]
pub enum DocumentOutcome {
    Success(DocumentRecord),
    Failure(String),
    Timeout,
}

impl DocumentOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            DocumentOutcome::Success(_) => OutcomeKind::Success,
            DocumentOutcome::Failure(_) => OutcomeKind::Failure,
            DocumentOutcome::Timeout => OutcomeKind::Timeout,
        }
    }
}

/// Outcome without its payload, for counting and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    Failure,
    Timeout,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Failure => "failure",
            OutcomeKind::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Language used for generated summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Chinese,
    English,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Chinese => "Chinese",
            Language::English => "English",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
