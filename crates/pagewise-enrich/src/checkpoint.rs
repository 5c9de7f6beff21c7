//! Numbered checkpoint batch files, written atomically and never rewritten.

use crate::error::{EnrichError, EnrichResult};
use pagewise_core::{DocumentHash, DocumentRecord};
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Suffix appended to the input stem for the default checkpoint stem.
pub const DEFAULT_STEM_SUFFIX: &str = "_processed";

/// Location and naming of a run's checkpoint batches:
/// `{dir}/{stem}_{index:04}.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointStore {
    dir: PathBuf,
    stem: String,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    /// Default store for an input file: `{input_stem}_processed` next to the input.
    pub fn for_input(input: &Path) -> Self {
        let (dir, stem) = split_path(input);
        Self::new(dir, format!("{}{}", stem, DEFAULT_STEM_SUFFIX))
    }

    /// Store named after an explicit output path: its directory and file stem.
    pub fn for_output(output: &Path) -> Self {
        let (dir, stem) = split_path(output);
        Self::new(dir, stem)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn ensure_dir(&self) -> EnrichResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| EnrichError::Checkpoint {
            path: self.dir.clone(),
            message: e.to_string(),
        })
    }

    pub fn batch_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}_{:04}.json", self.stem, index))
    }

    pub fn is_persisted(&self, index: usize) -> bool {
        self.batch_path(index).is_file()
    }

    /// Write a batch in one atomic step: temp file in the same directory,
    /// flushed and synced, then renamed over the final path. Records keep the
    /// order they are given in.
    pub fn write_batch(
        &self,
        index: usize,
        records: &[(DocumentHash, DocumentRecord)],
    ) -> EnrichResult<PathBuf> {
        let path = self.batch_path(index);
        write_json_atomic(&path, &InOrder(records))?;
        debug!("Wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }

    /// Persisted batch files of this store, by index.
    pub fn persisted_batches(&self) -> EnrichResult<Vec<PathBuf>> {
        let pattern = format!(
            "{}/{}_*.json",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            glob::Pattern::escape(&self.stem)
        );
        let entries = glob::glob(&pattern).map_err(|e| EnrichError::Checkpoint {
            path: self.dir.clone(),
            message: e.to_string(),
        })?;

        let mut batches: Vec<(usize, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter_map(|path| {
                let (stem, index) = parse_batch_name(path.file_name()?.to_str()?)?;
                (stem == self.stem).then_some((index, path))
            })
            .collect();
        batches.sort();

        Ok(batches.into_iter().map(|(_, path)| path).collect())
    }

    /// Merge every persisted batch into one map keyed by document hash.
    pub fn merge_all(&self) -> EnrichResult<BTreeMap<DocumentHash, DocumentRecord>> {
        let mut merged = BTreeMap::new();
        for path in self.persisted_batches()? {
            for (hash, record) in read_batch(&path)? {
                if merged.insert(hash.clone(), record).is_some() {
                    warn!("Document {} appears in more than one batch", hash);
                }
            }
        }
        Ok(merged)
    }
}

/// Split a batch file name `{stem}_{index:04}.json` into stem and index.
pub(crate) fn parse_batch_name(name: &str) -> Option<(&str, usize)> {
    let (stem, digits) = name.strip_suffix(".json")?.rsplit_once('_')?;
    if stem.is_empty() || digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((stem, digits.parse().ok()?))
}

fn split_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    (dir, stem)
}

/// Read one batch file.
pub fn read_batch(path: &Path) -> EnrichResult<BTreeMap<DocumentHash, DocumentRecord>> {
    let file = File::open(path).map_err(|e| EnrichError::Input {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| EnrichError::Input {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Serialize `value` to `path` so readers see either no file or the complete one.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> EnrichResult<()> {
    let checkpoint_error = |message: String| EnrichError::Checkpoint {
        path: path.to_path_buf(),
        message,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir).map_err(|e| checkpoint_error(e.to_string()))?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer(&mut writer, value).map_err(|e| checkpoint_error(e.to_string()))?;
        writer.flush().map_err(|e| checkpoint_error(e.to_string()))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| checkpoint_error(e.to_string()))?;

    temp.persist(path)
        .map_err(|e| checkpoint_error(e.error.to_string()))?;
    Ok(())
}

/// Records serialized as a JSON object in slice order.
struct InOrder<'a>(&'a [(DocumentHash, DocumentRecord)]);

impl Serialize for InOrder<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(hash, record)| (hash, record)))
    }
}
