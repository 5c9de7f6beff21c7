//! Build the content-hash to file-name mapping for a directory of PDFs.

use crate::error::{EnrichError, EnrichResult};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

/// SHA-256 of a file's contents, hex encoded.
pub fn hash_file(path: &Path) -> EnrichResult<String> {
    let file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut BufReader::new(file), &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Hash every PDF below `dir`. Identical files collapse to one entry.
pub fn build_mapping(dir: &Path) -> EnrichResult<BTreeMap<String, String>> {
    if !dir.is_dir() {
        return Err(EnrichError::Input {
            path: dir.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let mut mapping = BTreeMap::new();

    for entry in walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_pdf(path) {
            continue;
        }

        let hash = match hash_file(path) {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Failed to hash {:?}: {}", path, e);
                continue;
            }
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!("{} -> {}", hash, file_name);
        if let Some(previous) = mapping.insert(hash, file_name.clone()) {
            if previous != file_name {
                debug!("{} duplicates {}", file_name, previous);
            }
        }
    }

    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"hello").unwrap();

        assert_eq!(
            hash_file(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_build_mapping_walks_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"one").unwrap();
        std::fs::write(dir.path().join("sub").join("B.PDF"), b"two").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"three").unwrap();

        let mapping = build_mapping(dir.path()).unwrap();
        assert_eq!(mapping.len(), 2);
        let mut names: Vec<&String> = mapping.values().collect();
        names.sort();
        assert_eq!(names, vec!["B.PDF", "a.pdf"]);
    }

    #[test]
    fn test_build_mapping_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(build_mapping(&dir.path().join("absent")).is_err());
    }
}
