//! Entries of one result file that another does not have yet.

use crate::checkpoint::write_json_atomic;
use crate::error::{EnrichError, EnrichResult};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

fn read_object(path: &Path) -> EnrichResult<Map<String, Value>> {
    let input_error = |message: String| EnrichError::Input {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(|e| input_error(e.to_string()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| input_error(e.to_string()))
}

/// Entries of `new` whose keys are missing from `reference`.
pub fn new_entries(reference: &Map<String, Value>, new: Map<String, Value>) -> Map<String, Value> {
    new.into_iter()
        .filter(|(key, _)| !reference.contains_key(key))
        .collect()
}

/// Write the entries of `new` missing from `reference` to `out`. Returns their count.
pub fn diff_files(reference: &Path, new: &Path, out: &Path) -> EnrichResult<usize> {
    let reference = read_object(reference)?;
    let added = new_entries(&reference, read_object(new)?);

    write_json_atomic(out, &added)?;
    info!("Wrote {} new entries to {}", added.len(), out.display());
    Ok(added.len())
}
