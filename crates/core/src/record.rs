//! Record storage.
//!
//! Each saved patient lives in exactly one `<base name>.json` file directly inside the save
//! directory:
//!
//! ```text
//! <save_dir>/
//!   Jane Doe.json
//!   patient.json
//!   pv_one_patients.csv   # companion index, see crate::index
//! ```
//!
//! Writes fully overwrite any existing file of the same name. The write is not atomic: a failure
//! part-way through leaves the file in an undefined state and nothing is rolled back.

use crate::constants::RECORD_EXTENSION;
use crate::{SaveError, SaveResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// The on-disk unit: a display name plus the clinical payload.
///
/// An absent name is written as `null` rather than omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub name: Option<String>,
    pub data: Value,
}

/// Writes and reads record files within a single save directory.
#[derive(Debug, Clone)]
pub struct RecordStore {
    directory: PathBuf,
}

impl RecordStore {
    /// Creates a store rooted at `directory`.
    ///
    /// No I/O happens here; the directory is created on the first [`save`](Self::save).
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the filename (not the full path) used for `base_name`.
    pub fn filename_for(base_name: &str) -> String {
        format!("{base_name}.{RECORD_EXTENSION}")
    }

    /// Persists `record` as `<directory>/<base_name>.json`.
    ///
    /// The directory and any missing parents are created first. The document is pretty-printed
    /// with non-ASCII text kept literal.
    ///
    /// # Returns
    ///
    /// The absolute path of the written file.
    ///
    /// # Errors
    ///
    /// Returns `SaveError` if:
    /// - the directory cannot be created or resolved,
    /// - the record cannot be serialised,
    /// - the file cannot be written.
    pub fn save(&self, base_name: &str, record: &StoredRecord) -> SaveResult<PathBuf> {
        fs::create_dir_all(&self.directory).map_err(SaveError::StorageDirCreation)?;
        let directory = fs::canonicalize(&self.directory).map_err(SaveError::StorageDirResolve)?;

        let out_path = directory.join(Self::filename_for(base_name));
        let json = serde_json::to_string_pretty(record).map_err(SaveError::Serialization)?;
        fs::write(&out_path, json).map_err(SaveError::FileWrite)?;

        Ok(out_path)
    }

    /// Reads a record file back.
    ///
    /// # Errors
    ///
    /// Returns `SaveError::FileRead` or `SaveError::Deserialization` if the file is missing or
    /// does not hold a `{name, data}` document.
    pub fn load(path: &Path) -> SaveResult<StoredRecord> {
        let contents = fs::read_to_string(path).map_err(SaveError::FileRead)?;
        serde_json::from_str(&contents).map_err(SaveError::Deserialization)
    }
}
