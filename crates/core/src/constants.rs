//! Constants used throughout the PV save core crate.
//!
//! This module contains all path and filename constants to ensure
//! consistency across the codebase and make maintenance easier.

/// Default directory for saved records when `PV_SAVE_DIR` is not set.
pub const DEFAULT_SAVE_DIR: &str = "pv_one_saved";

/// Default listen port when `PV_SAVE_PORT` is not set.
pub const DEFAULT_PORT: u16 = 5000;

/// Default request body limit (50 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Filename of the companion index kept next to the record files.
pub const INDEX_FILENAME: &str = "pv_one_patients.csv";

/// Header row written at the top of a new index file.
pub const INDEX_HEADER: &str = "filename,mtime,name";

/// Extension appended to every sanitised record name.
pub const RECORD_EXTENSION: &str = "json";

/// Placeholder base name used when a record carries no usable name.
pub const PLACEHOLDER_NAME: &str = "patient";

/// Maximum length, in characters, of a sanitised base name.
pub const MAX_BASENAME_CHARS: usize = 180;
