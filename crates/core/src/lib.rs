//! # PV Save Core
//!
//! Core business logic for the PV-One save service.
//!
//! This crate contains pure data operations and file management:
//! - Filename sanitising for patient display names
//! - Record storage as pretty-printed JSON under the configured save directory
//! - Maintenance of the `pv_one_patients.csv` companion index
//! - Payload normalisation and the end-to-end save operation
//!
//! **No API concerns**: Authentication, HTTP servers, or wire types belong in `api-rest` or
//! `api-shared`.

pub mod config;
pub mod constants;
pub mod error;
pub mod index;
pub mod record;
pub mod sanitize;
pub mod save;

pub use config::SaveConfig;
pub use constants::{DEFAULT_PORT, DEFAULT_SAVE_DIR, INDEX_FILENAME};
pub use error::{IndexError, SaveError, SaveResult};
pub use index::{IndexEntry, IndexOutcome, IndexService};
pub use record::{RecordStore, StoredRecord};
pub use sanitize::sanitize_filename;
pub use save::{NormalisedPayload, SaveService, SavedRecord};
