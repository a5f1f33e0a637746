//! The save operation.
//!
//! Turns an already-parsed JSON payload into a stored record plus an index entry:
//!
//! 1. normalise the payload into a display name and a data document,
//! 2. derive the file base name,
//! 3. write the record file,
//! 4. update the index (best effort).
//!
//! Authorisation and body parsing happen before this, in the API layer.

use crate::index::{IndexEntry, IndexOutcome, IndexService};
use crate::record::{RecordStore, StoredRecord};
use crate::sanitize::sanitize_filename;
use crate::SaveResult;
use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A payload split into the parts that get stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalisedPayload {
    /// Display name taken from the top-level `name` string, if any.
    pub name: Option<String>,
    pub data: Value,
    /// Sanitised file base name, without extension.
    pub base_name: String,
}

impl NormalisedPayload {
    /// Splits a request payload.
    ///
    /// `{"name": .., "data": {..}}` uses the wrapped mapping as data. Anything else, including a
    /// `data` field that is not a mapping, is stored whole as data, so no part of the payload
    /// is dropped. The base name comes from the display name, then `data.name`, then
    /// `"patient"`; empty and non-string names are skipped.
    pub fn from_value(payload: Value) -> Self {
        let name = payload
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let data = match payload {
            Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
                map.remove("data").unwrap_or_default()
            }
            other => other,
        };

        let base_name = sanitize_filename(
            name.as_deref()
                .filter(|n| !n.is_empty())
                .or_else(|| data.get("name").and_then(Value::as_str)),
        );

        Self {
            name,
            data,
            base_name,
        }
    }

    pub fn filename(&self) -> String {
        RecordStore::filename_for(&self.base_name)
    }
}

/// Outcome of a successful save.
#[derive(Debug)]
pub struct SavedRecord {
    pub filename: String,
    /// Absolute path of the record file.
    pub path: PathBuf,
    /// What happened to the index. Never turns the save into a failure.
    pub index: IndexOutcome,
}

/// Saves records and reads the index for one save directory.
#[derive(Debug, Clone)]
pub struct SaveService {
    records: RecordStore,
    index: IndexService,
}

impl SaveService {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        let records = RecordStore::new(save_dir);
        let index = IndexService::new(records.directory());
        Self { records, index }
    }

    pub fn save_dir(&self) -> &Path {
        self.records.directory()
    }

    /// Normalises and stores `payload`, stamping the index with the current time.
    ///
    /// # Errors
    ///
    /// Returns `SaveError` if the record file cannot be written. Index problems are reported in
    /// [`SavedRecord::index`] instead.
    pub fn save_payload(&self, payload: Value) -> SaveResult<SavedRecord> {
        self.save_payload_at(payload, Utc::now().timestamp_millis())
    }

    /// As [`save_payload`](Self::save_payload) with an explicit save time.
    pub fn save_payload_at(&self, payload: Value, saved_at_millis: i64) -> SaveResult<SavedRecord> {
        let normalised = NormalisedPayload::from_value(payload);
        let filename = normalised.filename();

        let record = StoredRecord {
            name: normalised.name,
            data: normalised.data,
        };
        let path = self.records.save(&normalised.base_name, &record)?;

        let index = self
            .index
            .upsert(&filename, saved_at_millis, record.name.as_deref());

        Ok(SavedRecord {
            filename,
            path,
            index,
        })
    }

    /// Lists indexed records, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SaveError::Index` if the index exists but cannot be read.
    pub fn list_patients(&self) -> SaveResult<Vec<IndexEntry>> {
        Ok(self.index.list()?)
    }
}
