//! Request and response bodies for the save API.
//!
//! Every body carries an `ok` flag so clients can branch on it without looking at the status
//! code.

use pvsave_core::{IndexEntry, SavedRecord};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Documented shape of a save request.
///
/// Any JSON document is accepted; without a `data` mapping the whole document is stored as
/// data.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SavePatientReq {
    /// Patient display name, also used to derive the filename.
    pub name: Option<String>,
    /// Clinical payload.
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SavePatientRes {
    pub ok: bool,
    /// Record filename, e.g. `Jane Doe.json`.
    pub filename: String,
    /// Absolute path of the record file on the server.
    pub path: String,
}

impl From<&SavedRecord> for SavePatientRes {
    fn from(saved: &SavedRecord) -> Self {
        Self {
            ok: true,
            filename: saved.filename.clone(),
            path: saved.path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub ok: bool,
    pub error: String,
}

impl ErrorRes {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PatientEntry {
    pub filename: String,
    /// Save time in milliseconds since the Unix epoch.
    pub mtime: i64,
    pub name: String,
}

impl From<IndexEntry> for PatientEntry {
    fn from(entry: IndexEntry) -> Self {
        Self {
            filename: entry.filename,
            mtime: entry.mtime,
            name: entry.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ListPatientsRes {
    pub ok: bool,
    /// Newest first.
    pub patients: Vec<PatientEntry>,
}
