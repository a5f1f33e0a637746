//! Companion index of saved records.
//!
//! The index is a small CSV file, `pv_one_patients.csv`, kept next to the record files so that
//! clients can enumerate saved patients without opening every record:
//!
//! ```text
//! filename,mtime,name
//! "Jane Doe.json",1718000000123,"Jane Doe"
//! "patient.json",1717999990000,""
//! ```
//!
//! Rows are newest first and there is at most one row per filename. `mtime` is the save time in
//! milliseconds since the Unix epoch.
//!
//! The index is a convenience; record files are authoritative. [`IndexService::upsert`] therefore
//! never returns an error. It reports what happened through [`IndexOutcome`] and, when the normal
//! rewrite fails, degrades to appending the row at the end of the file.

use crate::constants::{INDEX_FILENAME, INDEX_HEADER};
use crate::IndexError;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const INDEX_FIELDS: usize = 3;

/// One row of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub filename: String,
    /// Save time in milliseconds since the Unix epoch.
    pub mtime: i64,
    pub name: String,
}

/// Result of a best-effort index update.
#[derive(Debug)]
pub enum IndexOutcome {
    /// The index did not exist and was created with the new row.
    Created,
    /// The index was rewritten with the new row first and any older row for the same file
    /// removed.
    Rewritten,
    /// The rewrite failed; the row was appended to the end of the file instead.
    Appended { cause: IndexError },
    /// The index does not contain the row. `fallback` is the append error, or `None` when the
    /// row could not be encoded and no write was attempted.
    Failed {
        cause: IndexError,
        fallback: Option<IndexError>,
    },
}

impl IndexOutcome {
    /// True when the index could not be updated in newest-first order.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Appended { .. } | Self::Failed { .. })
    }
}

/// Maintains the index file for one save directory.
#[derive(Debug, Clone)]
pub struct IndexService {
    path: PathBuf,
}

impl IndexService {
    pub fn new(directory: &Path) -> Self {
        Self {
            path: directory.join(INDEX_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records that `filename` was saved at `saved_at_millis`.
    ///
    /// The new row becomes the first row after the header and replaces any earlier row for the
    /// same filename. Existing rows that cannot be parsed are kept as they are. If the rewrite
    /// fails the row is appended instead, and if even that fails the outcome says so. Nothing
    /// here can fail a save.
    pub fn upsert(&self, filename: &str, saved_at_millis: i64, name: Option<&str>) -> IndexOutcome {
        let row = match encode_row(filename, saved_at_millis, name.unwrap_or_default()) {
            Ok(row) => row,
            Err(cause) => {
                return IndexOutcome::Failed {
                    cause,
                    fallback: None,
                }
            }
        };

        match self.rewrite_with(filename, &row) {
            Ok(outcome) => outcome,
            Err(cause) => match self.append(&row) {
                Ok(()) => IndexOutcome::Appended { cause },
                Err(fallback) => IndexOutcome::Failed {
                    cause,
                    fallback: Some(fallback),
                },
            },
        }
    }

    /// Reads all entries, newest first.
    ///
    /// A missing index is an empty list. Rows that cannot be parsed are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Read` if the index exists but cannot be read.
    pub fn list(&self) -> Result<Vec<IndexEntry>, IndexError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&self.path).map_err(IndexError::Read)?;
        let mut entries = Vec::new();

        for (line_no, line) in non_blank_lines(&text).skip(1) {
            match parse_entry(line, line_no) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("skipping index row in {}: {}", self.path.display(), e),
            }
        }

        Ok(entries)
    }

    fn rewrite_with(&self, filename: &str, row: &str) -> Result<IndexOutcome, IndexError> {
        if !self.path.exists() {
            fs::write(&self.path, format!("{INDEX_HEADER}\n{row}\n")).map_err(IndexError::Write)?;
            return Ok(IndexOutcome::Created);
        }

        let text = fs::read_to_string(&self.path).map_err(IndexError::Read)?;
        let mut lines = non_blank_lines(&text);
        let header = lines.next().map(|(_, l)| l).unwrap_or(INDEX_HEADER);

        let kept: Vec<&str> = lines
            .map(|(_, line)| line)
            .filter(|line| first_field(line).as_deref() != Some(filename))
            .collect();

        let mut out = String::with_capacity(text.len() + row.len() + 2);
        for line in [header, row].into_iter().chain(kept) {
            out.push_str(line);
            out.push('\n');
        }
        fs::write(&self.path, out).map_err(IndexError::Write)?;

        Ok(IndexOutcome::Rewritten)
    }

    fn append(&self, row: &str) -> Result<(), IndexError> {
        let existed = self.path.exists();
        // Avoid gluing the row onto a last line that lacks its terminator.
        let needs_newline = existed
            && fs::read(&self.path)
                .map(|bytes| bytes.last().is_some_and(|&b| b != b'\n'))
                .unwrap_or(false);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(IndexError::Write)?;

        let mut out = String::new();
        if !existed {
            out.push_str(INDEX_HEADER);
            out.push('\n');
        } else if needs_newline {
            out.push('\n');
        }
        out.push_str(row);
        out.push('\n');

        file.write_all(out.as_bytes()).map_err(IndexError::Write)
    }
}

/// Builds `"<filename>",<millis>,"<name>"`.
///
/// Both text fields are always quoted, the timestamp never is. Line breaks in the name become
/// spaces so that each entry stays on one line.
fn encode_row(filename: &str, saved_at_millis: i64, name: &str) -> Result<String, IndexError> {
    let name = name.replace(['\r', '\n'], " ");
    Ok(format!(
        "{},{},{}",
        quote_field(filename)?,
        saved_at_millis,
        quote_field(&name)?
    ))
}

fn quote_field(field: &str) -> Result<String, IndexError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_field(field).map_err(IndexError::Encode)?;
    writer.write_record(None::<&[u8]>).map_err(IndexError::Encode)?;

    let bytes = writer
        .into_inner()
        .map_err(|e| IndexError::Encode(e.into_error().into()))?;
    let quoted = String::from_utf8_lossy(&bytes);
    Ok(quoted.trim_end_matches('\n').to_owned())
}

/// Yields `(1-based line number, line)` for every line with non-whitespace content.
fn non_blank_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| (i + 1, l))
}

/// First CSV field of `line`, used to match rows by filename.
///
/// Tolerates rows with any number of fields.
fn first_field(line: &str) -> Option<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let record = reader.records().next()?.ok()?;
    record.get(0).map(str::to_owned)
}

fn parse_fields(line: &str, line_no: usize) -> Result<Vec<String>, IndexError> {
    let malformed = |reason: String| IndexError::MalformedRow {
        line: line_no,
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.as_bytes());

    let record = reader
        .records()
        .next()
        .ok_or_else(|| malformed("empty row".into()))?
        .map_err(|e| malformed(e.to_string()))?;

    if record.len() != INDEX_FIELDS {
        return Err(malformed(format!(
            "expected {INDEX_FIELDS} fields, found {}",
            record.len()
        )));
    }

    Ok(record.iter().map(str::to_owned).collect())
}

fn parse_entry(line: &str, line_no: usize) -> Result<IndexEntry, IndexError> {
    let [filename, mtime, name]: [String; INDEX_FIELDS] = parse_fields(line, line_no)?
        .try_into()
        .map_err(|_| IndexError::MalformedRow {
            line: line_no,
            reason: "unexpected field count".into(),
        })?;

    let mtime = mtime.trim().parse().map_err(|_| IndexError::MalformedRow {
        line: line_no,
        reason: format!("invalid mtime {mtime:?}"),
    })?;

    Ok(IndexEntry {
        filename,
        mtime,
        name,
    })
}
