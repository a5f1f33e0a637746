#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to resolve storage directory: {0}")]
    StorageDirResolve(std::io::Error),
    #[error("failed to write patient file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read patient file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize patient: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize patient: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to read patient index: {0}")]
    Index(#[from] IndexError),
}

pub type SaveResult<T> = std::result::Result<T, SaveError>;

/// Failures inside index maintenance.
///
/// These never reach an HTTP client during a save: they are carried inside
/// [`crate::IndexOutcome`] and logged.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to read index file: {0}")]
    Read(std::io::Error),
    #[error("failed to write index file: {0}")]
    Write(std::io::Error),
    #[error("malformed index row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
    #[error("failed to encode index row: {0}")]
    Encode(csv::Error),
}
