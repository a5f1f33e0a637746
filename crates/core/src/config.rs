//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads process-wide environment variables,
//! which keeps behaviour consistent across multi-threaded runtimes and test harnesses.

use crate::constants::{DEFAULT_MAX_BODY_BYTES, DEFAULT_PORT, DEFAULT_SAVE_DIR};
use crate::{SaveError, SaveResult};
use std::path::{Path, PathBuf};

/// Save service configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveConfig {
    save_dir: PathBuf,
    port: u16,
    token: Option<String>,
    max_body_bytes: usize,
}

impl SaveConfig {
    /// Create a new `SaveConfig`.
    ///
    /// An empty or whitespace-only `token` disables authorisation, matching an unset variable.
    pub fn new(save_dir: PathBuf, port: u16, token: Option<String>) -> SaveResult<Self> {
        if save_dir.as_os_str().is_empty() {
            return Err(SaveError::InvalidInput("save_dir cannot be empty".into()));
        }

        Ok(Self {
            save_dir,
            port,
            token: token.filter(|t| !t.trim().is_empty()),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Override the request body limit.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Build a configuration from raw environment values.
    ///
    /// Missing or blank values fall back to the defaults in [`crate::constants`].
    ///
    /// # Errors
    ///
    /// Returns `SaveError::InvalidInput` if the port or body limit cannot be parsed.
    pub fn from_env_values(
        save_dir: Option<String>,
        port: Option<String>,
        token: Option<String>,
        max_body_bytes: Option<String>,
    ) -> SaveResult<Self> {
        let save_dir = non_blank(save_dir).unwrap_or_else(|| DEFAULT_SAVE_DIR.into());

        let port = non_blank(port)
            .map(|p| {
                p.parse::<u16>()
                    .map_err(|e| SaveError::InvalidInput(format!("invalid PV_SAVE_PORT {p:?}: {e}")))
            })
            .transpose()?
            .unwrap_or(DEFAULT_PORT);

        let max_body_bytes = non_blank(max_body_bytes)
            .map(|b| {
                b.parse::<usize>().map_err(|e| {
                    SaveError::InvalidInput(format!("invalid PV_SAVE_MAX_BODY_BYTES {b:?}: {e}"))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Ok(Self::new(PathBuf::from(save_dir), port, token)?.with_max_body_bytes(max_body_bytes))
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
