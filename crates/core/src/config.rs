//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handlers never read environment variables themselves.

use crate::constants::{DEFAULT_BUNDLE_DATA_DIR, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    bundle_data_dir: PathBuf,
    terminology_file: Option<PathBuf>,
    search_default_limit: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `search_default_limit` is zero or above
    /// [`MAX_SEARCH_LIMIT`].
    pub fn new(
        bundle_data_dir: PathBuf,
        terminology_file: Option<PathBuf>,
        search_default_limit: usize,
    ) -> CoreResult<Self> {
        if search_default_limit == 0 || search_default_limit > MAX_SEARCH_LIMIT {
            return Err(CoreError::validation(
                "SEARCH_DEFAULT_LIMIT",
                format!("must be between 1 and {MAX_SEARCH_LIMIT}"),
            ));
        }

        Ok(Self {
            bundle_data_dir,
            terminology_file,
            search_default_limit,
        })
    }

    pub fn bundle_data_dir(&self) -> &Path {
        &self.bundle_data_dir
    }

    /// External terminology table; `None` means the embedded seed table.
    pub fn terminology_file(&self) -> Option<&Path> {
        self.terminology_file.as_deref()
    }

    pub fn search_default_limit(&self) -> usize {
        self.search_default_limit
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            bundle_data_dir: PathBuf::from(DEFAULT_BUNDLE_DATA_DIR),
            terminology_file: None,
            search_default_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// Resolve the bundle data directory from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_BUNDLE_DATA_DIR`].
pub fn bundle_data_dir_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BUNDLE_DATA_DIR))
}

/// Resolve the terminology file from an optional string value.
///
/// An empty value is treated as unset so `.env` files can blank it out.
pub fn terminology_file_from_env_value(value: Option<String>) -> Option<PathBuf> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Parse the default search limit from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_SEARCH_LIMIT`].
pub fn search_default_limit_from_env_value(value: Option<String>) -> CoreResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value
        .map(|v| {
            v.parse::<usize>().map_err(|e| {
                CoreError::validation("SEARCH_DEFAULT_LIMIT", format!("{v:?} is not a number: {e}"))
            })
        })
        .transpose()?;

    Ok(parsed.unwrap_or(DEFAULT_SEARCH_LIMIT))
}
