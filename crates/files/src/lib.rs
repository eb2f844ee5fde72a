//! NAMASTE File Storage
//!
//! This crate provides the durable key-value backend behind the bundle store.
//!
//! ## Design Principles
//!
//! - Objects are immutable once written; a second write to the same key is rejected
//! - A write is either fully visible or not visible at all
//! - Exactly one of several concurrent writers of the same key succeeds
//! - Keys never become path components directly; they are hashed first
//!
//! ## Storage Layout
//!
//! ```text
//! <root>/
//! ├── .tmp/                 # in-flight writes, never read
//! └── objects/
//!     └── sha256/
//!         └── ab/
//!             └── cd/
//!                 └── abcd3f9e…   # SHA-256 of the key
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use namaste_files::FileStore;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileStore::new(Path::new("bundle_data"))?;
//! store.put_if_absent("0f8fad5bd9cb469fa16570867728950e", br#"{"resourceType":"Bundle"}"#)?;
//! let bytes = store.get("0f8fad5bd9cb469fa16570867728950e")?;
//! assert!(bytes.is_some());
//! # Ok(())
//! # }
//! ```

mod constants;
mod files;

pub use constants::{OBJECTS_FOLDER_NAME, TMP_FOLDER_NAME};
pub use files::{FileStore, StoredObject};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Key was empty
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] namaste_types::TextError),

    /// An object is already stored under this key (immutability violation)
    #[error("Object with key {0} already exists in storage")]
    AlreadyExists(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
