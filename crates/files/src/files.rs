//! Append-only object storage implementation
//!
//! This module provides [`FileStore`], a put-if-absent key-value store on the local filesystem.
//!
//! # Write protocol
//!
//! 1. The key is hashed with SHA-256; the hex digest addresses the object
//! 2. Content is written to a uniquely named file under `.tmp/` and fsynced
//! 3. The temp file is hard-linked to its final path. `link(2)` fails with `EEXIST` if the
//!    target exists, so the link is the single atomic commit point
//! 4. The temp file is removed and the containing directory is fsynced
//!
//! Readers only ever look at final paths, so a crash at any step leaves either nothing or a
//! complete object visible. Stray temp files are harmless.
//!
//! # Sharding
//!
//! Objects are stored at `objects/sha256/<h[0..2]>/<h[2..4]>/<h>` to keep directory fan-out low.

use crate::constants::HASH_ALGORITHM;
use crate::{FilesError, OBJECTS_FOLDER_NAME, TMP_FOLDER_NAME};
use chrono::{DateTime, Utc};
use namaste_types::NonEmptyText;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Metadata for a committed object
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoredObject {
    /// Caller-supplied key
    pub key: NonEmptyText,

    /// Hashing algorithm used to derive the storage path
    pub hash_algorithm: NonEmptyText,

    /// Hexadecimal digest of the key
    pub key_hash: String,

    /// Path relative to the store root
    pub relative_path: String,

    /// Size of the stored content in bytes
    pub size_bytes: u64,

    /// UTC timestamp when the object was committed
    pub stored_at: DateTime<Utc>,
}

/// Durable, append-only key-value store rooted at a directory
///
/// The store holds no in-memory state beyond its root path, so it is cheap to clone and safe to
/// share between threads; all coordination happens through the filesystem.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Canonicalised root directory
    root_directory: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root_directory`
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - The root directory does not exist or is not a directory
    /// - Path canonicalisation fails
    /// - The internal `.tmp/` or `objects/` directories cannot be created
    pub fn new(root_directory: &Path) -> Result<Self, FilesError> {
        if !root_directory.exists() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        fs::create_dir_all(root_directory.join(TMP_FOLDER_NAME))?;
        fs::create_dir_all(root_directory.join(OBJECTS_FOLDER_NAME))?;

        Ok(Self { root_directory })
    }

    /// Stores `content` under `key` unless the key is already taken
    ///
    /// Returns only after the content and its directory entry have been flushed to disk.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - The key is empty ([`FilesError::InvalidKey`])
    /// - An object already exists under the key ([`FilesError::AlreadyExists`])
    /// - Any filesystem operation fails ([`FilesError::Io`])
    pub fn put_if_absent(&self, key: &str, content: &[u8]) -> Result<StoredObject, FilesError> {
        let key = NonEmptyText::new(key)?;
        let key_hash = hash_key(key.as_str());
        let relative_path = compute_relative_path(&key_hash);
        let storage_path = self.root_directory.join(&relative_path);

        // Fast path; the hard link below is still the authoritative check.
        if storage_path.exists() {
            return Err(FilesError::AlreadyExists(key.into_inner()));
        }

        let parent = storage_path.parent().ok_or_else(|| {
            FilesError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("Storage path has no parent: {}", storage_path.display()),
            ))
        })?;
        fs::create_dir_all(parent).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create storage directory {}: {}",
                    parent.display(),
                    e
                ),
            ))
        })?;

        let tmp_path = self
            .root_directory
            .join(TMP_FOLDER_NAME)
            .join(format!("{}-{}", key_hash, uuid::Uuid::new_v4().simple()));

        let write_result = write_synced(&tmp_path, content);
        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(FilesError::Io(e));
        }

        let link_result = fs::hard_link(&tmp_path, &storage_path);
        let _ = fs::remove_file(&tmp_path);
        match link_result {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(FilesError::AlreadyExists(key.into_inner()));
            }
            Err(e) => {
                return Err(FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to commit object to {}: {}", storage_path.display(), e),
                )));
            }
        }

        sync_dir(parent)?;

        Ok(StoredObject {
            key,
            hash_algorithm: NonEmptyText::new(HASH_ALGORITHM)?,
            key_hash,
            relative_path,
            size_bytes: content.len() as u64,
            stored_at: Utc::now(),
        })
    }

    /// Reads the object stored under `key`
    ///
    /// Returns `Ok(None)` when no object exists for the key.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the key is empty or the object cannot be read.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FilesError> {
        let key = NonEmptyText::new(key)?;
        let storage_path = self
            .root_directory
            .join(compute_relative_path(&hash_key(key.as_str())));

        match fs::read(&storage_path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read object from {}: {}", storage_path.display(), e),
            ))),
        }
    }

    /// Returns true if an object is stored under `key`
    pub fn contains(&self, key: &str) -> bool {
        NonEmptyText::new(key)
            .map(|k| {
                self.root_directory
                    .join(compute_relative_path(&hash_key(k.as_str())))
                    .is_file()
            })
            .unwrap_or(false)
    }

    /// Returns the canonicalised root directory
    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }
}

/// Hex SHA-256 digest of a key
fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Relative path `objects/sha256/<shard1>/<shard2>/<hash>` for a hex digest
fn compute_relative_path(hash_hex: &str) -> String {
    let shard1 = &hash_hex[0..2];
    let shard2 = &hash_hex[2..4];
    format!(
        "{}/{}/{}/{}/{}",
        OBJECTS_FOLDER_NAME, HASH_ALGORITHM, shard1, shard2, hash_hex
    )
}

fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), FilesError> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), FilesError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn open_store() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path()).unwrap();
        (temp, store)
    }

    #[test]
    fn test_store_root_not_exists() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("non-existent");

        let store = FileStore::new(&root);

        assert!(matches!(store, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_store_root_not_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("file.txt");
        fs::write(&root, "not a directory").unwrap();

        let store = FileStore::new(&root);

        assert!(matches!(store, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_store_creates_internal_directories() {
        let (temp, _store) = open_store();
        assert!(temp.path().join(TMP_FOLDER_NAME).is_dir());
        assert!(temp.path().join(OBJECTS_FOLDER_NAME).is_dir());
    }

    #[test]
    fn test_put_and_get() {
        let (_temp, store) = open_store();

        let meta = store.put_if_absent("bundle-1", b"{\"a\":1}").unwrap();
        assert_eq!(meta.key.as_str(), "bundle-1");
        assert_eq!(meta.hash_algorithm.as_str(), "sha256");
        assert_eq!(meta.key_hash.len(), 64);
        assert_eq!(meta.size_bytes, 7);

        let bytes = store.get("bundle-1").unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert!(store.contains("bundle-1"));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (_temp, store) = open_store();
        assert_eq!(store.get("nope").unwrap(), None);
        assert!(!store.contains("nope"));
    }

    #[test]
    fn test_put_is_immutable() {
        let (_temp, store) = open_store();

        store.put_if_absent("bundle-1", b"first").unwrap();
        let second = store.put_if_absent("bundle-1", b"second");
        assert!(matches!(second, Err(FilesError::AlreadyExists(k)) if k == "bundle-1"));

        assert_eq!(store.get("bundle-1").unwrap().as_deref(), Some(&b"first"[..]));
    }

    #[test]
    fn test_empty_key_rejected() {
        let (_temp, store) = open_store();
        assert!(matches!(
            store.put_if_absent("  ", b"x"),
            Err(FilesError::InvalidKey(_))
        ));
        assert!(matches!(store.get(""), Err(FilesError::InvalidKey(_))));
    }

    #[test]
    fn test_relative_path_sharding() {
        let hash = hash_key("bundle-1");
        let path = compute_relative_path(&hash);
        assert_eq!(
            path,
            format!("objects/sha256/{}/{}/{}", &hash[0..2], &hash[2..4], hash)
        );
    }

    #[test]
    fn test_key_is_not_used_as_path() {
        let (temp, store) = open_store();
        store.put_if_absent("../escape", b"x").unwrap();
        assert!(!temp.path().parent().unwrap().join("escape").exists());
        assert!(store.contains("../escape"));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (temp, store) = open_store();
        store.put_if_absent("a", b"1").unwrap();
        let _ = store.put_if_absent("a", b"2");
        let leftovers = fs::read_dir(temp.path().join(TMP_FOLDER_NAME)).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_concurrent_same_key_single_winner() {
        let (_temp, store) = open_store();
        let winners = AtomicUsize::new(0);
        let conflicts = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for i in 0..8 {
                let store = &store;
                let winners = &winners;
                let conflicts = &conflicts;
                s.spawn(move || {
                    match store.put_if_absent("contended", format!("writer-{i}").as_bytes()) {
                        Ok(_) => winners.fetch_add(1, Ordering::SeqCst),
                        Err(FilesError::AlreadyExists(_)) => conflicts.fetch_add(1, Ordering::SeqCst),
                        Err(e) => panic!("unexpected error: {e}"),
                    };
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(conflicts.load(Ordering::SeqCst), 7);
        let stored = String::from_utf8(store.get("contended").unwrap().unwrap()).unwrap();
        assert!(stored.starts_with("writer-"));
    }

    #[test]
    fn test_stored_object_serialization() {
        let (_temp, store) = open_store();
        let meta = store.put_if_absent("k", b"v").unwrap();
        let json = serde_json::to_string(&meta).unwrap();
        let back: StoredObject = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }
}
