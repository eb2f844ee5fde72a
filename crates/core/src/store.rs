//! Append-only Bundle store.
//!
//! [`BundleStore`] validates a Bundle and writes it under its id through a [`DurableStore`].
//! Stored Bundles are never updated or deleted; amendments are new Bundles whose Composition
//! `replaces` the earlier one.

use crate::{CoreError, CoreResult};
use fhir::{Bundle, IntegrityViolation};
use namaste_files::FileStore;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ============================================================================
// Durable backends
// ============================================================================

/// Immutable key → bytes storage.
///
/// `put_if_absent` must be atomic: when several callers race on one key, exactly one succeeds
/// and the rest get [`CoreError::Conflict`]. A value is visible to `get` only once fully written.
pub trait DurableStore: Send + Sync + std::fmt::Debug {
    fn put_if_absent(&self, key: &str, value: &[u8]) -> CoreResult<()>;

    fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>>;

    fn contains(&self, key: &str) -> CoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// In-process backend for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn put_if_absent(&self, key: &str, value: &[u8]) -> CoreResult<()> {
        let mut objects = self.objects.lock().map_err(|_| CoreError::LockPoisoned)?;
        match objects.entry(key.to_owned()) {
            Entry::Occupied(_) => Err(CoreError::Conflict(key.to_owned())),
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                Ok(())
            }
        }
    }

    fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        let objects = self.objects.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(objects.get(key).cloned())
    }

    fn contains(&self, key: &str) -> CoreResult<bool> {
        let objects = self.objects.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(objects.contains_key(key))
    }
}

impl DurableStore for FileStore {
    fn put_if_absent(&self, key: &str, value: &[u8]) -> CoreResult<()> {
        let stored = FileStore::put_if_absent(self, key, value)?;
        tracing::debug!(
            key,
            path = %stored.relative_path,
            size_bytes = stored.size_bytes,
            "object written"
        );
        Ok(())
    }

    fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(FileStore::get(self, key)?)
    }

    fn contains(&self, key: &str) -> CoreResult<bool> {
        Ok(FileStore::contains(self, key))
    }
}

// ============================================================================
// Bundle store
// ============================================================================

/// Validating, append-only store of FHIR Bundles keyed by Bundle id.
#[derive(Clone, Debug)]
pub struct BundleStore {
    backend: Arc<dyn DurableStore>,
}

impl BundleStore {
    pub fn new(backend: Arc<dyn DurableStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Validate and persist `bundle`, returning its id.
    ///
    /// Returns only after the backend has durably written the document.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] for the first integrity violation, or when a Composition
    ///   `replaces` a Bundle that is not stored
    /// - [`CoreError::Conflict`] if a Bundle with this id already exists
    pub fn upload(&self, bundle: &Bundle) -> CoreResult<String> {
        if let Err(violation) = bundle.check_integrity() {
            tracing::warn!(
                bundle_id = %bundle.id,
                field = %violation.field(),
                "rejected bundle: {violation}"
            );
            return Err(rejected(violation));
        }

        self.check_replaced_bundles(bundle)?;

        let json = bundle.render()?;
        match self.backend.put_if_absent(&bundle.id, json.as_bytes()) {
            Ok(()) => {}
            Err(CoreError::Conflict(id)) => {
                tracing::warn!(bundle_id = %id, "rejected duplicate bundle upload");
                return Err(CoreError::Conflict(id));
            }
            Err(e) => {
                tracing::error!(bundle_id = %bundle.id, "failed to store bundle: {e}");
                return Err(e);
            }
        }

        tracing::info!(
            bundle_id = %bundle.id,
            entries = bundle.entry.len(),
            "bundle stored"
        );
        Ok(bundle.id.clone())
    }

    /// Parse an uploaded JSON document and store it.
    ///
    /// # Errors
    ///
    /// As [`BundleStore::upload`], plus [`CoreError::Validation`] carrying the JSON path when the
    /// document does not match the Bundle schema.
    pub fn upload_json(&self, json_text: &str) -> CoreResult<String> {
        let bundle = match Bundle::parse(json_text) {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!("rejected bundle upload: {e}");
                return Err(e.into());
            }
        };
        self.upload(&bundle)
    }

    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no Bundle is stored under `id`.
    pub fn get(&self, id: &str) -> CoreResult<Bundle> {
        let json = self.get_json(id)?;
        Bundle::parse(&json).map_err(|e| CoreError::CorruptRecord {
            id: id.to_owned(),
            message: e.to_string(),
        })
    }

    /// The stored document exactly as written.
    pub fn get_json(&self, id: &str) -> CoreResult<String> {
        if !fhir::is_valid_bundle_id(id) {
            return Err(CoreError::not_found("bundle", id));
        }
        let bytes = self
            .backend
            .get(id)?
            .ok_or_else(|| CoreError::not_found("bundle", id))?;
        String::from_utf8(bytes).map_err(|e| CoreError::CorruptRecord {
            id: id.to_owned(),
            message: e.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> CoreResult<bool> {
        if !fhir::is_valid_bundle_id(id) {
            return Ok(false);
        }
        self.backend.contains(id)
    }

    fn check_replaced_bundles(&self, bundle: &Bundle) -> CoreResult<()> {
        let Some((index, composition)) = bundle
            .entry
            .iter()
            .enumerate()
            .find_map(|(i, e)| e.resource.as_composition().map(|c| (i, c)))
        else {
            return Ok(());
        };

        for (j, relation) in composition.relates_to.iter().enumerate() {
            if relation.code != "replaces" {
                continue;
            }
            let field = format!("entry[{index}].resource.relatesTo[{j}].targetIdentifier.value");
            let target = relation.target_identifier.value.as_str();
            if target == bundle.id {
                return Err(CoreError::validation(field, "a bundle cannot replace itself"));
            }
            if !self.contains(target)? {
                tracing::warn!(bundle_id = %bundle.id, replaces = target, "replaced bundle is not stored");
                return Err(CoreError::validation(
                    field,
                    format!("replaced bundle {target:?} is not stored"),
                ));
            }
        }
        Ok(())
    }
}

fn rejected(violation: IntegrityViolation) -> CoreError {
    CoreError::Validation {
        field: violation.field(),
        message: violation.to_string(),
    }
}
