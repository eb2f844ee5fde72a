//! FHIR Bundle wire model and JSON translation helpers.
//!
//! Responsibilities:
//! - Define the strict Bundle / entry wire model
//! - Parse untrusted JSON into the typed model, reporting the path of the first schema violation
//! - Render a Bundle back to JSON
//! - Expose the integrity check from [`crate::integrity`] as a method
//!
//! Notes:
//! - Unknown keys anywhere in the document are rejected, so a parsed-then-rendered Bundle is
//!   structurally equal to its input.

use crate::integrity::{self, IntegrityViolation};
use crate::resources::{CompositionResource, ConditionResource, Resource, ResourceType};
use crate::FhirError;
use serde::{Deserialize, Serialize};

/// Purpose of a Bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    /// A coherent clinical document headed by a Composition.
    Document,
    /// A loose set of resources.
    Collection,
}

/// A Bundle of interlinked resources.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Bundle {
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    pub id: String,

    #[serde(rename = "type")]
    pub bundle_type: BundleType,

    /// When the Bundle was assembled (RFC 3339).
    pub timestamp: String,

    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

/// One addressable resource in a Bundle.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BundleEntry {
    #[serde(rename = "fullUrl")]
    pub full_url: String,
    pub resource: Resource,
}

impl Bundle {
    /// Creates an empty Bundle of the given type.
    pub fn new(id: impl Into<String>, bundle_type: BundleType, timestamp: impl Into<String>) -> Self {
        Self {
            resource_type: "Bundle".into(),
            id: id.into(),
            bundle_type,
            timestamp: timestamp.into(),
            entry: Vec::new(),
        }
    }

    /// Parse a Bundle from JSON text.
    ///
    /// This uses `serde_path_to_error` to surface the path (e.g. `entry[1].resource.subject`)
    /// of the failing field when the JSON does not match the wire schema.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Schema`] if the JSON is malformed, has unknown keys, wrong types or an
    /// unsupported resource type; [`FhirError::InvalidInput`] if `resourceType` is not `Bundle`.
    pub fn parse(json_text: &str) -> Result<Bundle, FhirError> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);

        let bundle = match serde_path_to_error::deserialize::<_, Bundle>(&mut deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_owned()
                } else {
                    path
                };
                return Err(FhirError::Schema {
                    path,
                    message: source.to_string(),
                });
            }
        };
        deserializer.end().map_err(|e| FhirError::Schema {
            path: "<root>".into(),
            message: e.to_string(),
        })?;

        if bundle.resource_type != "Bundle" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Bundle', got '{}'",
                bundle.resource_type
            )));
        }

        Ok(bundle)
    }

    /// Render the Bundle as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Translation`] if serialisation fails.
    pub fn render(&self) -> Result<String, FhirError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FhirError::Translation(format!("Failed to serialise bundle: {e}")))
    }

    /// Appends an entry.
    pub fn push(&mut self, full_url: impl Into<String>, resource: Resource) {
        self.entry.push(BundleEntry {
            full_url: full_url.into(),
            resource,
        });
    }

    /// Check referential and structural integrity; see [`crate::integrity`].
    pub fn check_integrity(&self) -> Result<(), IntegrityViolation> {
        integrity::check(self)
    }

    /// Returns true if an entry with `full_url` exists.
    pub fn contains_full_url(&self, full_url: &str) -> bool {
        self.entry.iter().any(|e| e.full_url == full_url)
    }

    /// Number of entries of the given resource type.
    pub fn count_of(&self, resource_type: ResourceType) -> usize {
        self.entry
            .iter()
            .filter(|e| e.resource.resource_type() == resource_type)
            .count()
    }

    /// The document's Composition, if any.
    pub fn composition(&self) -> Option<&CompositionResource> {
        self.entry.iter().find_map(|e| e.resource.as_composition())
    }

    /// Conditions paired with their `fullUrl`, in entry order.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &ConditionResource)> {
        self.entry
            .iter()
            .filter_map(|e| e.resource.as_condition().map(|c| (e.full_url.as_str(), c)))
    }
}
