//! Structural integrity rules for Bundles.
//!
//! A Bundle is self-contained: every literal reference inside it must name the `fullUrl` of
//! another entry in the same Bundle. The checker reports the *first* violation found, walking
//! the Bundle header, then entries in order, then each entry's references in path order. Every
//! Composition, Condition and MedicationRequest must name the Patient entry as its `subject`. The
//! same check is run by the builder (where a failure is a defect) and by the store on upload
//! (where a failure is a rejected document).

use crate::bundle::{Bundle, BundleType};
use crate::resources::ResourceType;
use std::collections::HashMap;

/// Maximum length of a Bundle logical id.
pub const MAX_BUNDLE_ID_LEN: usize = 64;

/// The first structural problem found in a Bundle.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityViolation {
    #[error("bundle id {0:?} must be 1-64 characters of [A-Za-z0-9-.]")]
    InvalidBundleId(String),

    #[error("bundle timestamp {0:?} is not an RFC 3339 instant")]
    InvalidTimestamp(String),

    #[error("bundle contains no entries")]
    EmptyBundle,

    #[error("entry[{index}] has an empty fullUrl")]
    EmptyFullUrl { index: usize },

    #[error("entry[{index}] repeats fullUrl {full_url:?}")]
    DuplicateFullUrl { index: usize, full_url: String },

    #[error("document bundle must start with a Composition, found {found}")]
    DocumentWithoutComposition { found: String },

    #[error("entry[{index}].resource.{path} carries neither a reference nor an identifier")]
    EmptyReference { index: usize, path: String },

    #[error("entry[{index}].resource.{path} references {reference:?}, which is not a fullUrl in this bundle")]
    DanglingReference {
        index: usize,
        path: String,
        reference: String,
    },

    #[error("entry[{index}].resource.subject must be a literal reference to the Patient entry")]
    SubjectNotLiteral { index: usize },

    #[error("entry[{index}].resource.subject references a {found}, not a Patient")]
    SubjectNotPatient { index: usize, found: String },
}

impl IntegrityViolation {
    /// JSON-style path of the offending field within the Bundle document.
    pub fn field(&self) -> String {
        match self {
            IntegrityViolation::InvalidBundleId(_) => "id".into(),
            IntegrityViolation::InvalidTimestamp(_) => "timestamp".into(),
            IntegrityViolation::EmptyBundle => "entry".into(),
            IntegrityViolation::EmptyFullUrl { index }
            | IntegrityViolation::DuplicateFullUrl { index, .. } => {
                format!("entry[{index}].fullUrl")
            }
            IntegrityViolation::DocumentWithoutComposition { .. } => "entry[0].resource".into(),
            IntegrityViolation::SubjectNotLiteral { index }
            | IntegrityViolation::SubjectNotPatient { index, .. } => {
                format!("entry[{index}].resource.subject")
            }
            IntegrityViolation::EmptyReference { index, path }
            | IntegrityViolation::DanglingReference { index, path, .. } => {
                format!("entry[{index}].resource.{path}")
            }
        }
    }
}

/// Returns true if `id` is a valid FHIR logical id.
pub fn is_valid_bundle_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_BUNDLE_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
}

/// Run every integrity rule against `bundle`, returning the first violation.
pub fn check(bundle: &Bundle) -> Result<(), IntegrityViolation> {
    if !is_valid_bundle_id(&bundle.id) {
        return Err(IntegrityViolation::InvalidBundleId(bundle.id.clone()));
    }

    if chrono::DateTime::parse_from_rfc3339(&bundle.timestamp).is_err() {
        return Err(IntegrityViolation::InvalidTimestamp(
            bundle.timestamp.clone(),
        ));
    }

    if bundle.entry.is_empty() {
        return Err(IntegrityViolation::EmptyBundle);
    }

    let mut full_urls: HashMap<&str, ResourceType> = HashMap::with_capacity(bundle.entry.len());
    for (index, entry) in bundle.entry.iter().enumerate() {
        if entry.full_url.trim().is_empty() {
            return Err(IntegrityViolation::EmptyFullUrl { index });
        }
        if full_urls
            .insert(entry.full_url.as_str(), entry.resource.resource_type())
            .is_some()
        {
            return Err(IntegrityViolation::DuplicateFullUrl {
                index,
                full_url: entry.full_url.clone(),
            });
        }
    }

    if bundle.bundle_type == BundleType::Document {
        let first = bundle.entry[0].resource.resource_type();
        if first != ResourceType::Composition {
            return Err(IntegrityViolation::DocumentWithoutComposition {
                found: first.to_string(),
            });
        }
    }

    for (index, entry) in bundle.entry.iter().enumerate() {
        for (path, reference) in entry.resource.references() {
            let is_subject = path == "subject";
            match (&reference.reference, &reference.identifier) {
                (Some(target), _) => match full_urls.get(target.as_str()) {
                    None => {
                        return Err(IntegrityViolation::DanglingReference {
                            index,
                            path,
                            reference: target.clone(),
                        });
                    }
                    Some(found) if is_subject && *found != ResourceType::Patient => {
                        return Err(IntegrityViolation::SubjectNotPatient {
                            index,
                            found: found.to_string(),
                        });
                    }
                    Some(_) => {}
                },
                (None, Some(_)) if is_subject => {
                    return Err(IntegrityViolation::SubjectNotLiteral { index })
                }
                (None, Some(_)) => {}
                (None, None) => return Err(IntegrityViolation::EmptyReference { index, path }),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_id_syntax() {
        assert!(is_valid_bundle_id("0f8fad5bd9cb469fa16570867728950e"));
        assert!(is_valid_bundle_id("enc-2026.01"));
        assert!(!is_valid_bundle_id(""));
        assert!(!is_valid_bundle_id("../etc/passwd"));
        assert!(!is_valid_bundle_id("has space"));
        assert!(!is_valid_bundle_id(&"a".repeat(65)));
    }

    #[test]
    fn field_paths_point_into_document() {
        let v = IntegrityViolation::DanglingReference {
            index: 2,
            path: "subject".into(),
            reference: "urn:uuid:Patient-9".into(),
        };
        assert_eq!(v.field(), "entry[2].resource.subject");
        assert_eq!(
            IntegrityViolation::DuplicateFullUrl {
                index: 1,
                full_url: "x".into()
            }
            .field(),
            "entry[1].fullUrl"
        );
    }
}
