//! FHIR wire/boundary support for diagnosis documents.
//!
//! This crate provides **wire models** and **format/translation helpers** for the Bundles the
//! diagnosis workflow produces and accepts:
//! - a strict Bundle model with four resource types (Patient, Condition, MedicationRequest,
//!   Composition)
//! - JSON parsing with field-path error reporting
//! - the Bundle integrity rules (no dangling references, unique `fullUrl`s)
//!
//! This crate focuses on:
//! - FHIR R4 semantic alignment for the subset of elements the workflow uses
//! - serialisation/deserialisation
//! - structural validation at the boundary
//!
//! It holds no terminology knowledge and performs no I/O.

pub mod bundle;
pub mod constants;
pub mod datatypes;
pub mod integrity;
pub mod resources;

pub use bundle::{Bundle, BundleEntry, BundleType};
pub use datatypes::{
    Annotation, CodeableConcept, Coding, Dosage, Identifier, Meta, Narrative, Reference, Timing,
};
pub use integrity::{is_valid_bundle_id, IntegrityViolation};
pub use resources::{
    CompositionRelatesTo, CompositionResource, CompositionSection, ConditionResource,
    MedicationRequestResource, PatientResource, Resource, ResourceType,
};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("schema mismatch at {path}: {message}")]
    Schema { path: String, message: String },

    #[error("translation error: {0}")]
    Translation(String),
}
