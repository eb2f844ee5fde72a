//! # NAMASTE Core
//!
//! Core business logic for NAMASTE → ICD-11 dual coding and FHIR document assembly.
//!
//! This crate contains:
//! - the terminology index, resolver and table loader
//! - encounter assembly (coded diagnoses, prescriptions, finalisation)
//! - the FHIR document Bundle builder
//! - the append-only Bundle store over a durable key-value backend
//!
//! **No API concerns**: authentication, HTTP servers, or service interfaces belong in `api-rest`
//! or `api-shared`.

pub mod bundle_builder;
pub mod config;
pub mod constants;
pub mod encounter;
pub mod error;
pub mod service;
pub mod store;
pub mod terminology;

pub use bundle_builder::BundleBuilder;
pub use config::CoreConfig;
pub use encounter::{
    DiagnosisEntry, Encounter, EncounterAssembler, EncounterSnapshot, IcdCoding,
    PrescriptionEntry,
};
pub use error::{CoreError, CoreResult};
pub use service::{
    DiagnosisRequest, DiagnosisService, EncounterRequest, PrescriptionRequest, SubmittedBundle,
};
pub use store::{BundleStore, DurableStore, MemoryStore};
pub use terminology::index::TerminologyIndex;
pub use terminology::loader::{index_from_config, TerminologyData};
pub use terminology::resolver::{Resolution, ResolvedMapping, TerminologyResolver};
pub use terminology::{
    CodeMapping, CodeSystem, IndexStats, MappingType, MatchKind, SearchHit, TerminologyEntry,
};
