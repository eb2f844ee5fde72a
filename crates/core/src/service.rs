//! End-to-end diagnosis workflow.
//!
//! [`DiagnosisService`] wires the terminology index, encounter assembler, bundle builder and
//! bundle store together for the REST API and the CLI. An [`EncounterRequest`] is the complete
//! doctor input for one consultation; submitting it assembles, builds and stores the document in
//! one call.

use crate::bundle_builder::BundleBuilder;
use crate::config::CoreConfig;
use crate::encounter::{Encounter, EncounterAssembler};
use crate::store::BundleStore;
use crate::terminology::index::TerminologyIndex;
use crate::terminology::loader::{index_from_config, path_error};
use crate::terminology::resolver::TerminologyResolver;
use crate::{CoreError, CoreResult};
use fhir::Bundle;
use namaste_files::FileStore;
use serde::Deserialize;
use std::sync::Arc;

/// One diagnosis as entered by the doctor.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiagnosisRequest {
    pub namaste_code: String,
    /// Clinician-chosen ICD-11 code; when absent the best mapping is used.
    #[serde(default)]
    pub icd_code: Option<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PrescriptionRequest {
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

/// Complete doctor input for one consultation.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EncounterRequest {
    pub patient_ref: String,
    /// Usually supplied by the auth layer rather than the request body.
    #[serde(default)]
    pub practitioner_ref: String,
    pub chief_complaint: String,
    #[serde(default)]
    pub clinical_notes: String,
    pub diagnoses: Vec<DiagnosisRequest>,
    #[serde(default)]
    pub prescriptions: Vec<PrescriptionRequest>,
    /// Id of a stored bundle this encounter amends.
    #[serde(default)]
    pub replaces: Option<String>,
}

impl EncounterRequest {
    /// Parse a request from JSON, naming the offending field (e.g. `diagnoses[0].namasteCode`)
    /// on failure.
    pub fn from_json_str(json_text: &str) -> CoreResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        let request = serde_path_to_error::deserialize(&mut deserializer).map_err(path_error)?;
        deserializer
            .end()
            .map_err(|e| CoreError::validation("<root>", e.to_string()))?;
        Ok(request)
    }
}

/// Outcome of a successful submission.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmittedBundle {
    pub id: String,
    /// NAMASTE codes left without an ICD-11 coding.
    pub incomplete_diagnoses: Vec<String>,
    pub bundle: Bundle,
}

/// Shared entry point for request handlers.
#[derive(Clone, Debug)]
pub struct DiagnosisService {
    cfg: Arc<CoreConfig>,
    resolver: TerminologyResolver,
    assembler: EncounterAssembler,
    store: BundleStore,
}

impl DiagnosisService {
    pub fn new(cfg: Arc<CoreConfig>, index: Arc<TerminologyIndex>, store: BundleStore) -> Self {
        let resolver = TerminologyResolver::new(index);
        let assembler = EncounterAssembler::new(resolver.clone());
        Self {
            cfg,
            resolver,
            assembler,
            store,
        }
    }

    /// Load the configured terminology and open the file-backed store under
    /// `bundle_data_dir`, which must already exist.
    pub fn from_config(cfg: Arc<CoreConfig>) -> CoreResult<Self> {
        let index = index_from_config(&cfg)?;
        let files = FileStore::new(cfg.bundle_data_dir())?;
        Ok(Self::new(cfg, Arc::new(index), BundleStore::new(Arc::new(files))))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn index(&self) -> &Arc<TerminologyIndex> {
        self.resolver.index()
    }

    pub fn resolver(&self) -> &TerminologyResolver {
        &self.resolver
    }

    pub fn assembler(&self) -> &EncounterAssembler {
        &self.assembler
    }

    pub fn store(&self) -> &BundleStore {
        &self.store
    }

    /// Caller limit, or the configured default.
    pub fn search_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or_else(|| self.cfg.search_default_limit())
    }

    /// Assemble the encounter described by `request` without building or storing it.
    ///
    /// Field paths in errors are relative to the request, e.g. `diagnoses[1].namasteCode`.
    pub fn assemble(&self, request: &EncounterRequest) -> CoreResult<Encounter> {
        let mut encounter = Encounter::new(&request.patient_ref, &request.practitioner_ref)?;
        encounter.set_chief_complaint(request.chief_complaint.as_str());
        encounter.set_clinical_notes(request.clinical_notes.as_str());
        encounter.set_replaces(request.replaces.as_deref())?;

        for (i, dx) in request.diagnoses.iter().enumerate() {
            let entry = self
                .assembler
                .add_diagnosis(&mut encounter, &dx.namaste_code, &dx.notes)
                .map_err(|e| scoped(e, &format!("diagnoses[{i}].namasteCode")))?;

            if let Some(icd_code) = dx.icd_code.as_deref().filter(|c| !c.trim().is_empty()) {
                self.assembler
                    .choose_icd(&mut encounter, &entry.id, icd_code)
                    .map_err(|e| scoped(e, &format!("diagnoses[{i}].icdCode")))?;
            }
        }

        for (i, rx) in request.prescriptions.iter().enumerate() {
            self.assembler
                .add_prescription(
                    &mut encounter,
                    &rx.medication,
                    &rx.dosage,
                    &rx.frequency,
                    &rx.duration,
                )
                .map_err(|e| match e {
                    CoreError::Validation { field, message } => CoreError::Validation {
                        field: format!("prescriptions[{i}].{field}"),
                        message,
                    },
                    other => other,
                })?;
        }

        Ok(encounter)
    }

    /// Assemble, build and store the document for `request`.
    pub fn submit_encounter(&self, request: &EncounterRequest) -> CoreResult<SubmittedBundle> {
        let encounter = self.assemble(request)?;
        let snapshot = self.assembler.finalize(&encounter)?;
        let bundle = BundleBuilder::build(&snapshot)?;
        let id = self.store.upload(&bundle)?;

        let incomplete_diagnoses: Vec<String> = snapshot
            .incomplete_diagnoses()
            .map(|d| d.namaste_code.clone())
            .collect();
        if !incomplete_diagnoses.is_empty() {
            tracing::info!(
                bundle_id = %id,
                incomplete = incomplete_diagnoses.len(),
                "bundle stored with incomplete ICD-11 coding"
            );
        }

        Ok(SubmittedBundle {
            id,
            incomplete_diagnoses,
            bundle,
        })
    }
}

/// Re-home a lookup failure onto the request field that caused it.
fn scoped(err: CoreError, field: &str) -> CoreError {
    match err {
        CoreError::NotFound { kind, id } => CoreError::Validation {
            field: field.to_owned(),
            message: format!("{kind} not found: {id}"),
        },
        other => other,
    }
}
