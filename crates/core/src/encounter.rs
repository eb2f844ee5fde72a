//! Encounter assembly.
//!
//! An [`Encounter`] is the doctor's working draft for one consultation. The
//! [`EncounterAssembler`] adds coded diagnoses and prescriptions to it, and `finalize` turns it
//! into a read-only [`EncounterSnapshot`] for the bundle builder. Encounters are never stored.

use crate::constants::{DIAGNOSIS_ID_PREFIX, PRESCRIPTION_ID_PREFIX};
use crate::terminology::index::system_kind;
use crate::terminology::resolver::{Resolution, TerminologyResolver};
use crate::terminology::{CodeSystem, MappingType};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use namaste_types::{Confidence, NonEmptyText};
use serde::Serialize;
use uuid::Uuid;

/// The ICD-11 half of a dual-coded diagnosis.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IcdCoding {
    pub code: String,
    pub display: String,
    /// Present when the code came from (or matches) a cross-walk row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_type: Option<MappingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisEntry {
    pub id: String,
    pub namaste_code: String,
    pub namaste_name: String,
    pub icd: Option<IcdCoding>,
    pub notes: String,
}

impl DiagnosisEntry {
    pub fn icd_code(&self) -> Option<&str> {
        self.icd.as_ref().map(|icd| icd.code.as_str())
    }

    /// A diagnosis with no ICD-11 code must be flagged in the generated document.
    pub fn is_incomplete(&self) -> bool {
        self.icd.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionEntry {
    pub id: String,
    pub medication: NonEmptyText,
    pub dosage: NonEmptyText,
    pub frequency: NonEmptyText,
    pub duration: NonEmptyText,
}

/// A consultation being documented.
#[derive(Clone, Debug, PartialEq)]
pub struct Encounter {
    encounter_id: Uuid,
    patient_ref: NonEmptyText,
    practitioner_ref: NonEmptyText,
    chief_complaint: String,
    clinical_notes: String,
    diagnoses: Vec<DiagnosisEntry>,
    prescriptions: Vec<PrescriptionEntry>,
    created_at: DateTime<Utc>,
    replaces: Option<String>,
    issued_diagnoses: u32,
    issued_prescriptions: u32,
}

impl Encounter {
    /// Start an encounter now, with a fresh id.
    pub fn new(patient_ref: &str, practitioner_ref: &str) -> CoreResult<Self> {
        Self::with_identity(Uuid::new_v4(), patient_ref, practitioner_ref, Utc::now())
    }

    /// Start an encounter with a caller-chosen id and creation time.
    pub fn with_identity(
        encounter_id: Uuid,
        patient_ref: &str,
        practitioner_ref: &str,
        created_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let patient_ref = NonEmptyText::new(patient_ref)
            .map_err(|e| CoreError::validation("patientRef", e.to_string()))?;
        let practitioner_ref = NonEmptyText::new(practitioner_ref)
            .map_err(|e| CoreError::validation("practitionerRef", e.to_string()))?;

        Ok(Self {
            encounter_id,
            patient_ref,
            practitioner_ref,
            chief_complaint: String::new(),
            clinical_notes: String::new(),
            diagnoses: Vec::new(),
            prescriptions: Vec::new(),
            created_at,
            replaces: None,
            issued_diagnoses: 0,
            issued_prescriptions: 0,
        })
    }

    pub fn set_chief_complaint(&mut self, text: impl Into<String>) {
        self.chief_complaint = text.into().trim().to_string();
    }

    pub fn set_clinical_notes(&mut self, text: impl Into<String>) {
        self.clinical_notes = text.into().trim().to_string();
    }

    /// Mark this encounter as an amendment of an already stored bundle.
    pub fn set_replaces(&mut self, bundle_id: Option<&str>) -> CoreResult<()> {
        self.replaces = match bundle_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) if !fhir::is_valid_bundle_id(id) => {
                return Err(CoreError::validation(
                    "replaces",
                    format!("{id:?} is not a valid bundle id"),
                ));
            }
            Some(id) => Some(id.to_string()),
            None => None,
        };
        Ok(())
    }

    pub fn encounter_id(&self) -> Uuid {
        self.encounter_id
    }

    pub fn patient_ref(&self) -> &str {
        self.patient_ref.as_str()
    }

    pub fn practitioner_ref(&self) -> &str {
        self.practitioner_ref.as_str()
    }

    pub fn chief_complaint(&self) -> &str {
        &self.chief_complaint
    }

    pub fn clinical_notes(&self) -> &str {
        &self.clinical_notes
    }

    pub fn diagnoses(&self) -> &[DiagnosisEntry] {
        &self.diagnoses
    }

    pub fn prescriptions(&self) -> &[PrescriptionEntry] {
        &self.prescriptions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn replaces(&self) -> Option<&str> {
        self.replaces.as_deref()
    }

    pub fn incomplete_diagnoses(&self) -> impl Iterator<Item = &DiagnosisEntry> {
        self.diagnoses.iter().filter(|d| d.is_incomplete())
    }

    pub fn remove_diagnosis(&mut self, diagnosis_id: &str) -> CoreResult<DiagnosisEntry> {
        let pos = self
            .diagnoses
            .iter()
            .position(|d| d.id == diagnosis_id)
            .ok_or_else(|| CoreError::not_found("diagnosis", diagnosis_id))?;
        Ok(self.diagnoses.remove(pos))
    }

    pub fn remove_prescription(&mut self, prescription_id: &str) -> CoreResult<PrescriptionEntry> {
        let pos = self
            .prescriptions
            .iter()
            .position(|p| p.id == prescription_id)
            .ok_or_else(|| CoreError::not_found("prescription", prescription_id))?;
        Ok(self.prescriptions.remove(pos))
    }

    fn diagnosis_mut(&mut self, diagnosis_id: &str) -> CoreResult<&mut DiagnosisEntry> {
        self.diagnoses
            .iter_mut()
            .find(|d| d.id == diagnosis_id)
            .ok_or_else(|| CoreError::not_found("diagnosis", diagnosis_id))
    }

    // Ids are never reused, even after removal.
    fn next_diagnosis_id(&mut self) -> String {
        self.issued_diagnoses += 1;
        format!("{DIAGNOSIS_ID_PREFIX}-{}", self.issued_diagnoses)
    }

    fn next_prescription_id(&mut self) -> String {
        self.issued_prescriptions += 1;
        format!("{PRESCRIPTION_ID_PREFIX}-{}", self.issued_prescriptions)
    }
}

/// A finalized encounter. Derefs to [`Encounter`] for reading; cannot be modified.
#[derive(Clone, Debug, PartialEq)]
pub struct EncounterSnapshot(Encounter);

impl std::ops::Deref for EncounterSnapshot {
    type Target = Encounter;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Builds up encounters against the terminology index.
#[derive(Clone, Debug)]
pub struct EncounterAssembler {
    resolver: TerminologyResolver,
}

impl EncounterAssembler {
    pub fn new(resolver: TerminologyResolver) -> Self {
        Self { resolver }
    }

    /// Add a diagnosis by NAMASTE code, dual-coding it with the best ICD-11 mapping if any.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if `namaste_code` is not in the index.
    pub fn add_diagnosis(
        &self,
        encounter: &mut Encounter,
        namaste_code: &str,
        notes: &str,
    ) -> CoreResult<DiagnosisEntry> {
        // Lookup and resolution must read the same table.
        let snapshot = self.resolver.index().snapshot();
        let namaste = snapshot
            .lookup(CodeSystem::Namaste, namaste_code)
            .ok_or_else(|| {
                CoreError::not_found(system_kind(CodeSystem::Namaste), namaste_code.trim())
            })?;

        let icd = match TerminologyResolver::resolve_in(&snapshot, &namaste.code) {
            Resolution::Mapped(m) => Some(IcdCoding {
                code: m.icd_code,
                display: m.icd_display,
                mapping_type: Some(m.mapping_type),
                confidence: Some(m.confidence),
            }),
            Resolution::Unmapped => {
                tracing::info!(
                    namaste_code = %namaste.code,
                    "no ICD-11 mapping; diagnosis will be flagged incomplete"
                );
                None
            }
        };

        let entry = DiagnosisEntry {
            id: encounter.next_diagnosis_id(),
            namaste_code: namaste.code.clone(),
            namaste_name: namaste.display_name.clone(),
            icd,
            notes: notes.trim().to_string(),
        };
        encounter.diagnoses.push(entry.clone());
        Ok(entry)
    }

    /// Replace the ICD-11 coding of a diagnosis with the clinician's choice.
    ///
    /// Mapping type and confidence are kept when the chosen code is one of the mapped candidates.
    pub fn choose_icd(
        &self,
        encounter: &mut Encounter,
        diagnosis_id: &str,
        icd_code: &str,
    ) -> CoreResult<DiagnosisEntry> {
        let snapshot = self.resolver.index().snapshot();
        let icd = snapshot
            .lookup(CodeSystem::Icd11, icd_code)
            .ok_or_else(|| CoreError::not_found(system_kind(CodeSystem::Icd11), icd_code.trim()))?;

        let diagnosis = encounter.diagnosis_mut(diagnosis_id)?;
        let mapping = snapshot
            .mappings_for(&diagnosis.namaste_code)
            .iter()
            .find(|m| m.icd_code == icd.code);

        diagnosis.icd = Some(IcdCoding {
            code: icd.code.clone(),
            display: icd.display_name.clone(),
            mapping_type: mapping.map(|m| m.mapping_type),
            confidence: mapping.map(|m| m.confidence),
        });
        Ok(diagnosis.clone())
    }

    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the first empty field.
    pub fn add_prescription(
        &self,
        encounter: &mut Encounter,
        medication: &str,
        dosage: &str,
        frequency: &str,
        duration: &str,
    ) -> CoreResult<PrescriptionEntry> {
        let field = |name: &str, value: &str| {
            NonEmptyText::new(value).map_err(|e| CoreError::validation(name, e.to_string()))
        };
        let medication = field("medication", medication)?;
        let dosage = field("dosage", dosage)?;
        let frequency = field("frequency", frequency)?;
        let duration = field("duration", duration)?;

        let entry = PrescriptionEntry {
            id: encounter.next_prescription_id(),
            medication,
            dosage,
            frequency,
            duration,
        };
        encounter.prescriptions.push(entry.clone());
        Ok(entry)
    }

    /// Freeze the encounter for bundle building.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the chief complaint is empty or there are no
    /// diagnoses.
    pub fn finalize(&self, encounter: &Encounter) -> CoreResult<EncounterSnapshot> {
        if encounter.chief_complaint.is_empty() {
            return Err(CoreError::validation(
                "chiefComplaint",
                "chief complaint cannot be empty",
            ));
        }
        if encounter.diagnoses.is_empty() {
            return Err(CoreError::validation(
                "diagnoses",
                "at least one diagnosis is required",
            ));
        }
        Ok(EncounterSnapshot(encounter.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::index::TerminologyIndex;
    use crate::terminology::loader::TerminologyData;
    use std::sync::Arc;

    fn assembler() -> EncounterAssembler {
        let data = TerminologyData::seed().expect("seed");
        let index = TerminologyIndex::with_data(data.entries, data.mappings).expect("index");
        EncounterAssembler::new(TerminologyResolver::new(Arc::new(index)))
    }

    fn encounter() -> Encounter {
        Encounter::new("ABHA-12-3456-7890-1234", "HPR-771").expect("valid refs")
    }

    #[test]
    fn new_encounter_requires_refs() {
        let err = Encounter::new("  ", "HPR-771").expect_err("blank patient");
        assert!(matches!(err, CoreError::Validation { field, .. } if field == "patientRef"));
        let err = Encounter::new("ABHA-1", "").expect_err("blank practitioner");
        assert!(matches!(err, CoreError::Validation { field, .. } if field == "practitionerRef"));
    }

    #[test]
    fn mapped_diagnosis_is_dual_coded() {
        let assembler = assembler();
        let mut enc = encounter();
        let dx = assembler
            .add_diagnosis(&mut enc, "AY001", " worse in the evening ")
            .expect("known code");

        assert_eq!(dx.id, "dx-1");
        assert_eq!(dx.namaste_name, "Vata imbalance");
        assert_eq!(dx.icd_code(), Some("XM9"));
        assert_eq!(dx.notes, "worse in the evening");
        let icd = dx.icd.as_ref().expect("icd");
        assert_eq!(icd.mapping_type, Some(MappingType::Exact));
        assert!(!dx.is_incomplete());
        assert_eq!(enc.diagnoses().len(), 1);
    }

    #[test]
    fn unmapped_diagnosis_is_kept_without_icd() {
        let assembler = assembler();
        let mut enc = encounter();
        let dx = assembler.add_diagnosis(&mut enc, "AY999", "").expect("known code");
        assert_eq!(dx.icd_code(), None);
        assert!(dx.is_incomplete());
        assert_eq!(enc.incomplete_diagnoses().count(), 1);
    }

    #[test]
    fn unknown_namaste_code_is_not_found() {
        let assembler = assembler();
        let mut enc = encounter();
        let err = assembler
            .add_diagnosis(&mut enc, "ZZ404", "")
            .expect_err("unknown code");
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert!(enc.diagnoses().is_empty());
    }

    #[test]
    fn choose_icd_overrides_and_keeps_mapping_metadata() {
        let assembler = assembler();
        let mut enc = encounter();
        let dx = assembler.add_diagnosis(&mut enc, "AY002", "").expect("known");
        assert_eq!(dx.icd_code(), Some("5A11"));

        let changed = assembler.choose_icd(&mut enc, &dx.id, "5A10").expect("override");
        let icd = changed.icd.as_ref().expect("icd");
        assert_eq!(icd.code, "5A10");
        assert_eq!(icd.mapping_type, Some(MappingType::Partial));

        // A code with no cross-walk row is still allowed, without mapping metadata.
        let manual = assembler.choose_icd(&mut enc, &dx.id, "BA00").expect("manual");
        assert_eq!(manual.icd.as_ref().and_then(|i| i.mapping_type), None);
        assert_eq!(enc.diagnoses()[0].icd_code(), Some("BA00"));

        // Clinician can also complete an unmapped diagnosis.
        let open = assembler.add_diagnosis(&mut enc, "AY999", "").expect("known");
        assembler.choose_icd(&mut enc, &open.id, "XM9").expect("complete");
        assert_eq!(enc.incomplete_diagnoses().count(), 0);
    }

    #[test]
    fn choose_icd_reports_missing_targets() {
        let assembler = assembler();
        let mut enc = encounter();
        let dx = assembler.add_diagnosis(&mut enc, "AY001", "").expect("known");
        assert!(matches!(
            assembler.choose_icd(&mut enc, &dx.id, "NOPE"),
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            assembler.choose_icd(&mut enc, "dx-9", "XM9"),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn prescription_fields_must_be_present() {
        let assembler = assembler();
        let mut enc = encounter();
        let err = assembler
            .add_prescription(&mut enc, "Ashwagandha churna", "3 g", " ", "14 days")
            .expect_err("blank frequency");
        assert!(matches!(err, CoreError::Validation { field, .. } if field == "frequency"));
        assert!(enc.prescriptions().is_empty());

        let rx = assembler
            .add_prescription(&mut enc, "Ashwagandha churna", "3 g", "twice daily", "14 days")
            .expect("complete prescription");
        assert_eq!(rx.id, "rx-1");
        assert_eq!(rx.medication.as_str(), "Ashwagandha churna");
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let assembler = assembler();
        let mut enc = encounter();
        assembler.add_diagnosis(&mut enc, "AY001", "").expect("dx-1");
        let removed = enc.remove_diagnosis("dx-1").expect("present");
        assert_eq!(removed.namaste_code, "AY001");
        let again = assembler.add_diagnosis(&mut enc, "AY001", "").expect("dx-2");
        assert_eq!(again.id, "dx-2");

        assert!(matches!(
            enc.remove_prescription("rx-1"),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn finalize_requires_complaint_and_diagnosis() {
        let assembler = assembler();
        let mut enc = encounter();

        let err = assembler.finalize(&enc).expect_err("no complaint");
        assert!(matches!(err, CoreError::Validation { field, .. } if field == "chiefComplaint"));

        enc.set_chief_complaint("Joint pain for two weeks");
        let err = assembler.finalize(&enc).expect_err("no diagnoses");
        assert!(matches!(err, CoreError::Validation { field, .. } if field == "diagnoses"));

        assembler.add_diagnosis(&mut enc, "AY001", "").expect("dx");
        let snapshot = assembler.finalize(&enc).expect("complete");
        assert_eq!(snapshot.chief_complaint(), "Joint pain for two weeks");
        assert_eq!(snapshot.encounter_id(), enc.encounter_id());

        // Later edits do not leak into the snapshot.
        enc.set_chief_complaint("changed");
        assert_eq!(snapshot.chief_complaint(), "Joint pain for two weeks");
    }

    #[test]
    fn replaces_must_be_a_bundle_id() {
        let mut enc = encounter();
        enc.set_replaces(Some("0f8fad5bd9cb469fa16570867728950e"))
            .expect("valid id");
        assert_eq!(enc.replaces(), Some("0f8fad5bd9cb469fa16570867728950e"));
        assert!(enc.set_replaces(Some("../x")).is_err());
        enc.set_replaces(Some("")).expect("blank clears");
        assert_eq!(enc.replaces(), None);
    }
}
