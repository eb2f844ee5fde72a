//! Encounter → FHIR document Bundle.
//!
//! The builder is a pure function of the [`EncounterSnapshot`]: the same snapshot always yields
//! the same Bundle. Entry order is Composition, Patient, Conditions, MedicationRequests, and
//! `fullUrl`s are `urn:uuid:<ResourceType>-<n>` numbered per type from 1.
//!
//! Before returning, the builder runs the Bundle integrity check. A failure there means the
//! builder itself is wrong, so it surfaces as [`CoreError::Integrity`] and is never stored.

use crate::constants::DOCUMENT_TITLE;
use crate::encounter::{DiagnosisEntry, EncounterSnapshot, PrescriptionEntry};
use crate::terminology::CodeSystem;
use crate::{CoreError, CoreResult};
use chrono::SecondsFormat;
use fhir::constants::{
    ABHA_IDENTIFIER_SYSTEM, CHIEF_COMPLAINT_LOINC, CLINICAL_NOTES_LOINC, CONDITION_CATEGORY_SYSTEM,
    CONDITION_CLINICAL_SYSTEM, CONSULT_NOTE_LOINC, FLAG_SYSTEM, INCOMPLETE_CODING_CODE,
    LOINC_SYSTEM, MEDICATIONS_LOINC, PRACTITIONER_IDENTIFIER_SYSTEM, PROBLEM_LIST_LOINC,
    URN_UUID_PREFIX,
};
use fhir::{
    Annotation, Bundle, BundleType, CodeableConcept, Coding, CompositionRelatesTo,
    CompositionResource, CompositionSection, ConditionResource, Dosage, Identifier,
    MedicationRequestResource, Meta, Narrative, PatientResource, Reference, Resource,
    ResourceType, Timing,
};
use std::collections::HashMap;

/// Hands out `urn:uuid:<Type>-<n>` full URLs, numbering each resource type separately.
#[derive(Debug, Default)]
struct FullUrlAllocator {
    counters: HashMap<ResourceType, usize>,
}

impl FullUrlAllocator {
    fn next(&mut self, resource_type: ResourceType) -> String {
        let n = self.counters.entry(resource_type).or_insert(0);
        *n += 1;
        format!("{URN_UUID_PREFIX}{resource_type}-{n}")
    }
}

/// Builds FHIR document Bundles from finalized encounters.
pub struct BundleBuilder;

impl BundleBuilder {
    /// Build the document Bundle for `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Integrity`] if the assembled Bundle fails the integrity check.
    pub fn build(snapshot: &EncounterSnapshot) -> CoreResult<Bundle> {
        let mut urls = FullUrlAllocator::default();
        let composition_url = urls.next(ResourceType::Composition);
        let patient_url = urls.next(ResourceType::Patient);

        let recorded = snapshot
            .created_at()
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        let conditions: Vec<(String, &DiagnosisEntry, ConditionResource)> = snapshot
            .diagnoses()
            .iter()
            .map(|dx| {
                let url = urls.next(ResourceType::Condition);
                (url, dx, condition(dx, &patient_url, &recorded))
            })
            .collect();

        let medications: Vec<(String, MedicationRequestResource)> = snapshot
            .prescriptions()
            .iter()
            .map(|rx| {
                let url = urls.next(ResourceType::MedicationRequest);
                (
                    url,
                    medication_request(rx, &patient_url, snapshot.practitioner_ref(), &recorded),
                )
            })
            .collect();

        let composition = composition(
            snapshot,
            &patient_url,
            &recorded,
            &conditions,
            &medications,
        );

        let bundle_id = snapshot.encounter_id().simple().to_string();
        let mut bundle = Bundle::new(bundle_id, BundleType::Document, recorded.clone());
        bundle.push(composition_url, Resource::Composition(composition));
        bundle.push(patient_url, Resource::Patient(patient(snapshot.patient_ref())));
        for (url, _, condition) in conditions {
            bundle.push(url, Resource::Condition(condition));
        }
        for (url, request) in medications {
            bundle.push(url, Resource::MedicationRequest(request));
        }

        seal(bundle)
    }
}

/// Run the integrity check on a freshly built Bundle.
pub(crate) fn seal(bundle: Bundle) -> CoreResult<Bundle> {
    match bundle.check_integrity() {
        Ok(()) => Ok(bundle),
        Err(violation) => {
            tracing::error!(
                bundle_id = %bundle.id,
                field = %violation.field(),
                "built bundle failed integrity check: {violation}"
            );
            Err(CoreError::Integrity(violation))
        }
    }
}

fn patient(patient_ref: &str) -> PatientResource {
    PatientResource {
        id: None,
        identifier: vec![Identifier {
            system: Some(ABHA_IDENTIFIER_SYSTEM.to_owned()),
            value: patient_ref.to_owned(),
        }],
        active: Some(true),
    }
}

fn incomplete_tag() -> Coding {
    Coding::new(
        FLAG_SYSTEM,
        INCOMPLETE_CODING_CODE,
        Some("ICD-11 coding not resolved"),
    )
}

fn condition(dx: &DiagnosisEntry, patient_url: &str, recorded: &str) -> ConditionResource {
    let mut coding = vec![Coding::new(
        CodeSystem::Namaste.uri(),
        &dx.namaste_code,
        Some(dx.namaste_name.as_str()),
    )];
    if let Some(icd) = &dx.icd {
        coding.push(Coding::new(
            CodeSystem::Icd11.uri(),
            &icd.code,
            Some(icd.display.as_str()),
        ));
    }

    let meta = dx.is_incomplete().then(|| Meta {
        tag: vec![incomplete_tag()],
    });

    let note = if dx.notes.is_empty() {
        Vec::new()
    } else {
        vec![Annotation {
            text: dx.notes.clone(),
        }]
    };

    ConditionResource {
        id: None,
        meta,
        clinical_status: Some(CodeableConcept::coded(Coding::new(
            CONDITION_CLINICAL_SYSTEM,
            "active",
            Some("Active"),
        ))),
        category: vec![CodeableConcept::coded(Coding::new(
            CONDITION_CATEGORY_SYSTEM,
            "encounter-diagnosis",
            Some("Encounter Diagnosis"),
        ))],
        code: CodeableConcept {
            coding,
            text: Some(dx.namaste_name.clone()),
        },
        subject: Reference::literal(patient_url),
        recorded_date: Some(recorded.to_owned()),
        note,
    }
}

fn medication_request(
    rx: &PrescriptionEntry,
    patient_url: &str,
    practitioner_ref: &str,
    recorded: &str,
) -> MedicationRequestResource {
    MedicationRequestResource {
        id: None,
        status: "active".into(),
        intent: "order".into(),
        medication_codeable_concept: CodeableConcept::text(rx.medication.as_str()),
        subject: Reference::literal(patient_url),
        authored_on: Some(recorded.to_owned()),
        requester: Some(Reference::logical(
            PRACTITIONER_IDENTIFIER_SYSTEM,
            practitioner_ref,
        )),
        dosage_instruction: vec![Dosage {
            sequence: Some(1),
            text: Some(format!(
                "{}, {}, for {}",
                rx.dosage, rx.frequency, rx.duration
            )),
            timing: Some(Timing {
                code: Some(CodeableConcept::text(rx.frequency.as_str())),
            }),
            patient_instruction: None,
        }],
    }
}

fn loinc_section(code: &str, title: &str) -> CompositionSection {
    CompositionSection {
        title: Some(title.to_owned()),
        code: Some(CodeableConcept::coded(Coding::new(
            LOINC_SYSTEM,
            code,
            Some(title),
        ))),
        text: None,
        entry: Vec::new(),
    }
}

fn composition(
    snapshot: &EncounterSnapshot,
    patient_url: &str,
    recorded: &str,
    conditions: &[(String, &DiagnosisEntry, ConditionResource)],
    medications: &[(String, MedicationRequestResource)],
) -> CompositionResource {
    let mut sections = Vec::with_capacity(5);

    let mut complaint = loinc_section(CHIEF_COMPLAINT_LOINC, "Chief complaint");
    complaint.text = Some(Narrative::generated(snapshot.chief_complaint()));
    sections.push(complaint);

    if !snapshot.clinical_notes().is_empty() {
        let mut notes = loinc_section(CLINICAL_NOTES_LOINC, "Clinical notes");
        notes.text = Some(Narrative::generated(snapshot.clinical_notes()));
        sections.push(notes);
    }

    let mut problems = loinc_section(PROBLEM_LIST_LOINC, "Diagnoses");
    problems.entry = conditions
        .iter()
        .map(|(url, _, _)| Reference::literal(url.as_str()))
        .collect();
    sections.push(problems);

    if !medications.is_empty() {
        let mut meds = loinc_section(MEDICATIONS_LOINC, "Medications");
        meds.entry = medications
            .iter()
            .map(|(url, _)| Reference::literal(url.as_str()))
            .collect();
        sections.push(meds);
    }

    let incomplete: Vec<Reference> = conditions
        .iter()
        .filter(|(_, dx, _)| dx.is_incomplete())
        .map(|(url, dx, _)| Reference {
            reference: Some(url.clone()),
            display: Some(format!("{} {}", dx.namaste_code, dx.namaste_name)),
            ..Reference::default()
        })
        .collect();
    if !incomplete.is_empty() {
        sections.push(CompositionSection {
            title: Some("Incomplete coding".into()),
            code: Some(CodeableConcept::coded(incomplete_tag())),
            text: Some(Narrative::generated(
                "These diagnoses carry a NAMASTE code only; no ICD-11 mapping was resolved.",
            )),
            entry: incomplete,
        });
    }

    let relates_to = snapshot
        .replaces()
        .map(|replaced| CompositionRelatesTo {
            code: "replaces".into(),
            target_identifier: Identifier {
                system: None,
                value: replaced.to_owned(),
            },
        })
        .into_iter()
        .collect();

    CompositionResource {
        id: None,
        status: "final".into(),
        type_: CodeableConcept::coded(Coding::new(
            LOINC_SYSTEM,
            CONSULT_NOTE_LOINC,
            Some("Consult note"),
        )),
        subject: Reference::literal(patient_url),
        date: recorded.to_owned(),
        author: vec![Reference::logical(
            PRACTITIONER_IDENTIFIER_SYSTEM,
            snapshot.practitioner_ref(),
        )],
        title: DOCUMENT_TITLE.into(),
        relates_to,
        section: sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::{Encounter, EncounterAssembler};
    use crate::terminology::index::TerminologyIndex;
    use crate::terminology::loader::TerminologyData;
    use crate::terminology::resolver::TerminologyResolver;
    use chrono::{TimeZone, Utc};
    use fhir::constants::{ICD11_SYSTEM, NAMASTE_SYSTEM};
    use std::sync::Arc;
    use uuid::Uuid;

    const ENCOUNTER_ID: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

    fn assembler() -> EncounterAssembler {
        let data = TerminologyData::seed().expect("seed");
        let index = TerminologyIndex::with_data(data.entries, data.mappings).expect("index");
        EncounterAssembler::new(TerminologyResolver::new(Arc::new(index)))
    }

    fn encounter() -> Encounter {
        let mut enc = Encounter::with_identity(
            Uuid::parse_str(ENCOUNTER_ID).expect("uuid"),
            "ABHA-12-3456-7890-1234",
            "HPR-771",
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
        )
        .expect("encounter");
        enc.set_chief_complaint("Stiff joints <3 weeks> & poor sleep");
        enc
    }

    fn conditions(bundle: &Bundle) -> Vec<&ConditionResource> {
        bundle.conditions().map(|(_, c)| c).collect()
    }

    #[test]
    fn mapped_diagnosis_yields_four_consistent_resources() {
        let assembler = assembler();
        let mut enc = encounter();
        assembler.add_diagnosis(&mut enc, "AY001", "").expect("dx");
        assembler
            .add_prescription(&mut enc, "Dashamoola kwatha", "20 ml", "twice daily", "7 days")
            .expect("rx");
        let snapshot = assembler.finalize(&enc).expect("finalize");

        let bundle = BundleBuilder::build(&snapshot).expect("build");
        assert_eq!(bundle.id, "0f8fad5bd9cb469fa16570867728950e");
        assert_eq!(bundle.bundle_type, BundleType::Document);
        assert_eq!(bundle.timestamp, "2026-03-01T09:30:00.000Z");
        assert_eq!(bundle.entry.len(), 4);

        let urls: Vec<&str> = bundle.entry.iter().map(|e| e.full_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "urn:uuid:Composition-1",
                "urn:uuid:Patient-1",
                "urn:uuid:Condition-1",
                "urn:uuid:MedicationRequest-1",
            ]
        );

        let condition = conditions(&bundle)[0];
        let namaste = condition.code.coding_for(NAMASTE_SYSTEM).expect("namaste");
        let icd = condition.code.coding_for(ICD11_SYSTEM).expect("icd");
        assert_eq!(namaste.code, "AY001");
        assert_eq!(icd.code, "XM9");
        assert!(condition.meta.is_none());

        let composition = bundle.composition().expect("composition");
        assert!(composition
            .section_coded(FLAG_SYSTEM, INCOMPLETE_CODING_CODE)
            .is_none());
        bundle.check_integrity().expect("no dangling references");
    }

    #[test]
    fn unmapped_diagnosis_is_flagged_incomplete() {
        let assembler = assembler();
        let mut enc = encounter();
        assembler.add_diagnosis(&mut enc, "AY001", "").expect("mapped");
        assembler.add_diagnosis(&mut enc, "AY999", "").expect("unmapped");
        let bundle = BundleBuilder::build(&assembler.finalize(&enc).expect("finalize"))
            .expect("build");

        let conds = conditions(&bundle);
        assert_eq!(conds.len(), 2);
        let unmapped = conds[1];
        assert_eq!(unmapped.code.coding.len(), 1);
        assert!(unmapped.code.coding_for(ICD11_SYSTEM).is_none());
        let tag = &unmapped.meta.as_ref().expect("tagged").tag[0];
        assert_eq!(tag.code, INCOMPLETE_CODING_CODE);

        let section = bundle
            .composition()
            .expect("composition")
            .section_coded(FLAG_SYSTEM, INCOMPLETE_CODING_CODE)
            .expect("incomplete section");
        let listed: Vec<&str> = section
            .entry
            .iter()
            .filter_map(|r| r.reference.as_deref())
            .collect();
        assert_eq!(listed, vec!["urn:uuid:Condition-2"]);
        bundle.check_integrity().expect("still consistent");
    }

    #[test]
    fn build_is_deterministic() {
        let assembler = assembler();
        let mut enc = encounter();
        enc.set_clinical_notes("Vitals normal.");
        assembler.add_diagnosis(&mut enc, "AY002", "family history").expect("dx");
        let snapshot = assembler.finalize(&enc).expect("finalize");

        let first = BundleBuilder::build(&snapshot).expect("build");
        let second = BundleBuilder::build(&snapshot).expect("build");
        assert_eq!(first, second);
        assert_eq!(
            first.render().expect("render"),
            second.render().expect("render")
        );
    }

    #[test]
    fn composition_links_everything_and_escapes_narrative() {
        let assembler = assembler();
        let mut enc = encounter();
        enc.set_replaces(Some("a1b2c3")).expect("replaces");
        assembler.add_diagnosis(&mut enc, "AY003", "").expect("dx");
        assembler
            .add_prescription(&mut enc, "Simhanada guggulu", "2 tablets", "thrice daily", "1 month")
            .expect("rx 1");
        assembler
            .add_prescription(&mut enc, "Rasnadi kwatha", "15 ml", "twice daily", "1 month")
            .expect("rx 2");
        let bundle =
            BundleBuilder::build(&assembler.finalize(&enc).expect("finalize")).expect("build");

        assert_eq!(bundle.count_of(ResourceType::MedicationRequest), 2);
        let composition = bundle.composition().expect("composition");
        assert_eq!(composition.author[0].reference, None);
        assert_eq!(
            composition.author[0].identifier.as_ref().map(|i| i.value.as_str()),
            Some("HPR-771")
        );
        assert_eq!(
            composition.replaced_bundle_ids().collect::<Vec<_>>(),
            vec!["a1b2c3"]
        );

        let meds = composition
            .section_coded(LOINC_SYSTEM, MEDICATIONS_LOINC)
            .expect("medications section");
        assert_eq!(meds.entry.len(), 2);

        let complaint = composition
            .section_coded(LOINC_SYSTEM, CHIEF_COMPLAINT_LOINC)
            .expect("complaint section");
        let div = &complaint.text.as_ref().expect("narrative").div;
        assert!(div.contains("&lt;3 weeks&gt; &amp; poor sleep"), "{div}");
    }

    #[test]
    fn seal_fails_closed_on_dangling_reference() {
        let assembler = assembler();
        let mut enc = encounter();
        assembler.add_diagnosis(&mut enc, "AY001", "").expect("dx");
        let mut bundle =
            BundleBuilder::build(&assembler.finalize(&enc).expect("finalize")).expect("build");

        // Drop the Patient entry so the Condition's subject dangles.
        bundle.entry.remove(1);
        let err = seal(bundle).expect_err("dangling subject");
        assert!(matches!(err, CoreError::Integrity(_)));
    }
}
