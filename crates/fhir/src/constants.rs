//! Coding system URIs and fixed codes used in generated Bundles.

/// NAMASTE (National AYUSH Morbidity and Standardized Terminologies Electronic) code system.
pub const NAMASTE_SYSTEM: &str = "http://namstp.ayush.gov.in/fhir/CodeSystem/namaste";

/// ICD-11 Mortality and Morbidity Statistics linearization.
pub const ICD11_SYSTEM: &str = "http://id.who.int/icd/release/11/mms";

/// Identifier system for ABHA (Ayushman Bharat Health Account) patient references.
pub const ABHA_IDENTIFIER_SYSTEM: &str = "https://healthid.abdm.gov.in";

/// Identifier system for practitioner references supplied by the auth layer.
pub const PRACTITIONER_IDENTIFIER_SYSTEM: &str = "https://hpr.abdm.gov.in";

/// Local code system for machine-readable workflow flags.
pub const FLAG_SYSTEM: &str = "http://namstp.ayush.gov.in/fhir/CodeSystem/coding-flags";

/// Flag code marking a Condition whose ICD-11 coding could not be resolved.
pub const INCOMPLETE_CODING_CODE: &str = "incomplete-coding";

pub const LOINC_SYSTEM: &str = "http://loinc.org";

/// LOINC "Consult note" document type.
pub const CONSULT_NOTE_LOINC: &str = "11488-4";

/// LOINC "Chief complaint Narrative - Reported".
pub const CHIEF_COMPLAINT_LOINC: &str = "10154-3";

/// LOINC "Problem list - Reported".
pub const PROBLEM_LIST_LOINC: &str = "11450-4";

/// LOINC "History of Medication use Narrative".
pub const MEDICATIONS_LOINC: &str = "10160-0";

/// LOINC "Physician Progress note" section used for free clinical notes.
pub const CLINICAL_NOTES_LOINC: &str = "18733-6";

pub const CONDITION_CLINICAL_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/condition-clinical";

pub const CONDITION_CATEGORY_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/condition-category";

/// Prefix for Bundle-internal `fullUrl`s.
pub const URN_UUID_PREFIX: &str = "urn:uuid:";
