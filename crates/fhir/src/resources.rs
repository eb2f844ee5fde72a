//! Wire models for the four resource types a diagnosis Bundle may contain.
//!
//! Responsibilities:
//! - Define strict serde models for Patient, Condition, MedicationRequest and Composition
//! - Dispatch on the `resourceType` tag
//! - Enumerate every literal reference a resource holds, with its JSON path, so Bundle-level
//!   integrity checks can be written once

use crate::datatypes::{
    Annotation, CodeableConcept, Dosage, Identifier, Meta, Narrative, Reference,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Resource type tag
// ============================================================================

/// The resource types accepted inside a Bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Patient,
    Condition,
    MedicationRequest,
    Composition,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::Condition => "Condition",
            ResourceType::MedicationRequest => "MedicationRequest",
            ResourceType::Composition => "Composition",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Resource enum
// ============================================================================

/// A resource inside a Bundle entry, tagged by `resourceType`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "resourceType")]
pub enum Resource {
    Patient(PatientResource),
    Condition(ConditionResource),
    MedicationRequest(MedicationRequestResource),
    Composition(CompositionResource),
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::Patient(_) => ResourceType::Patient,
            Resource::Condition(_) => ResourceType::Condition,
            Resource::MedicationRequest(_) => ResourceType::MedicationRequest,
            Resource::Composition(_) => ResourceType::Composition,
        }
    }

    /// Every reference held by this resource, paired with its path relative to the resource.
    pub fn references(&self) -> Vec<(String, &Reference)> {
        match self {
            Resource::Patient(_) => Vec::new(),
            Resource::Condition(c) => vec![("subject".to_owned(), &c.subject)],
            Resource::MedicationRequest(m) => {
                let mut refs = vec![("subject".to_owned(), &m.subject)];
                if let Some(requester) = &m.requester {
                    refs.push(("requester".to_owned(), requester));
                }
                refs
            }
            Resource::Composition(c) => {
                let mut refs = vec![("subject".to_owned(), &c.subject)];
                for (i, author) in c.author.iter().enumerate() {
                    refs.push((format!("author[{i}]"), author));
                }
                for (i, section) in c.section.iter().enumerate() {
                    for (j, entry) in section.entry.iter().enumerate() {
                        refs.push((format!("section[{i}].entry[{j}]"), entry));
                    }
                }
                refs
            }
        }
    }

    pub fn as_condition(&self) -> Option<&ConditionResource> {
        match self {
            Resource::Condition(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_composition(&self) -> Option<&CompositionResource> {
        match self {
            Resource::Composition(c) => Some(c),
            _ => None,
        }
    }
}

// ============================================================================
// Resource wire models
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PatientResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// A clinical statement about a problem; `code` carries the dual coding.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConditionResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(
        rename = "clinicalStatus",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub clinical_status: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<CodeableConcept>,
    pub code: CodeableConcept,
    pub subject: Reference,
    #[serde(
        rename = "recordedDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub recorded_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub note: Vec<Annotation>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MedicationRequestResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: String,
    pub intent: String,
    #[serde(rename = "medicationCodeableConcept")]
    pub medication_codeable_concept: CodeableConcept,
    pub subject: Reference,
    #[serde(rename = "authoredOn", default, skip_serializing_if = "Option::is_none")]
    pub authored_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<Reference>,
    #[serde(
        rename = "dosageInstruction",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub dosage_instruction: Vec<Dosage>,
}

/// Document header: who, when, and which resources make up the document.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CompositionResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: String,
    #[serde(rename = "type")]
    pub type_: CodeableConcept,
    pub subject: Reference,
    pub date: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<Reference>,
    pub title: String,
    #[serde(rename = "relatesTo", default, skip_serializing_if = "Vec::is_empty")]
    pub relates_to: Vec<CompositionRelatesTo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub section: Vec<CompositionSection>,
}

impl CompositionResource {
    /// Returns the section whose code contains `system|code`.
    pub fn section_coded(&self, system: &str, code: &str) -> Option<&CompositionSection> {
        self.section.iter().find(|s| {
            s.code
                .as_ref()
                .and_then(|c| c.coding_for(system))
                .is_some_and(|c| c.code == code)
        })
    }

    /// Bundle ids this composition declares it replaces.
    pub fn replaced_bundle_ids(&self) -> impl Iterator<Item = &str> {
        self.relates_to
            .iter()
            .filter(|r| r.code == "replaces")
            .map(|r| r.target_identifier.value.as_str())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CompositionRelatesTo {
    pub code: String,
    #[serde(rename = "targetIdentifier")]
    pub target_identifier: Identifier,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CompositionSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Narrative>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<Reference>,
}
