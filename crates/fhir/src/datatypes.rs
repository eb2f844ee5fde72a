//! FHIR complex datatypes shared by the resource wire models.
//!
//! Only the subset of each datatype that the diagnosis workflow emits is modelled. All structs
//! use `#[serde(deny_unknown_fields)]` so that uploaded documents carrying anything else are
//! rejected at the boundary instead of being silently truncated on re-serialisation.

use serde::{Deserialize, Serialize};

/// A code defined by a terminology system.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Coding {
    pub system: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: &str, code: &str, display: Option<&str>) -> Self {
        Self {
            system: system.to_owned(),
            code: code.to_owned(),
            display: display.map(str::to_owned),
        }
    }
}

/// A concept that may be defined by one or more parallel codings.
///
/// Dual coding is expressed here: a NAMASTE coding and an ICD-11 coding side by side on the same
/// concept.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            coding: Vec::new(),
            text: Some(text.into()),
        }
    }

    pub fn coded(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
            text: None,
        }
    }

    /// Returns the coding for `system`, if present.
    pub fn coding_for(&self, system: &str) -> Option<&Coding> {
        self.coding.iter().find(|c| c.system == system)
    }
}

/// An identifier intended for computation.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Identifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub value: String,
}

/// A reference from one resource to another.
///
/// A literal reference (`reference`) must resolve to a `fullUrl` in the same Bundle. A logical
/// reference carries only an `identifier` and points outside the Bundle; it is never accepted as
/// a resource `subject`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    pub fn literal(full_url: impl Into<String>) -> Self {
        Self {
            reference: Some(full_url.into()),
            ..Self::default()
        }
    }

    pub fn logical(system: &str, value: impl Into<String>) -> Self {
        Self {
            identifier: Some(Identifier {
                system: Some(system.to_owned()),
                value: value.into(),
            }),
            ..Self::default()
        }
    }
}

/// A text note with no attribution.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Annotation {
    pub text: String,
}

/// Human-readable XHTML summary.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Narrative {
    pub status: String,
    pub div: String,
}

impl Narrative {
    /// Wraps plain text in an escaped XHTML `div` with status `generated`.
    pub fn generated(text: &str) -> Self {
        Self {
            status: "generated".into(),
            div: format!(
                "<div xmlns=\"http://www.w3.org/1999/xhtml\">{}</div>",
                html_escape::encode_text(text)
            ),
        }
    }
}

/// Resource metadata; used here only for workflow tags.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<Coding>,
}

/// Timing schedule; only the free-text code is carried.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Timing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
}

/// How a medication is to be taken.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Dosage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(
        rename = "patientInstruction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub patient_instruction: Option<String>,
}
