//! JSON request and response bodies.
//!
//! These are the API's wire types: camelCase, documented for OpenAPI, and converted to and from
//! the core domain types at the edge.

use namaste_core::{
    DiagnosisRequest, EncounterRequest, PrescriptionRequest, Resolution, ResolvedMapping,
    SearchHit,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// Health
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
    pub namaste_entries: usize,
    pub icd_entries: usize,
    pub mappings: usize,
}

// ============================================================================
// Terminology
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Free text matched against display names and synonyms.
    #[serde(default)]
    pub query: String,
    /// `NAMASTE` or `ICD11`; both systems when omitted.
    pub system: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchHitRes {
    /// `NAMASTE` or `ICD11`.
    pub system: String,
    pub code: String,
    pub display_name: String,
    /// `prefix` or `substring`.
    pub match_kind: String,
    pub score: f64,
}

impl From<&SearchHit> for SearchHitRes {
    fn from(hit: &SearchHit) -> Self {
        let match_kind = match hit.match_kind {
            namaste_core::MatchKind::Prefix => "prefix",
            namaste_core::MatchKind::Substring => "substring",
        };
        Self {
            system: hit.entry.system.as_str().to_owned(),
            code: hit.entry.code.clone(),
            display_name: hit.entry.display_name.clone(),
            match_kind: match_kind.to_owned(),
            score: hit.score,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MappingRes {
    pub namaste_code: String,
    pub icd_code: String,
    pub icd_display: String,
    /// `EXACT`, `NARROWER`, `BROADER` or `PARTIAL`.
    pub mapping_type: String,
    pub confidence: f64,
}

impl From<&ResolvedMapping> for MappingRes {
    fn from(m: &ResolvedMapping) -> Self {
        Self {
            namaste_code: m.namaste_code.clone(),
            icd_code: m.icd_code.clone(),
            icd_display: m.icd_display.clone(),
            mapping_type: m.mapping_type.as_str().to_owned(),
            confidence: m.confidence.value(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRes {
    /// `mapped` or `unmapped`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<MappingRes>,
}

impl From<&Resolution> for ResolveRes {
    fn from(resolution: &Resolution) -> Self {
        match resolution {
            Resolution::Mapped(m) => Self {
                status: "mapped".into(),
                mapping: Some(m.into()),
            },
            Resolution::Unmapped => Self {
                status: "unmapped".into(),
                mapping: None,
            },
        }
    }
}

// ============================================================================
// Encounters and bundles
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiagnosisReq {
    pub namaste_code: String,
    /// Overrides the best-ranked ICD-11 mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icd_code: Option<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PrescriptionReq {
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

/// Doctor input for one consultation. The practitioner comes from the `x-practitioner-ref`
/// header.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EncounterReq {
    pub patient_ref: String,
    pub chief_complaint: String,
    #[serde(default)]
    pub clinical_notes: String,
    pub diagnoses: Vec<DiagnosisReq>,
    #[serde(default)]
    pub prescriptions: Vec<PrescriptionReq>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaces: Option<String>,
}

impl EncounterReq {
    /// Convert to the core request, attaching the authenticated practitioner.
    pub fn into_core(self, practitioner_ref: &str) -> EncounterRequest {
        EncounterRequest {
            patient_ref: self.patient_ref,
            practitioner_ref: practitioner_ref.to_owned(),
            chief_complaint: self.chief_complaint,
            clinical_notes: self.clinical_notes,
            diagnoses: self
                .diagnoses
                .into_iter()
                .map(|d| DiagnosisRequest {
                    namaste_code: d.namaste_code,
                    icd_code: d.icd_code,
                    notes: d.notes,
                })
                .collect(),
            prescriptions: self
                .prescriptions
                .into_iter()
                .map(|p| PrescriptionRequest {
                    medication: p.medication,
                    dosage: p.dosage,
                    frequency: p.frequency,
                    duration: p.duration,
                })
                .collect(),
            replaces: self.replaces,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRes {
    pub id: String,
    pub status: String,
}

impl CreatedRes {
    pub fn created(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: "created".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncounterBundleRes {
    pub id: String,
    pub status: String,
    /// NAMASTE codes stored without an ICD-11 coding.
    pub incomplete_diagnoses: Vec<String>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    /// Machine-readable kind, e.g. `validation_error`.
    pub error: String,
    pub message: String,
    /// Path of the offending field, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encounter_req_takes_practitioner_from_caller() {
        let req: EncounterReq = serde_json::from_str(
            r#"{
                "patientRef": "ABHA-1",
                "chiefComplaint": "Cough",
                "diagnoses": [{"namasteCode": "AY004"}],
                "prescriptions": [{"medication": "Sitopaladi churna", "dosage": "3 g", "frequency": "twice daily", "duration": "5 days"}]
            }"#,
        )
        .expect("parse");
        let core = req.into_core("HPR-9");
        assert_eq!(core.practitioner_ref, "HPR-9");
        assert_eq!(core.diagnoses[0].namaste_code, "AY004");
        assert_eq!(core.prescriptions[0].duration, "5 days");
    }

    #[test]
    fn encounter_req_rejects_practitioner_in_body() {
        let err = serde_json::from_str::<EncounterReq>(
            r#"{"patientRef": "A", "practitionerRef": "spoofed", "chiefComplaint": "x", "diagnoses": []}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn unmapped_resolution_omits_mapping() {
        let res = ResolveRes::from(&Resolution::Unmapped);
        let json = serde_json::to_value(&res).expect("serialize");
        assert_eq!(json, serde_json::json!({"status": "unmapped"}));
    }

    #[test]
    fn error_body_omits_empty_field() {
        let body = ErrorRes {
            error: "not_found".into(),
            message: "bundle not found: abc".into(),
            field: None,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert!(json.get("field").is_none());
    }
}
