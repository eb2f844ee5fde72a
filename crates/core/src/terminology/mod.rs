//! NAMASTE and ICD-11 terminology.
//!
//! - [`index`]: the in-memory code tables and mapping table, swapped atomically on reload
//! - [`resolver`]: NAMASTE → ICD-11 resolution and combined free-text suggestions
//! - [`loader`]: reading terminology tables from YAML or JSON

pub mod index;
pub mod loader;
pub mod resolver;

use crate::CoreError;
use namaste_types::Confidence;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// A code system known to the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodeSystem {
    Namaste,
    Icd11,
}

impl CodeSystem {
    pub const ALL: [CodeSystem; 2] = [CodeSystem::Namaste, CodeSystem::Icd11];

    pub fn as_str(self) -> &'static str {
        match self {
            CodeSystem::Namaste => "NAMASTE",
            CodeSystem::Icd11 => "ICD11",
        }
    }

    /// FHIR `Coding.system` URI.
    pub fn uri(self) -> &'static str {
        match self {
            CodeSystem::Namaste => fhir::constants::NAMASTE_SYSTEM,
            CodeSystem::Icd11 => fhir::constants::ICD11_SYSTEM,
        }
    }
}

impl std::fmt::Display for CodeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CodeSystem {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "namaste" => Ok(CodeSystem::Namaste),
            "icd11" | "icd-11" => Ok(CodeSystem::Icd11),
            other => Err(CoreError::validation(
                "system",
                format!("unknown code system {other:?} (expected NAMASTE or ICD11)"),
            )),
        }
    }
}

/// One code in one code system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminologyEntry {
    pub system: CodeSystem,
    pub code: String,
    pub display_name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl TerminologyEntry {
    pub fn new(
        system: CodeSystem,
        code: impl Into<String>,
        display_name: impl Into<String>,
        synonyms: Vec<String>,
    ) -> Self {
        Self {
            system,
            code: code.into(),
            display_name: display_name.into(),
            synonyms,
        }
    }
}

/// How closely an ICD-11 code captures a NAMASTE concept.
///
/// Declaration order is preference order: `Exact` ranks above `Partial`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MappingType {
    Exact,
    Narrower,
    Broader,
    Partial,
}

impl MappingType {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingType::Exact => "EXACT",
            MappingType::Narrower => "NARROWER",
            MappingType::Broader => "BROADER",
            MappingType::Partial => "PARTIAL",
        }
    }
}

impl std::fmt::Display for MappingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A NAMASTE → ICD-11 cross-walk row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeMapping {
    pub namaste_code: String,
    pub icd_code: String,
    pub mapping_type: MappingType,
    pub confidence: Confidence,
}

impl CodeMapping {
    /// Mapping preference: confidence, then mapping type, then ICD code.
    pub fn rank_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.confidence
            .cmp_desc(&other.confidence)
            .then_with(|| self.mapping_type.cmp(&other.mapping_type))
            .then_with(|| self.icd_code.cmp(&other.icd_code))
    }
}

/// Whether a search hit matched at the start of a name or somewhere inside it.
///
/// `Prefix` sorts before `Substring`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Prefix,
    Substring,
}

impl MatchKind {
    pub fn score(self) -> f64 {
        match self {
            MatchKind::Prefix => crate::constants::PREFIX_MATCH_SCORE,
            MatchKind::Substring => crate::constants::SUBSTRING_MATCH_SCORE,
        }
    }
}

/// One ranked search result.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub entry: Arc<TerminologyEntry>,
    pub match_kind: MatchKind,
    pub score: f64,
}

/// Entry and mapping counts for the loaded index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub namaste_entries: usize,
    pub icd_entries: usize,
    pub mappings: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(icd: &str, mapping_type: MappingType, confidence: f64) -> CodeMapping {
        CodeMapping {
            namaste_code: "AY001".into(),
            icd_code: icd.into(),
            mapping_type,
            confidence: Confidence::new(confidence).expect("valid confidence"),
        }
    }

    #[test]
    fn code_system_parses_leniently() {
        assert_eq!("namaste".parse::<CodeSystem>().expect("parse"), CodeSystem::Namaste);
        assert_eq!(" ICD-11 ".parse::<CodeSystem>().expect("parse"), CodeSystem::Icd11);
        assert!("snomed".parse::<CodeSystem>().is_err());
    }

    #[test]
    fn mapping_rank_uses_confidence_then_type_then_code() {
        let high = mapping("ZZ1", MappingType::Partial, 0.9);
        let exact = mapping("BB1", MappingType::Exact, 0.6);
        let broader = mapping("AA1", MappingType::Broader, 0.6);
        let broader_later = mapping("AA2", MappingType::Broader, 0.6);

        let mut all = vec![broader_later.clone(), broader.clone(), exact.clone(), high.clone()];
        all.sort_by(CodeMapping::rank_cmp);
        assert_eq!(all, vec![high, exact, broader, broader_later]);
    }

    #[test]
    fn wire_names_are_uppercase() {
        let json = serde_json::to_string(&MappingType::Narrower).expect("serialize");
        assert_eq!(json, "\"NARROWER\"");
        let system: CodeSystem = serde_json::from_str("\"ICD11\"").expect("deserialize");
        assert_eq!(system, CodeSystem::Icd11);
    }
}
