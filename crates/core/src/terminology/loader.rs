//! Terminology table files.
//!
//! A table file lists NAMASTE entries, ICD-11 entries and the mappings between them:
//!
//! ```yaml
//! namaste:
//!   - code: AY001
//!     display: Vata imbalance
//!     synonyms: [Vata prakopa]
//! icd11:
//!   - code: XM9
//!     display: Vata pattern disorder
//! mappings:
//!   - namaste: AY001
//!     icd11: XM9
//!     type: EXACT
//!     confidence: 0.95
//! ```
//!
//! The same shape is accepted as JSON when the file name ends in `.json`. When the index is
//! built, entries are numbered NAMASTE first then ICD-11, in file order.

use super::index::TerminologyIndex;
use super::{CodeMapping, CodeSystem, IndexStats, MappingType, TerminologyEntry};
use crate::config::CoreConfig;
use crate::{CoreError, CoreResult};
use namaste_types::Confidence;
use serde::Deserialize;
use std::path::Path;

const SEED_TABLE: &str = include_str!("../../terminology/seed.yaml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TerminologyFileWire {
    #[serde(default)]
    namaste: Vec<EntryWire>,
    #[serde(default)]
    icd11: Vec<EntryWire>,
    #[serde(default)]
    mappings: Vec<MappingWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryWire {
    code: String,
    display: String,
    #[serde(default)]
    synonyms: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingWire {
    namaste: String,
    icd11: String,
    #[serde(rename = "type")]
    mapping_type: MappingType,
    confidence: f64,
}

/// Parsed, not yet indexed, terminology tables.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TerminologyData {
    pub entries: Vec<TerminologyEntry>,
    pub mappings: Vec<CodeMapping>,
}

impl TerminologyData {
    /// Parse a YAML table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] with the path of the failing field.
    pub fn from_yaml_str(yaml_text: &str) -> CoreResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire = serde_path_to_error::deserialize::<_, TerminologyFileWire>(deserializer)
            .map_err(path_error)?;
        wire_to_domain(wire)
    }

    /// Parse a JSON table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] with the path of the failing field.
    pub fn from_json_str(json_text: &str) -> CoreResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        let wire = serde_path_to_error::deserialize::<_, TerminologyFileWire>(&mut deserializer)
            .map_err(path_error)?;
        deserializer
            .end()
            .map_err(|e| CoreError::validation("<root>", e.to_string()))?;
        wire_to_domain(wire)
    }

    /// Read a table from disk; `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(CoreError::FileRead)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    /// The table compiled into the binary.
    pub fn seed() -> CoreResult<Self> {
        Self::from_yaml_str(SEED_TABLE)
    }

    /// Swap these tables into `index`.
    pub fn load_into(self, index: &TerminologyIndex) -> CoreResult<IndexStats> {
        index.load(self.entries, self.mappings)
    }
}

/// Build the index named by `cfg`: the configured file, or the seed table when none is set.
pub fn index_from_config(cfg: &CoreConfig) -> CoreResult<TerminologyIndex> {
    let data = match cfg.terminology_file() {
        Some(path) => {
            tracing::info!("loading terminology from {}", path.display());
            TerminologyData::from_file(path)?
        }
        None => {
            tracing::info!("loading embedded seed terminology");
            TerminologyData::seed()?
        }
    };
    TerminologyIndex::with_data(data.entries, data.mappings)
}

pub(crate) fn path_error<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> CoreError {
    let path = err.path().to_string();
    let path = if path.is_empty() || path == "." {
        "<root>".to_owned()
    } else {
        path
    };
    CoreError::Validation {
        field: path,
        message: err.into_inner().to_string(),
    }
}

fn wire_to_domain(wire: TerminologyFileWire) -> CoreResult<TerminologyData> {
    let entries = wire
        .namaste
        .into_iter()
        .map(|e| (CodeSystem::Namaste, e))
        .chain(wire.icd11.into_iter().map(|e| (CodeSystem::Icd11, e)))
        .map(|(system, e)| TerminologyEntry::new(system, e.code, e.display, e.synonyms))
        .collect();

    let mappings = wire
        .mappings
        .into_iter()
        .enumerate()
        .map(|(i, m)| {
            let confidence = Confidence::new(m.confidence).map_err(|e| {
                CoreError::validation(format!("mappings[{i}].confidence"), e.to_string())
            })?;
            Ok(CodeMapping {
                namaste_code: m.namaste,
                icd_code: m.icd11,
                mapping_type: m.mapping_type,
                confidence,
            })
        })
        .collect::<CoreResult<Vec<_>>>()?;

    Ok(TerminologyData { entries, mappings })
}
