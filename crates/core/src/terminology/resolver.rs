//! NAMASTE → ICD-11 resolution.
//!
//! The resolver never invents a code: a NAMASTE code with no mapping resolves to
//! [`Resolution::Unmapped`] and the caller keeps the diagnosis NAMASTE-only.

use super::index::{effective_limit, IndexSnapshot, TerminologyIndex};
use super::{CodeMapping, CodeSystem, MappingType, SearchHit};
use namaste_types::Confidence;
use serde::Serialize;
use std::sync::Arc;

/// A mapping joined with the display name of its ICD-11 target.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMapping {
    pub namaste_code: String,
    pub icd_code: String,
    pub icd_display: String,
    pub mapping_type: MappingType,
    pub confidence: Confidence,
}

impl ResolvedMapping {
    fn join(snapshot: &IndexSnapshot, mapping: &CodeMapping) -> Option<Self> {
        let icd = snapshot.lookup(CodeSystem::Icd11, &mapping.icd_code)?;
        Some(Self {
            namaste_code: mapping.namaste_code.clone(),
            icd_code: mapping.icd_code.clone(),
            icd_display: icd.display_name.clone(),
            mapping_type: mapping.mapping_type,
            confidence: mapping.confidence,
        })
    }
}

/// Outcome of resolving a NAMASTE code. `Unmapped` is a normal result, not an error.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Resolution {
    Mapped(ResolvedMapping),
    Unmapped,
}

impl Resolution {
    pub fn mapping(&self) -> Option<&ResolvedMapping> {
        match self {
            Resolution::Mapped(m) => Some(m),
            Resolution::Unmapped => None,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Resolution::Mapped(_))
    }
}

/// Read-only view over a shared [`TerminologyIndex`].
#[derive(Clone, Debug)]
pub struct TerminologyResolver {
    index: Arc<TerminologyIndex>,
}

impl TerminologyResolver {
    pub fn new(index: Arc<TerminologyIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<TerminologyIndex> {
        &self.index
    }

    /// The best mapping for `namaste_code`, or `Unmapped`.
    pub fn resolve(&self, namaste_code: &str) -> Resolution {
        Self::resolve_in(&self.index.snapshot(), namaste_code)
    }

    /// [`resolve`](Self::resolve) against a snapshot the caller already holds.
    pub fn resolve_in(snapshot: &IndexSnapshot, namaste_code: &str) -> Resolution {
        let top = snapshot
            .mappings_for(namaste_code)
            .iter()
            .find_map(|m| ResolvedMapping::join(snapshot, m));
        match top {
            Some(mapping) => Resolution::Mapped(mapping),
            None => Resolution::Unmapped,
        }
    }

    /// Every mapped ICD-11 code for `namaste_code`, best first.
    pub fn candidates(&self, namaste_code: &str) -> Vec<ResolvedMapping> {
        let snapshot = self.index.snapshot();
        snapshot
            .mappings_for(namaste_code)
            .iter()
            .filter_map(|m| ResolvedMapping::join(&snapshot, m))
            .collect()
    }

    /// Look `free_text` up in both code systems.
    ///
    /// Prefix matches rank first, then NAMASTE before ICD-11, then code order.
    pub fn suggest(&self, free_text: &str, limit: Option<usize>) -> Vec<SearchHit> {
        let limit = effective_limit(limit);
        let snapshot = self.index.snapshot();

        let mut hits: Vec<SearchHit> = CodeSystem::ALL
            .iter()
            .flat_map(|system| snapshot.search(*system, free_text, Some(limit)))
            .collect();

        hits.sort_by(|a, b| {
            a.match_kind
                .cmp(&b.match_kind)
                .then_with(|| a.entry.system.cmp(&b.entry.system))
                .then_with(|| a.entry.code.cmp(&b.entry.code))
        });
        hits.dedup_by(|a, b| a.entry.system == b.entry.system && a.entry.code == b.entry.code);
        hits.truncate(limit);
        hits
    }
}
