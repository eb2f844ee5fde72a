//! In-memory terminology index.
//!
//! The index holds one immutable [`IndexSnapshot`] behind an `RwLock<Arc<_>>`. A reload builds
//! and validates a complete new snapshot without holding the lock, then swaps it in with a
//! single write. Readers clone the `Arc`, so every read sees either the old tables or the new
//! ones in full, never a mixture.

use super::{CodeMapping, CodeSystem, IndexStats, MatchKind, SearchHit, TerminologyEntry};
use crate::constants::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
use crate::{CoreError, CoreResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Resolves a caller-supplied limit against the default and the hard maximum.
pub fn effective_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(MAX_SEARCH_LIMIT)
}

#[derive(Debug)]
struct IndexedEntry {
    entry: Arc<TerminologyEntry>,
    /// Lower-cased display name followed by lower-cased synonyms.
    haystacks: Vec<String>,
}

impl IndexedEntry {
    fn new(entry: TerminologyEntry) -> Self {
        let haystacks = std::iter::once(&entry.display_name)
            .chain(entry.synonyms.iter())
            .map(|s| s.to_lowercase())
            .collect();
        Self {
            entry: Arc::new(entry),
            haystacks,
        }
    }

    fn match_kind(&self, needle: &str) -> Option<MatchKind> {
        if self.haystacks.iter().any(|h| h.starts_with(needle)) {
            Some(MatchKind::Prefix)
        } else if self.haystacks.iter().any(|h| h.contains(needle)) {
            Some(MatchKind::Substring)
        } else {
            None
        }
    }
}

/// One consistent version of the terminology tables.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    namaste: BTreeMap<String, IndexedEntry>,
    icd: BTreeMap<String, IndexedEntry>,
    /// Keyed by NAMASTE code; each list is already in preference order.
    mappings: HashMap<String, Vec<CodeMapping>>,
    mapping_count: usize,
}

impl IndexSnapshot {
    /// Validate `entries` and `mappings` and build a snapshot from them.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the first offending field: an empty code or
    /// display name, an empty synonym, a duplicate code within a system, a mapping that refers to
    /// an unknown code or to a code in the wrong system, or a repeated mapping pair.
    pub fn build(entries: Vec<TerminologyEntry>, mappings: Vec<CodeMapping>) -> CoreResult<Self> {
        let mut snapshot = IndexSnapshot::default();

        for (i, mut entry) in entries.into_iter().enumerate() {
            entry.code = entry.code.trim().to_string();
            entry.display_name = entry.display_name.trim().to_string();
            if entry.code.is_empty() {
                return Err(CoreError::validation(
                    format!("entries[{i}].code"),
                    "code cannot be empty",
                ));
            }
            if entry.display_name.is_empty() {
                return Err(CoreError::validation(
                    format!("entries[{i}].displayName"),
                    format!("{} {} has an empty display name", entry.system, entry.code),
                ));
            }
            for (j, synonym) in entry.synonyms.iter_mut().enumerate() {
                *synonym = synonym.trim().to_string();
                if synonym.is_empty() {
                    return Err(CoreError::validation(
                        format!("entries[{i}].synonyms[{j}]"),
                        "synonyms cannot be empty",
                    ));
                }
            }

            let system = entry.system;
            let table = snapshot.table_mut(system);
            if table.contains_key(&entry.code) {
                return Err(CoreError::validation(
                    format!("entries[{i}].code"),
                    format!("duplicate {system} code {}", entry.code),
                ));
            }
            table.insert(entry.code.clone(), IndexedEntry::new(entry));
        }

        let mut seen_pairs: HashSet<(String, String)> = HashSet::with_capacity(mappings.len());
        for (i, mut mapping) in mappings.into_iter().enumerate() {
            mapping.namaste_code = mapping.namaste_code.trim().to_string();
            mapping.icd_code = mapping.icd_code.trim().to_string();

            snapshot.require_code(
                CodeSystem::Namaste,
                &mapping.namaste_code,
                format!("mappings[{i}].namasteCode"),
            )?;
            snapshot.require_code(
                CodeSystem::Icd11,
                &mapping.icd_code,
                format!("mappings[{i}].icdCode"),
            )?;

            if !seen_pairs.insert((mapping.namaste_code.clone(), mapping.icd_code.clone())) {
                return Err(CoreError::validation(
                    format!("mappings[{i}]"),
                    format!(
                        "duplicate mapping {} -> {}",
                        mapping.namaste_code, mapping.icd_code
                    ),
                ));
            }

            snapshot
                .mappings
                .entry(mapping.namaste_code.clone())
                .or_default()
                .push(mapping);
            snapshot.mapping_count += 1;
        }

        for list in snapshot.mappings.values_mut() {
            list.sort_by(CodeMapping::rank_cmp);
        }

        Ok(snapshot)
    }

    fn table(&self, system: CodeSystem) -> &BTreeMap<String, IndexedEntry> {
        match system {
            CodeSystem::Namaste => &self.namaste,
            CodeSystem::Icd11 => &self.icd,
        }
    }

    fn table_mut(&mut self, system: CodeSystem) -> &mut BTreeMap<String, IndexedEntry> {
        match system {
            CodeSystem::Namaste => &mut self.namaste,
            CodeSystem::Icd11 => &mut self.icd,
        }
    }

    fn require_code(&self, system: CodeSystem, code: &str, field: String) -> CoreResult<()> {
        if self.table(system).contains_key(code) {
            return Ok(());
        }
        let other = match system {
            CodeSystem::Namaste => CodeSystem::Icd11,
            CodeSystem::Icd11 => CodeSystem::Namaste,
        };
        let message = if self.table(other).contains_key(code) {
            format!("{code} is a {other} code, expected {system}")
        } else {
            format!("unknown {system} code {code:?}")
        };
        Err(CoreError::Validation { field, message })
    }

    pub fn lookup(&self, system: CodeSystem, code: &str) -> Option<&Arc<TerminologyEntry>> {
        self.table(system).get(code.trim()).map(|ie| &ie.entry)
    }

    /// Case-insensitive search over display names and synonyms.
    ///
    /// Prefix matches come before substring matches; within each group hits are in code order.
    pub fn search(&self, system: CodeSystem, query: &str, limit: Option<usize>) -> Vec<SearchHit> {
        let needle = query.trim().to_lowercase();
        let limit = effective_limit(limit);
        if needle.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .table(system)
            .values()
            .filter_map(|ie| {
                ie.match_kind(&needle).map(|match_kind| SearchHit {
                    entry: Arc::clone(&ie.entry),
                    match_kind,
                    score: match_kind.score(),
                })
            })
            .collect();

        // Stable: the BTreeMap already yields code order.
        hits.sort_by_key(|hit| hit.match_kind);
        hits.truncate(limit);
        hits
    }

    pub fn mappings_for(&self, namaste_code: &str) -> &[CodeMapping] {
        self.mappings
            .get(namaste_code.trim())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            namaste_entries: self.namaste.len(),
            icd_entries: self.icd.len(),
            mappings: self.mapping_count,
        }
    }
}

/// The shared, reloadable terminology index.
#[derive(Debug, Default)]
pub struct TerminologyIndex {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl TerminologyIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index already loaded with `entries` and `mappings`.
    pub fn with_data(entries: Vec<TerminologyEntry>, mappings: Vec<CodeMapping>) -> CoreResult<Self> {
        let index = Self::new();
        index.load(entries, mappings)?;
        Ok(index)
    }

    /// Replace the whole index.
    ///
    /// The new tables are validated before anything is swapped; on error the previous index
    /// stays in place.
    pub fn load(
        &self,
        entries: Vec<TerminologyEntry>,
        mappings: Vec<CodeMapping>,
    ) -> CoreResult<IndexStats> {
        let next = match IndexSnapshot::build(entries, mappings) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!("rejected terminology load: {e}");
                return Err(e);
            }
        };
        let stats = next.stats();

        {
            let mut guard = self.current.write().map_err(|_| CoreError::LockPoisoned)?;
            *guard = Arc::new(next);
        }

        tracing::info!(
            namaste_entries = stats.namaste_entries,
            icd_entries = stats.icd_entries,
            mappings = stats.mappings,
            "terminology index loaded"
        );
        Ok(stats)
    }

    /// The current snapshot. Callers that need several reads to agree should hold on to it.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        // The lock only ever guards a pointer swap, so a poisoned guard still holds a whole
        // snapshot.
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if `code` is not in `system`.
    pub fn lookup(&self, system: CodeSystem, code: &str) -> CoreResult<Arc<TerminologyEntry>> {
        self.snapshot()
            .lookup(system, code)
            .cloned()
            .ok_or_else(|| CoreError::not_found(system_kind(system), code.trim()))
    }

    pub fn search(&self, system: CodeSystem, query: &str, limit: Option<usize>) -> Vec<SearchHit> {
        self.snapshot().search(system, query, limit)
    }

    /// All mappings for `namaste_code`, best first.
    pub fn mappings_for(&self, namaste_code: &str) -> Vec<CodeMapping> {
        self.snapshot().mappings_for(namaste_code).to_vec()
    }

    pub fn stats(&self) -> IndexStats {
        self.snapshot().stats()
    }
}

pub(crate) fn system_kind(system: CodeSystem) -> &'static str {
    match system {
        CodeSystem::Namaste => "NAMASTE code",
        CodeSystem::Icd11 => "ICD-11 code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::MappingType;
    use namaste_types::Confidence;

    fn entry(system: CodeSystem, code: &str, name: &str, synonyms: &[&str]) -> TerminologyEntry {
        TerminologyEntry::new(
            system,
            code,
            name,
            synonyms.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn mapping(namaste: &str, icd: &str, mapping_type: MappingType, confidence: f64) -> CodeMapping {
        CodeMapping {
            namaste_code: namaste.into(),
            icd_code: icd.into(),
            mapping_type,
            confidence: Confidence::new(confidence).expect("valid confidence"),
        }
    }

    fn sample_entries() -> Vec<TerminologyEntry> {
        vec![
            entry(CodeSystem::Namaste, "AY003", "Pittaja jwara", &["Bilious fever"]),
            entry(CodeSystem::Namaste, "AY001", "Vata imbalance", &["Vata prakopa"]),
            entry(CodeSystem::Namaste, "AY002", "Aggravated vata in joints", &["Sandhivata"]),
            entry(CodeSystem::Namaste, "AY999", "Unclassified dosha disorder", &[]),
            entry(CodeSystem::Icd11, "XM9", "Vata pattern disorder", &[]),
            entry(CodeSystem::Icd11, "FA00", "Osteoarthritis of hip", &[]),
            entry(CodeSystem::Icd11, "FA01", "Osteoarthritis of knee", &[]),
        ]
    }

    fn sample_index() -> TerminologyIndex {
        TerminologyIndex::with_data(
            sample_entries(),
            vec![
                mapping("AY001", "XM9", MappingType::Exact, 0.95),
                mapping("AY002", "FA01", MappingType::Broader, 0.7),
                mapping("AY002", "FA00", MappingType::Broader, 0.7),
                mapping("AY002", "XM9", MappingType::Narrower, 0.7),
            ],
        )
        .expect("sample index loads")
    }

    #[test]
    fn lookup_finds_entries_and_reports_missing() {
        let index = sample_index();
        let found = index.lookup(CodeSystem::Namaste, "AY001").expect("present");
        assert_eq!(found.display_name, "Vata imbalance");

        let err = index.lookup(CodeSystem::Icd11, "AY001").expect_err("wrong system");
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn search_orders_prefix_before_substring_then_code() {
        let index = sample_index();
        let hits = index.search(CodeSystem::Namaste, "VATA", None);
        let codes: Vec<&str> = hits.iter().map(|h| h.entry.code.as_str()).collect();
        // "Sandhivata" and "Aggravated vata" only contain the query.
        assert_eq!(codes, vec!["AY001", "AY002"]);
        assert_eq!(hits[0].match_kind, MatchKind::Prefix);
        assert_eq!(hits[0].score, 1.0);
        assert_eq!(hits[1].match_kind, MatchKind::Substring);
        assert_eq!(hits[1].score, 0.5);
    }

    #[test]
    fn search_matches_synonyms() {
        let index = sample_index();
        let hits = index.search(CodeSystem::Namaste, "bilious", None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.code, "AY003");
        assert_eq!(hits[0].match_kind, MatchKind::Prefix);
    }

    #[test]
    fn search_respects_limit_and_empty_query() {
        let index = sample_index();
        assert_eq!(index.search(CodeSystem::Icd11, "osteo", None).len(), 2);
        let limited = index.search(CodeSystem::Icd11, "osteo", Some(1));
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].entry.code, "FA00");
        assert!(index.search(CodeSystem::Icd11, "   ", None).is_empty());
        assert!(index.search(CodeSystem::Icd11, "osteo", Some(0)).is_empty());
        assert_eq!(effective_limit(Some(10_000)), MAX_SEARCH_LIMIT);
        assert_eq!(effective_limit(None), DEFAULT_SEARCH_LIMIT);
    }

    #[test]
    fn search_is_idempotent() {
        let index = sample_index();
        let first = index.search(CodeSystem::Namaste, "a", None);
        let second = index.search(CodeSystem::Namaste, "a", None);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn mappings_are_ranked_deterministically() {
        let index = sample_index();
        let ranked: Vec<(String, MappingType)> = index
            .mappings_for("AY002")
            .into_iter()
            .map(|m| (m.icd_code, m.mapping_type))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("XM9".to_string(), MappingType::Narrower),
                ("FA00".to_string(), MappingType::Broader),
                ("FA01".to_string(), MappingType::Broader),
            ]
        );
        assert!(index.mappings_for("AY999").is_empty());
        assert!(index.mappings_for("NOPE").is_empty());
    }

    #[test]
    fn load_rejects_unknown_mapping_code_and_keeps_previous_index() {
        let index = sample_index();
        let before = index.stats();

        let err = index
            .load(
                sample_entries(),
                vec![mapping("AY001", "QQ42", MappingType::Exact, 0.9)],
            )
            .expect_err("unknown ICD code");
        match err {
            CoreError::Validation { field, .. } => assert_eq!(field, "mappings[0].icdCode"),
            other => panic!("expected Validation, got {other:?}"),
        }

        assert_eq!(index.stats(), before);
        assert_eq!(index.mappings_for("AY001").len(), 1);
    }

    #[test]
    fn load_rejects_cross_system_mapping() {
        let err = IndexSnapshot::build(
            sample_entries(),
            vec![mapping("XM9", "XM9", MappingType::Exact, 0.9)],
        )
        .expect_err("XM9 is not a NAMASTE code");
        match err {
            CoreError::Validation { field, message } => {
                assert_eq!(field, "mappings[0].namasteCode");
                assert!(message.contains("ICD11"), "{message}");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn load_rejects_duplicates_and_blanks() {
        let mut entries = sample_entries();
        entries.push(entry(CodeSystem::Namaste, "AY001", "Again", &[]));
        let err = IndexSnapshot::build(entries, Vec::new()).expect_err("duplicate code");
        assert!(matches!(err, CoreError::Validation { field, .. } if field == "entries[7].code"));

        let err = IndexSnapshot::build(
            vec![entry(CodeSystem::Icd11, "XM9", "   ", &[])],
            Vec::new(),
        )
        .expect_err("blank display name");
        assert!(matches!(err, CoreError::Validation { field, .. } if field == "entries[0].displayName"));

        let err = IndexSnapshot::build(
            sample_entries(),
            vec![
                mapping("AY001", "XM9", MappingType::Exact, 0.9),
                mapping("AY001", "XM9", MappingType::Partial, 0.2),
            ],
        )
        .expect_err("duplicate pair");
        assert!(matches!(err, CoreError::Validation { field, .. } if field == "mappings[1]"));
    }

    #[test]
    fn readers_see_whole_snapshots_during_reload() {
        let index = sample_index();
        let alternate_entries = vec![
            entry(CodeSystem::Namaste, "AY001", "Vata imbalance", &[]),
            entry(CodeSystem::Icd11, "ZZ1", "Replacement code", &[]),
        ];

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for round in 0..200 {
                    if round % 2 == 0 {
                        index
                            .load(
                                alternate_entries.clone(),
                                vec![mapping("AY001", "ZZ1", MappingType::Exact, 0.9)],
                            )
                            .expect("alternate loads");
                    } else {
                        index
                            .load(
                                sample_entries(),
                                vec![mapping("AY001", "XM9", MappingType::Exact, 0.95)],
                            )
                            .expect("sample loads");
                    }
                }
            });

            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        let snapshot = index.snapshot();
                        for m in snapshot.mappings_for("AY001") {
                            assert!(
                                snapshot.lookup(CodeSystem::Icd11, &m.icd_code).is_some(),
                                "mapping target {} missing from its own snapshot",
                                m.icd_code
                            );
                        }
                    }
                });
            }
        });
    }
}
