//! Constants used throughout the NAMASTE core crate.

/// Default directory for stored bundles when no explicit directory is configured.
pub const DEFAULT_BUNDLE_DATA_DIR: &str = "bundle_data";

/// Number of search hits returned when the caller does not ask for a specific limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Upper bound on any single search, whatever limit the caller asks for.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Score reported for a hit whose display name or synonym starts with the query.
pub const PREFIX_MATCH_SCORE: f64 = 1.0;

/// Score reported for a hit that only contains the query.
pub const SUBSTRING_MATCH_SCORE: f64 = 0.5;

/// Prefix for diagnosis ids within an encounter.
pub const DIAGNOSIS_ID_PREFIX: &str = "dx";

/// Prefix for prescription ids within an encounter.
pub const PRESCRIPTION_ID_PREFIX: &str = "rx";

/// Composition title for generated documents.
pub const DOCUMENT_TITLE: &str = "Diagnosis summary";
