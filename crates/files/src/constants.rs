//! Directory names used inside the storage root.

/// Directory holding committed objects.
pub const OBJECTS_FOLDER_NAME: &str = "objects";

/// Directory holding in-flight writes before they are linked into place.
pub const TMP_FOLDER_NAME: &str = ".tmp";

/// Hash algorithm label recorded in object metadata.
pub(crate) const HASH_ALGORITHM: &str = "sha256";
