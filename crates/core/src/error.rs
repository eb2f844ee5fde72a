use fhir::{FhirError, IntegrityViolation};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("bundle {0} already exists")]
    Conflict(String),
    #[error("generated bundle failed integrity check: {0}")]
    Integrity(#[source] IntegrityViolation),

    #[error("storage failure: {0}")]
    Storage(namaste_files::FilesError),
    #[error("storage lock poisoned")]
    LockPoisoned,
    #[error("stored bundle {id} is unreadable: {message}")]
    CorruptRecord { id: String, message: String },
    #[error("failed to read terminology file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize bundle: {0}")]
    Serialization(String),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Boundary parse failures are the caller's fault; rendering failures are ours.
impl From<FhirError> for CoreError {
    fn from(err: FhirError) -> Self {
        match err {
            FhirError::Schema { path, message } => CoreError::Validation {
                field: path,
                message,
            },
            FhirError::InvalidInput(message) => CoreError::Validation {
                field: "resourceType".into(),
                message,
            },
            FhirError::Translation(message) => CoreError::Serialization(message),
        }
    }
}

impl From<namaste_files::FilesError> for CoreError {
    fn from(err: namaste_files::FilesError) -> Self {
        match err {
            namaste_files::FilesError::AlreadyExists(key) => CoreError::Conflict(key),
            namaste_files::FilesError::InvalidKey(e) => CoreError::validation("id", e.to_string()),
            other => CoreError::Storage(other),
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_errors_become_validation_with_path() {
        let err: CoreError = FhirError::Schema {
            path: "entry[1].resource.subject".into(),
            message: "invalid type".into(),
        }
        .into();
        match err {
            CoreError::Validation { field, .. } => assert_eq!(field, "entry[1].resource.subject"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn already_exists_becomes_conflict() {
        let err: CoreError = namaste_files::FilesError::AlreadyExists("abc".into()).into();
        assert!(matches!(err, CoreError::Conflict(id) if id == "abc"));
    }

    #[test]
    fn io_failures_stay_storage_errors() {
        let err: CoreError =
            namaste_files::FilesError::Io(std::io::Error::other("disk full")).into();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
