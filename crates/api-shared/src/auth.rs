/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the practitioner identity established by the upstream auth layer.
pub const PRACTITIONER_REF_HEADER: &str = "x-practitioner-ref";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing x-api-key header")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,
}

/// Validates the provided API key against the key configured at startup.
///
/// Returns `Ok(())` if the key is valid, or an error if invalid or missing.
pub fn validate_api_key(expected_key: &str, provided_key: Option<&str>) -> Result<(), AuthError> {
    let provided_key = provided_key.ok_or(AuthError::MissingApiKey)?;

    if provided_key == expected_key {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_key() {
        assert_eq!(validate_api_key("s3cret", Some("s3cret")), Ok(()));
    }

    #[test]
    fn rejects_missing_or_wrong_key() {
        assert_eq!(
            validate_api_key("s3cret", None),
            Err(AuthError::MissingApiKey)
        );
        assert_eq!(
            validate_api_key("s3cret", Some("guess")),
            Err(AuthError::InvalidApiKey)
        );
    }
}
