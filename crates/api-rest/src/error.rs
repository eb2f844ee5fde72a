//! Error → HTTP response mapping.

use api_shared::{AuthError, ErrorRes};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use namaste_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("invalid request body at {field}: {message}")]
    Body { field: String, message: String },

    #[error("API key is not configured")]
    ApiKeyNotConfigured,

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<String>) {
        match self {
            ApiError::Core(CoreError::Validation { field, message }) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message.clone(),
                Some(field.clone()),
            ),
            ApiError::Body { field, message } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message.clone(),
                Some(field.clone()),
            ),
            ApiError::Core(CoreError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found", self.to_string(), None)
            }
            ApiError::Core(CoreError::Conflict(_)) => {
                (StatusCode::CONFLICT, "conflict", self.to_string(), None)
            }
            ApiError::Auth(_) | ApiError::MissingHeader(_) => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                self.to_string(),
                None,
            ),
            ApiError::Core(CoreError::Integrity(_))
            | ApiError::Core(CoreError::Storage(_))
            | ApiError::Core(CoreError::LockPoisoned)
            | ApiError::Core(CoreError::CorruptRecord { .. })
            | ApiError::Core(CoreError::FileRead(_))
            | ApiError::Core(CoreError::Serialization(_))
            | ApiError::ApiKeyNotConfigured
            | ApiError::Task(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, field) = self.parts();
        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), "{}", self);
        }
        let body = ErrorRes {
            error: error.to_string(),
            message,
            field,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_core_errors_to_statuses() {
        let cases = [
            (
                ApiError::from(CoreError::validation("entry[0].fullUrl", "empty")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(CoreError::not_found("bundle", "abc")),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(CoreError::Conflict("abc".into())),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(CoreError::Integrity(fhir::IntegrityViolation::EmptyBundle)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(AuthError::InvalidApiKey),
                StatusCode::UNAUTHORIZED,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.parts().0, expected, "{err}");
        }
    }

    #[test]
    fn validation_errors_carry_field() {
        let (_, kind, _, field) =
            ApiError::from(CoreError::validation("entry[2].resource.subject", "dangling")).parts();
        assert_eq!(kind, "validation_error");
        assert_eq!(field.as_deref(), Some("entry[2].resource.subject"));
    }

    #[test]
    fn internal_errors_hide_details() {
        let (_, kind, message, field) = ApiError::from(CoreError::CorruptRecord {
            id: "abc".into(),
            message: "/srv/bundle_data/objects/...".into(),
        })
        .parts();
        assert_eq!(kind, "internal_error");
        assert_eq!(message, "Internal server error");
        assert!(field.is_none());
    }
}
