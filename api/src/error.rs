use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// API error taxonomy. Every failure a handler can produce maps onto one
/// of these kinds, and every kind has exactly one status code.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No verified principal on the request
    #[error("{0}")]
    Unauthenticated(String),

    /// A verified principal that this route or entity refuses
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Malformed or rule-violating input
    #[error("{0}")]
    Validation(String),

    /// The request conflicts with existing state
    #[error("{0}")]
    Conflict(String),

    /// An upstream dependency (geocoder, SMTP) failed or timed out
    #[error("{0}")]
    UpstreamFailure(String),

    /// Unexpected failure; the detail is logged, never sent to the client
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    /// The standard 401 used by the authentication gate
    pub fn unauthenticated() -> Self {
        ApiError::Unauthenticated("Not authorized to access this route".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error envelope sent to clients
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(detail) => error!("Internal error: {}", detail),
            ApiError::UpstreamFailure(detail) => error!("Upstream failure: {}", detail),
            _ => {}
        }

        let body = ApiErrorBody {
            success: false,
            error: self.to_string(),
        };

        (self.status_code(), Json(body)).into_response()
    }
}

impl From<database::DatabaseError> for ApiError {
    fn from(err: database::DatabaseError) -> Self {
        use database::DatabaseError;

        match err {
            // The payload already names the entity and id
            DatabaseError::EntityNotFound(detail) => {
                ApiError::NotFound(format!("Resource not found: {}", detail))
            }
            DatabaseError::UniqueViolation(_) => {
                ApiError::Conflict("Duplicate field value entered".to_string())
            }
            DatabaseError::UnknownField(_) | DatabaseError::Validation(_) => {
                ApiError::Validation(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<authz::AuthzError> for ApiError {
    fn from(err: authz::AuthzError) -> Self {
        use authz::AuthzError;

        match err {
            AuthzError::RoleDenied { .. } | AuthzError::NotOwner { .. } => {
                ApiError::Forbidden(err.to_string())
            }
            // A role string that fails to parse came from storage, not the client
            AuthzError::InvalidRole(role) => {
                ApiError::Internal(format!("Account carries unknown role '{}'", role))
            }
        }
    }
}

impl From<user::UserError> for ApiError {
    fn from(err: user::UserError) -> Self {
        use user::UserError;

        match err {
            UserError::InvalidCredentials => {
                ApiError::Unauthenticated("Invalid credentials".to_string())
            }
            UserError::UserNotFound(id) => {
                ApiError::NotFound(format!("Resource not found with id of {}", id))
            }
            UserError::DuplicateEmail => {
                ApiError::Conflict("Duplicate field value entered".to_string())
            }
            UserError::InvalidToken => ApiError::Validation("Invalid token".to_string()),
            UserError::Mail(_) => {
                ApiError::UpstreamFailure("Email could not be sent".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("Serialization error: {}", err))
    }
}

impl From<uploads::UploadError> for ApiError {
    fn from(err: uploads::UploadError) -> Self {
        use uploads::UploadError;

        match err {
            UploadError::MissingFile | UploadError::NotAnImage | UploadError::TooLarge(_) => {
                ApiError::Validation(err.to_string())
            }
            UploadError::Io(_) => ApiError::Internal(err.to_string()),
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::unauthenticated().status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Conflict("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::UpstreamFailure("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_stays_out_of_the_message() {
        let err = ApiError::Internal("connection pool exhausted".to_string());
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn test_database_error_mapping() {
        let err: ApiError = database::DatabaseError::EntityNotFound("abc".to_string()).into();
        assert!(matches!(&err, ApiError::NotFound(m) if m.contains("abc")));

        let err: ApiError = database::DatabaseError::UnknownField("wat".to_string()).into();
        assert!(matches!(err, ApiError::Validation(_)));

        let err: ApiError =
            database::DatabaseError::UniqueViolation("owner_unique".to_string()).into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn test_authz_error_mapping() {
        let err: ApiError = authz::AuthzError::RoleDenied {
            role: "user".to_string(),
        }
        .into();
        assert!(matches!(&err, ApiError::Forbidden(m) if m.contains("user")));

        let err: ApiError = authz::AuthzError::InvalidRole("root".to_string()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn test_user_error_mapping() {
        let err: ApiError = user::UserError::InvalidCredentials.into();
        assert_eq!(err.to_string(), "Invalid credentials");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err: ApiError = user::UserError::Mail("smtp down".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Email could not be sent");
    }
}
