//! Route-level results and error mapping.

use serde::Serialize;
use thiserror::Error;
use tracing::error;

use notesync_core::ErrorKind;

/// Result of one route operation.
pub type ApiResult<T> = std::result::Result<ApiResponse<T>, ApiError>;

/// Failed route operation, carrying the status code the HTTP layer returns.
#[derive(Debug, Error)]
#[error("{status} {kind}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub kind: ErrorKind,
    pub message: String,
}

/// HTTP status for each caller-facing error kind.
pub fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::ValidationError => 400,
        ErrorKind::Unauthenticated => 401,
        ErrorKind::Forbidden => 403,
        ErrorKind::NotFound => 404,
        ErrorKind::InvalidOperation => 409,
        ErrorKind::InternalError => 500,
    }
}

impl ApiError {
    /// JSON error body: `{"error": <message>, "kind": <kind>}`.
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.message,
            "kind": self.kind.as_str(),
        })
    }
}

impl From<notesync_core::Error> for ApiError {
    fn from(err: notesync_core::Error) -> Self {
        let kind = err.kind();
        let message = match kind {
            // Storage details stay in the logs.
            ErrorKind::InternalError => {
                error!(
                    subsystem = "api",
                    error_kind = %kind,
                    error = %err,
                    "Request failed with internal error"
                );
                "Internal server error".to_string()
            }
            _ => err.to_string(),
        };
        Self {
            status: status_for(kind),
            kind,
            message,
        }
    }
}

/// Successful route operation: status code plus optional JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 200 OK with a body.
    pub fn ok(body: T) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    /// 201 Created with a body.
    pub fn created(body: T) -> Self {
        Self {
            status: 201,
            body: Some(body),
        }
    }
}

impl ApiResponse<()> {
    /// 204 No Content.
    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// Serialized payload, `None` for bodiless responses.
    pub fn json(&self) -> std::result::Result<Option<serde_json::Value>, ApiError> {
        self.body
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ApiError::from(notesync_core::Error::from(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_core::Error;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::NotFound("db".into()), 404),
            (Error::Forbidden("no".into()), 403),
            (Error::Validation("bad".into()), 400),
            (Error::InvalidOperation("owner".into()), 409),
            (Error::Unauthenticated("who".into()), 401),
            (Error::Internal("boom".into()), 500),
            (Error::Config("x".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_error_body() {
        let err = ApiError::from(Error::Forbidden("not a member".into()));
        assert_eq!(
            err.body(),
            serde_json::json!({"error": "Forbidden: not a member", "kind": "Forbidden"})
        );
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = ApiError::from(Error::Internal("disk path /srv/x".into()));
        assert_eq!(err.kind, ErrorKind::InternalError);
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn test_response_constructors() {
        assert_eq!(ApiResponse::ok(1).status, 200);
        assert_eq!(ApiResponse::created("x").status, 201);
        let empty = ApiResponse::no_content();
        assert_eq!(empty.status, 204);
        assert_eq!(empty.json().unwrap(), None);
    }
}
