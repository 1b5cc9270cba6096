use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level schema validation failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

/// The tagged discriminator carried by every [`RelayError`], independent of its
/// human-readable message. The response layer switches on this, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    BadRequest,
    SchemaValidation,
    SignatureValidation,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::SchemaValidation => 400,
            ErrorKind::SignatureValidation => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::InternalServerError => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::SchemaValidation => "schema-validation",
            ErrorKind::SignatureValidation => "signature-validation",
            ErrorKind::NotFound => "not-found",
            ErrorKind::MethodNotAllowed => "method-not-allowed",
            ErrorKind::InternalServerError => "internal-server-error",
        }
    }
}

/// The unified error taxonomy propagated through the pipeline. Every plugin and step
/// returns this type; the response layer unwraps it to select an HTTP status and a
/// NACK body without ever string-matching a message.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("schema validation failed: {message}")]
    SchemaValidation {
        message: String,
        paths: Vec<FieldError>,
    },

    #[error("signature validation failed: {0}")]
    SignatureValidation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("internal server error: {0}")]
    Internal(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::BadRequest(_) => ErrorKind::BadRequest,
            RelayError::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            RelayError::SignatureValidation(_) => ErrorKind::SignatureValidation,
            RelayError::NotFound(_) => ErrorKind::NotFound,
            RelayError::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            RelayError::Internal(_) | RelayError::Config(_) | RelayError::Io(_) => {
                ErrorKind::InternalServerError
            }
            RelayError::Serde(_) => ErrorKind::BadRequest,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// The NACK error body for this failure. `message_id` is folded into `message` for
    /// correlation on every kind except schema-validation, which reports field paths instead.
    pub fn to_error_body(&self, message_id: Option<&str>) -> crate::response::ErrorBody {
        match self {
            RelayError::SchemaValidation { message, paths } => crate::response::ErrorBody {
                code: self.kind().code().to_string(),
                paths: paths.clone(),
                message: message.clone(),
            },
            other => {
                let message = match message_id {
                    Some(id) => format!("{other} (message_id={id})"),
                    None => other.to_string(),
                };
                crate::response::ErrorBody {
                    code: self.kind().code().to_string(),
                    paths: Vec::new(),
                    message,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(RelayError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(
            RelayError::SchemaValidation {
                message: "x".into(),
                paths: vec![]
            }
            .status_code(),
            400
        );
        assert_eq!(RelayError::SignatureValidation("x".into()).status_code(), 401);
        assert_eq!(RelayError::NotFound("x".into()).status_code(), 404);
        assert_eq!(RelayError::MethodNotAllowed("x".into()).status_code(), 405);
        assert_eq!(RelayError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn schema_validation_body_carries_paths_not_message_id() {
        let err = RelayError::SchemaValidation {
            message: "required field missing".into(),
            paths: vec![FieldError {
                path: "/context/action".into(),
                message: "required".into(),
            }],
        };
        let body = err.to_error_body(Some("msg-1"));
        assert_eq!(body.code, "schema-validation");
        assert_eq!(body.paths.len(), 1);
        assert!(!body.message.contains("msg-1"));
    }

    #[test]
    fn non_schema_body_folds_in_message_id() {
        let err = RelayError::SignatureValidation("missing Authorization".into());
        let body = err.to_error_body(Some("msg-42"));
        assert_eq!(body.code, "signature-validation");
        assert!(body.message.contains("msg-42"));
    }
}
