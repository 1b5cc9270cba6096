use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldError, RelayError};

pub use crate::error::FieldError as ErrorFieldEntry;

/// The error body nested under `message.error`, bit-exact with the wire envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub paths: Vec<FieldError>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    #[serde(rename = "ACK")]
    Ack,
    #[serde(rename = "NACK")]
    Nack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub status: AckStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub ack: Ack,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// The response envelope every core endpoint emits, always JSON with
/// `Content-Type: application/json`. `context` is an opaque passthrough echoed
/// verbatim from the incoming request's context object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub context: Value,
    pub message: Message,
}

impl Envelope {
    pub fn ack(context: Value) -> Self {
        Self {
            context,
            message: Message {
                ack: Ack {
                    status: AckStatus::Ack,
                },
                error: None,
            },
        }
    }

    pub fn nack(context: Value, err: &RelayError, message_id: Option<&str>) -> Self {
        Self {
            context,
            message: Message {
                ack: Ack {
                    status: AckStatus::Nack,
                },
                error: Some(err.to_error_body(message_id)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_envelope_serializes_exactly() {
        let env = Envelope::ack(serde_json::json!({}));
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["message"]["ack"]["status"], "ACK");
        assert!(v["message"].get("error").is_none());
    }

    #[test]
    fn nack_envelope_carries_error_code() {
        let err = RelayError::NotFound("subscriber:np-9".into());
        let env = Envelope::nack(serde_json::json!({}), &err, None);
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["message"]["ack"]["status"], "NACK");
        assert_eq!(v["message"]["error"]["code"], "not-found");
    }
}
