//! OCPP-J message framing
//!
//! - **Call**       `[2, "<uniqueId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<uniqueId>", {<payload>}]`
//! - **CallError**  `[4, "<uniqueId>", "<errorCode>", "<errorDescription>", {<errorDetails>}]`

use serde_json::{json, Value};
use thiserror::Error;

const MSG_TYPE_CALL: u64 = 2;
const MSG_TYPE_CALL_RESULT: u64 = 3;
const MSG_TYPE_CALL_ERROR: u64 = 4;

/// A parsed OCPP-J frame
#[derive(Debug, Clone, PartialEq)]
pub enum OcppFrame {
    Call {
        unique_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        unique_id: String,
        payload: Value,
    },
    CallError {
        unique_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

/// Errors raised while decoding an incoming frame
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Frame is not a JSON array")]
    NotAnArray,

    #[error("Message type is missing or not a number")]
    InvalidMessageType,

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u64),

    #[error("Expected at least {expected} fields, got {got}")]
    MissingFields { expected: usize, got: usize },

    #[error("Field type mismatch: {0}")]
    FieldTypeMismatch(&'static str),
}

impl OcppFrame {
    pub fn call(unique_id: impl Into<String>, action: impl Into<String>, payload: Value) -> Self {
        Self::Call {
            unique_id: unique_id.into(),
            action: action.into(),
            payload,
        }
    }

    pub fn result(unique_id: impl Into<String>, payload: Value) -> Self {
        Self::CallResult {
            unique_id: unique_id.into(),
            payload,
        }
    }

    pub fn error(
        unique_id: impl Into<String>,
        error_code: impl Into<String>,
        error_description: impl Into<String>,
    ) -> Self {
        Self::CallError {
            unique_id: unique_id.into(),
            error_code: error_code.into(),
            error_description: error_description.into(),
            error_details: json!({}),
        }
    }

    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let fields = value.as_array().ok_or(FrameError::NotAnArray)?;

        let msg_type = fields
            .first()
            .and_then(Value::as_u64)
            .ok_or(FrameError::InvalidMessageType)?;

        let required = match msg_type {
            MSG_TYPE_CALL | MSG_TYPE_CALL_ERROR => 4,
            MSG_TYPE_CALL_RESULT => 3,
            other => return Err(FrameError::UnknownMessageType(other)),
        };
        if fields.len() < required {
            return Err(FrameError::MissingFields {
                expected: required,
                got: fields.len(),
            });
        }

        let unique_id = text_field(&fields[1], "uniqueId must be a string")?;

        Ok(match msg_type {
            MSG_TYPE_CALL => Self::Call {
                unique_id,
                action: text_field(&fields[2], "action must be a string")?,
                payload: fields[3].clone(),
            },
            MSG_TYPE_CALL_RESULT => Self::CallResult {
                unique_id,
                payload: fields[2].clone(),
            },
            _ => Self::CallError {
                unique_id,
                error_code: fields[2].as_str().unwrap_or("GenericError").to_string(),
                error_description: fields[3].as_str().unwrap_or_default().to_string(),
                error_details: fields.get(4).cloned().unwrap_or_else(|| json!({})),
            },
        })
    }

    /// Encode as a text frame.
    pub fn serialize(&self) -> String {
        let fields = match self {
            Self::Call {
                unique_id,
                action,
                payload,
            } => json!([MSG_TYPE_CALL, unique_id, action, payload]),
            Self::CallResult { unique_id, payload } => {
                json!([MSG_TYPE_CALL_RESULT, unique_id, payload])
            }
            Self::CallError {
                unique_id,
                error_code,
                error_description,
                error_details,
            } => json!([
                MSG_TYPE_CALL_ERROR,
                unique_id,
                error_code,
                error_description,
                error_details
            ]),
        };
        fields.to_string()
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Call { unique_id, .. }
            | Self::CallResult { unique_id, .. }
            | Self::CallError { unique_id, .. } => unique_id,
        }
    }
}

fn text_field(value: &Value, mismatch: &'static str) -> Result<String, FrameError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(FrameError::FieldTypeMismatch(mismatch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_call_result_from_central_system() {
        let text = r#"[3,"19223201",{"status":"Accepted","currentTime":"2024-01-01T00:00:00Z","interval":300}]"#;
        match OcppFrame::parse(text).unwrap() {
            OcppFrame::CallResult { unique_id, payload } => {
                assert_eq!(unique_id, "19223201");
                assert_eq!(payload["interval"], 300);
            }
            other => panic!("Expected CallResult, got {:?}", other),
        }
    }

    #[test]
    fn parse_server_initiated_call() {
        let text = r#"[2,"cs-1","ChangeAvailability",{"connectorId":1,"type":"Inoperative"}]"#;
        let frame = OcppFrame::parse(text).unwrap();
        assert_eq!(
            frame,
            OcppFrame::call(
                "cs-1",
                "ChangeAvailability",
                json!({"connectorId": 1, "type": "Inoperative"})
            )
        );
    }

    #[test]
    fn parse_call_error_without_details() {
        let frame = OcppFrame::parse(r#"[4,"x","NotImplemented","nope"]"#).unwrap();
        match frame {
            OcppFrame::CallError {
                error_code,
                error_description,
                error_details,
                ..
            } => {
                assert_eq!(error_code, "NotImplemented");
                assert_eq!(error_description, "nope");
                assert_eq!(error_details, json!({}));
            }
            other => panic!("Expected CallError, got {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(OcppFrame::parse("{}"), Err(FrameError::NotAnArray)));
        assert!(matches!(OcppFrame::parse("[]"), Err(FrameError::InvalidMessageType)));
        assert!(matches!(OcppFrame::parse("[9,\"a\"]"), Err(FrameError::UnknownMessageType(9))));
        assert!(matches!(
            OcppFrame::parse(r#"[2,"a","Heartbeat"]"#),
            Err(FrameError::MissingFields { expected: 4, got: 3 })
        ));
        assert!(matches!(
            OcppFrame::parse(r#"[2,7,"Heartbeat",{}]"#),
            Err(FrameError::FieldTypeMismatch(_))
        ));
        assert!(matches!(OcppFrame::parse("not json"), Err(FrameError::InvalidJson(_))));
    }

    #[test]
    fn serialize_call_is_compact_array() {
        let frame = OcppFrame::call("id1", "Heartbeat", json!({}));
        assert_eq!(frame.serialize(), r#"[2,"id1","Heartbeat",{}]"#);
    }

    #[test]
    fn serialize_error_response() {
        let frame = OcppFrame::error("id3", "NotImplemented", "Unknown action");
        let parsed = OcppFrame::parse(&frame.serialize()).unwrap();
        assert_eq!(parsed, frame);
        assert_eq!(parsed.unique_id(), "id3");
    }
}
