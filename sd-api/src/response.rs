//! Server response envelopes.
//!
//! Different server route groups wrap their payloads differently. Every
//! response body is classified into one [`ResponseShape`] and reduced to the
//! bare payload the caller asked for.

use serde_json::{Map, Value};

use sd_core::error::{SdError, SdResult};

const DEFAULT_FAILURE_MESSAGE: &str = "request failed";

/// The envelope shapes the server is known to use.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// `{ "code": 200, "message": "...", "data": ... }`
    Coded {
        code: i64,
        message: Option<String>,
        data: Option<Value>,
    },
    /// `{ "success": true, "data": ... }`
    Flagged {
        success: bool,
        message: Option<String>,
        data: Option<Value>,
    },
    /// `{ "message": "...", "data": ... }`, used by the live-room routes.
    Messaged { data: Value },
    /// `{ "message": "...", "room_id": "..." }`: exactly one field beside the message.
    MessageWith(Map<String, Value>),
    /// Anything else.
    Raw(Value),
}

impl ResponseShape {
    /// Classify a response body.
    pub fn classify(body: Value) -> Self {
        let Value::Object(mut map) = body else {
            return ResponseShape::Raw(body);
        };

        if map.contains_key("code") {
            let code = map.get("code").and_then(Value::as_i64).unwrap_or_default();
            return ResponseShape::Coded {
                code,
                message: take_message(&mut map),
                data: map.remove("data"),
            };
        }

        if let Some(flag) = map.get("success") {
            let success = flag.as_bool().unwrap_or(false);
            return ResponseShape::Flagged {
                success,
                message: take_message(&mut map),
                data: map.remove("data"),
            };
        }

        if map.contains_key("message") {
            if let Some(data) = map.remove("data") {
                return ResponseShape::Messaged { data };
            }
            if map.len() == 2 {
                map.remove("message");
                return ResponseShape::MessageWith(map);
            }
        }

        ResponseShape::Raw(Value::Object(map))
    }

    /// Reduce to the payload, or the failure the envelope reports.
    pub fn into_payload(self) -> SdResult<Value> {
        match self {
            ResponseShape::Coded { code: 200, data, .. } => Ok(match data {
                Some(Value::Null) | None => Value::Object(Map::new()),
                Some(data) => data,
            }),
            ResponseShape::Coded { message, .. } => Err(failure(message)),
            ResponseShape::Flagged {
                success: true,
                data,
                ..
            } => Ok(data.unwrap_or(Value::Null)),
            ResponseShape::Flagged { message, .. } => Err(failure(message)),
            ResponseShape::Messaged { data } => Ok(data),
            ResponseShape::MessageWith(rest) => Ok(Value::Object(rest)),
            ResponseShape::Raw(body) => Ok(body),
        }
    }
}

fn take_message(map: &mut Map<String, Value>) -> Option<String> {
    map.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn failure(message: Option<String>) -> SdError {
    SdError::Api(message.unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()))
}

/// Normalize a successful response body into its payload.
pub fn unwrap_payload(body: Value) -> SdResult<Value> {
    ResponseShape::classify(body).into_payload()
}

/// Human-readable message from an error response body.
///
/// Prefers `message`, then `error` (with `details` appended when present).
pub fn error_message(body: &Value) -> Option<String> {
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    let error = body.get("error").and_then(Value::as_str)?;
    match body.get("details").and_then(Value::as_str) {
        Some(details) => Some(format!("{error}: {details}")),
        None => Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coded_success() {
        let body = json!({ "code": 200, "message": "ok", "data": { "id": 1 } });
        assert_eq!(unwrap_payload(body).unwrap(), json!({ "id": 1 }));
    }

    #[test]
    fn test_coded_success_without_data_is_empty_object() {
        let body = json!({ "code": 200, "message": "ok" });
        assert_eq!(unwrap_payload(body).unwrap(), json!({}));
    }

    #[test]
    fn test_coded_failure() {
        let body = json!({ "code": 4001, "message": "room full" });
        let err = unwrap_payload(body).unwrap_err();
        assert!(matches!(err, SdError::Api(ref m) if m == "room full"));

        let err = unwrap_payload(json!({ "code": 500 })).unwrap_err();
        assert!(matches!(err, SdError::Api(ref m) if m == "request failed"));
    }

    #[test]
    fn test_flagged() {
        assert_eq!(
            unwrap_payload(json!({ "success": true, "data": [1, 2] })).unwrap(),
            json!([1, 2])
        );
        let err = unwrap_payload(json!({ "success": false, "message": "nope" })).unwrap_err();
        assert!(matches!(err, SdError::Api(ref m) if m == "nope"));
    }

    #[test]
    fn test_messaged_extra_fields_are_dropped() {
        let body = json!({ "message": "獲取成功", "data": [{ "id": "r1" }], "total": 1 });
        assert_eq!(unwrap_payload(body).unwrap(), json!([{ "id": "r1" }]));
    }

    #[test]
    fn test_message_with_single_field() {
        let body = json!({ "message": "joined", "room_id": "r1" });
        assert_eq!(unwrap_payload(body).unwrap(), json!({ "room_id": "r1" }));
    }

    #[test]
    fn test_other_bodies_pass_through() {
        let body = json!({ "message": "a", "x": 1, "y": 2 });
        assert_eq!(unwrap_payload(body.clone()).unwrap(), body);
        assert_eq!(unwrap_payload(json!([1])).unwrap(), json!([1]));
        assert_eq!(unwrap_payload(Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(&json!({ "message": "bad token" })).as_deref(),
            Some("bad token")
        );
        assert_eq!(
            error_message(&json!({ "error": "直播間不存在", "details": "record not found" }))
                .as_deref(),
            Some("直播間不存在: record not found")
        );
        assert_eq!(error_message(&json!({ "status": 1 })), None);
    }
}
