//! Response envelope returned by every upload command.
//!
//! ```json
//! {
//!   "status": { "apiCode": "600", "apiMessage": "..." },
//!   "osv": { "sequence": { "id": "42", ... } }
//! }
//! ```
//!
//! Parsing is deliberately lenient: the envelope is kept as a JSON map and
//! each accessor extracts what it needs, so a malformed `osv` section never
//! hides a readable `status`.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::status::StatusCode;

/// Parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    body: Map<String, Value>,
}

impl ApiResponse {
    /// Parses a raw body. Returns `None` for anything that is not a
    /// non-empty JSON object.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(body)) if !body.is_empty() => Some(Self { body }),
            _ => None,
        }
    }

    fn status(&self) -> Option<&Map<String, Value>> {
        self.body
            .get("status")
            .and_then(Value::as_object)
            .filter(|status| !status.is_empty())
    }

    /// Raw `status.apiCode`, accepted as a string or a JSON number.
    pub fn api_code(&self) -> Option<i64> {
        self.status()?.get("apiCode").and_then(integer_from_value)
    }

    /// Human-readable `status.apiMessage`, if present.
    pub fn api_message(&self) -> Option<&str> {
        self.status()?.get("apiMessage").and_then(Value::as_str)
    }

    /// Application status carried by this response.
    pub fn status_code(&self) -> StatusCode {
        self.api_code()
            .map(StatusCode::from_api_code)
            .unwrap_or(StatusCode::StatusIncorrect)
    }

    /// The sequence record returned by sequence creation (`osv.sequence`).
    pub fn sequence(&self) -> Option<RemoteSequence> {
        let raw = self.body.get("osv")?.get("sequence")?;
        serde_json::from_value(raw.clone()).ok()
    }
}

/// Sequence record assigned by the service.
///
/// Only `id` is interpreted; every other field is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSequence {
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reads an integer that the service may encode as a string.
pub(crate) fn integer_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    integer_from_value(&value)
        .ok_or_else(|| de::Error::custom(format!("invalid sequence id: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_non_objects() {
        assert!(ApiResponse::parse("").is_none());
        assert!(ApiResponse::parse("not json").is_none());
        assert!(ApiResponse::parse("[1,2]").is_none());
        assert!(ApiResponse::parse("{}").is_none());
        assert!(ApiResponse::parse("\"600\"").is_none());
    }

    #[test]
    fn api_code_string_and_number() {
        let resp = ApiResponse::parse(r#"{"status":{"apiCode":"600"}}"#).unwrap();
        assert_eq!(resp.api_code(), Some(600));

        let resp = ApiResponse::parse(r#"{"status":{"apiCode":660}}"#).unwrap();
        assert_eq!(resp.api_code(), Some(660));

        let resp = ApiResponse::parse(r#"{"status":{"apiCode":"six hundred"}}"#).unwrap();
        assert_eq!(resp.api_code(), None);
    }

    #[test]
    fn empty_status_container_has_no_code() {
        let resp = ApiResponse::parse(r#"{"status":{}}"#).unwrap();
        assert_eq!(resp.api_code(), None);
        assert_eq!(resp.status_code(), StatusCode::StatusIncorrect);
    }

    #[test]
    fn api_message_is_exposed() {
        let resp = ApiResponse::parse(
            r#"{"status":{"apiCode":"600","apiMessage":"processed without incidents"}}"#,
        )
        .unwrap();
        assert_eq!(resp.api_message(), Some("processed without incidents"));
    }

    #[test]
    fn sequence_keeps_extra_fields() {
        let resp = ApiResponse::parse(
            r#"{"status":{"apiCode":"600"},
                "osv":{"sequence":{"id":"42","dateAdded":"2016-05-03","address":"Cluj"}}}"#,
        )
        .unwrap();
        let seq = resp.sequence().unwrap();
        assert_eq!(seq.id, 42);
        assert_eq!(seq.extra["dateAdded"], "2016-05-03");
        assert_eq!(seq.extra["address"], "Cluj");
        assert!(!seq.extra.contains_key("id"));
    }

    #[test]
    fn sequence_with_numeric_id() {
        let resp =
            ApiResponse::parse(r#"{"status":{"apiCode":600},"osv":{"sequence":{"id":7}}}"#)
                .unwrap();
        assert_eq!(resp.sequence().map(|s| s.id), Some(7));
    }

    #[test]
    fn malformed_sequence_does_not_hide_status() {
        let resp =
            ApiResponse::parse(r#"{"status":{"apiCode":"600"},"osv":{"sequence":{"id":null}}}"#)
                .unwrap();
        assert!(resp.sequence().is_none());
        assert_eq!(resp.status_code(), StatusCode::Success);

        let resp = ApiResponse::parse(r#"{"status":{"apiCode":"600"},"osv":[]}"#).unwrap();
        assert!(resp.sequence().is_none());
    }
}
