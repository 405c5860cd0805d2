//! Data API response envelope handling.
//!
//! Every response body looks like
//! `{"response": {...}, "messages": [{"code": "0", "message": "OK"}]}`.
//! The envelope code is independent of the HTTP status.

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{AuthError, Error, ProtocolError, RemoteError};
use crate::record::{Record, RecordId, RecordSet};

/// Success.
pub const CODE_OK: u32 = 0;
/// "No records match the request"; reads treat it as an empty result.
pub const CODE_NO_RECORDS: u32 = 401;
/// Invalid or expired session token.
pub const CODE_INVALID_TOKEN: u32 = 952;

/// Decode a response body. An empty body decodes to `{}`.
pub fn decode_body(bytes: &[u8], status: u16) -> Result<Value, Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|e| {
        ProtocolError::new(status, Some(format!("response is not valid JSON: {}", e))).into()
    })
}

/// The first envelope message as `(code, message)`, if any.
///
/// Codes arrive as strings (`"0"`) from current servers; numbers are accepted.
pub fn message(body: &Value) -> Option<(u32, String)> {
    let first = body.get("messages")?.as_array()?.first()?;
    let code = match first.get("code")? {
        Value::String(s) => s.trim().parse().ok()?,
        Value::Number(n) => u32::try_from(n.as_u64()?).ok()?,
        _ => return None,
    };
    let text = first
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some((code, text))
}

/// Whether the envelope carries a non-zero code.
pub fn has_error_code(body: &Value) -> bool {
    message(body).is_some_and(|(code, _)| code != CODE_OK)
}

/// Whether the envelope reports an empty find.
pub fn is_no_records(body: &Value) -> bool {
    message(body).is_some_and(|(code, _)| code == CODE_NO_RECORDS)
}

/// Turn a non-zero envelope code into an error.
///
/// `payload` is the request body or parameters that were sent; it is attached
/// to [`RemoteError`] for diagnostics.
pub fn check_status(body: &Value, payload: &Value) -> Result<(), Error> {
    match message(body) {
        None => Ok(()),
        Some((CODE_OK, _)) => Ok(()),
        Some((CODE_INVALID_TOKEN, _)) => Err(AuthError::SessionExpired.into()),
        Some((code, text)) => {
            trace!(code, message = %text, "envelope reported an error");
            Err(RemoteError::new(code, text, payload.clone()).into())
        }
    }
}

/// Flatten `response.data` into a [`RecordSet`].
///
/// Without portals each record keeps its field data only.
pub fn to_record_set(body: &Value, include_portals: bool) -> Result<RecordSet, Error> {
    if is_no_records(body) {
        return Ok(RecordSet::new());
    }

    let data = body
        .pointer("/response/data")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing response.data array"))?;

    let mut set = RecordSet::new();
    for entry in data {
        set.insert(to_record(entry, include_portals)?);
    }
    Ok(set)
}

/// Check the envelope of a read and normalize its records.
///
/// A "no records match" code yields an empty set instead of an error.
pub fn read_record_set(
    body: &Value,
    payload: &Value,
    include_portals: bool,
) -> Result<RecordSet, Error> {
    if is_no_records(body) {
        return Ok(RecordSet::new());
    }
    check_status(body, payload)?;
    to_record_set(body, include_portals)
}

/// The id of a newly created record, from `response.recordId`.
pub fn created_record_id(body: &Value) -> Result<RecordId, Error> {
    body.pointer("/response/recordId")
        .and_then(RecordId::from_value)
        .ok_or_else(|| malformed("missing response.recordId"))
}

fn to_record(entry: &Value, include_portals: bool) -> Result<Record, Error> {
    let id = entry
        .get("recordId")
        .and_then(RecordId::from_value)
        .ok_or_else(|| malformed("record without recordId"))?;

    let fields = entry
        .get("fieldData")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mod_id = entry.get("modId").and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    let portal_data = if include_portals {
        Some(
            entry
                .get("portalData")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        )
    } else {
        None
    };

    Ok(Record {
        id,
        mod_id,
        fields,
        portal_data,
    })
}

fn malformed(what: &str) -> Error {
    ProtocolError::new(200, Some(format!("malformed Data API response: {}", what))).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteErrorKind;
    use serde_json::json;

    fn two_records() -> Value {
        json!({
            "response": {
                "data": [
                    {"recordId": "3", "modId": "1", "fieldData": {"id": "a"},
                     "portalData": {"orders": [{"recordId": "9"}]}},
                    {"recordId": "7", "modId": "2", "fieldData": {"id": "b"},
                     "portalData": {}}
                ]
            },
            "messages": [{"code": "0", "message": "OK"}]
        })
    }

    #[test]
    fn empty_body_decodes_to_object() {
        assert_eq!(decode_body(b"", 200).unwrap(), json!({}));
        assert_eq!(decode_body(b"  \n", 200).unwrap(), json!({}));
        assert!(matches!(
            decode_body(b"<html>", 502),
            Err(Error::Protocol(ProtocolError { status: 502, .. }))
        ));
    }

    #[test]
    fn message_code_string_or_number() {
        assert_eq!(
            message(&json!({"messages": [{"code": "102", "message": "Field is missing"}]})),
            Some((102, "Field is missing".to_string()))
        );
        assert_eq!(
            message(&json!({"messages": [{"code": 0}]})),
            Some((0, String::new()))
        );
        assert_eq!(message(&json!({})), None);
    }

    #[test]
    fn check_status_classifies_codes() {
        let payload = json!({"query": [{"nope": "=1"}]});
        assert!(check_status(&json!({}), &payload).is_ok());
        assert!(check_status(&two_records(), &payload).is_ok());

        let expired = check_status(&json!({"messages": [{"code": "952"}]}), &payload);
        assert!(matches!(expired, Err(Error::Auth(AuthError::SessionExpired))));

        let missing = check_status(
            &json!({"messages": [{"code": "102", "message": "Field is missing"}]}),
            &payload,
        )
        .unwrap_err();
        match missing {
            Error::Remote(err) => {
                assert_eq!(err.code, 102);
                assert_eq!(err.kind, RemoteErrorKind::FieldMissing);
                assert_eq!(err.payload(), &payload);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn record_set_keyed_by_record_id() {
        let set = to_record_set(&two_records(), false).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.keys(), vec![RecordId::new(3), RecordId::new(7)]);
        let first = set.get(RecordId::new(3)).unwrap();
        assert_eq!(first.get("id"), Some(&json!("a")));
        assert!(first.portal_data.is_none());
    }

    #[test]
    fn field_names_follow_response_order() {
        let raw = r#"{"response": {"data": [
            {"recordId": "1", "modId": "0", "fieldData": {"zeta": 1, "id": "x", "alpha": 2}}
        ]}, "messages": [{"code": "0"}]}"#;
        let body = decode_body(raw.as_bytes(), 200).unwrap();
        let set = to_record_set(&body, false).unwrap();
        assert_eq!(
            set.first().unwrap().field_names(),
            vec!["zeta".to_string(), "id".to_string(), "alpha".to_string()]
        );
    }

    #[test]
    fn portals_retained_when_requested() {
        let set = to_record_set(&two_records(), true).unwrap();
        let first = set.get(RecordId::new(3)).unwrap();
        assert_eq!(first.mod_id.as_deref(), Some("1"));
        assert!(first.portal_data.as_ref().unwrap().contains_key("orders"));
    }

    #[test]
    fn no_records_code_is_empty_set() {
        let body = json!({"response": {}, "messages": [{"code": "401", "message": "No records match the request"}]});
        assert!(read_record_set(&body, &json!({}), false).unwrap().is_empty());
        assert!(check_status(&body, &json!({})).is_err());
    }

    #[test]
    fn created_id_from_response() {
        let body = json!({"response": {"recordId": "42", "modId": "0"}, "messages": [{"code": "0"}]});
        assert_eq!(created_record_id(&body).unwrap(), RecordId::new(42));
        assert!(created_record_id(&json!({"response": {}})).is_err());
    }
}
