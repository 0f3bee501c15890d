//! Decoding of values published to chain storage.
//!
//! `vstorage data <path>` returns `{"value": "<json>"}`. The inner JSON is
//! either a stream cell `{"blockHeight": "..", "values": [..]}` whose last
//! entry is the latest write, or a single entry. Each entry is capdata
//! `{"body": "#<smallcaps>", "slots": [..]}`.

use crate::{AgdError, AgdResult};
use serde_json::Value;

/// Extract the latest published payload from `vstorage data` output.
pub fn decode_storage_value(raw: &Value) -> AgdResult<Value> {
    let text = raw
        .get("value")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AgdError::Missing("vstorage value".to_string()))?;
    let cell: Value = parse(text, "vstorage value")?;

    let entry = match cell.get("values").and_then(Value::as_array) {
        Some(values) => {
            let last = values
                .last()
                .ok_or_else(|| AgdError::Missing("stream cell values".to_string()))?;
            match last {
                Value::String(s) => parse(s, "stream cell entry")?,
                other => other.clone(),
            }
        }
        None => cell,
    };

    let body = entry
        .get("body")
        .and_then(Value::as_str)
        .ok_or_else(|| AgdError::Missing("capdata body".to_string()))?;

    match body.strip_prefix('#') {
        Some(smallcaps) => Ok(unescape_smallcaps(parse(smallcaps, "capdata body")?)),
        None => parse(body, "capdata body"),
    }
}

fn parse(text: &str, what: &str) -> AgdResult<Value> {
    serde_json::from_str(text).map_err(|e| AgdError::Decode(format!("{what}: {e}")))
}

// Only plain data is expected here; remotables stay as their `$` strings.
fn unescape_smallcaps(value: Value) -> Value {
    match value {
        Value::String(s) => match s.as_str() {
            "#undefined" | "#NaN" => Value::Null,
            _ => match s.strip_prefix('!') {
                Some(rest) => Value::String(rest.to_string()),
                None => match s.strip_prefix('+') {
                    Some(digits) if digits.chars().all(|c| c.is_ascii_digit()) => {
                        Value::String(digits.to_string())
                    }
                    _ => Value::String(s),
                },
            },
        },
        Value::Array(items) => Value::Array(items.into_iter().map(unescape_smallcaps).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, unescape_smallcaps(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stream_cell(bodies: &[&str]) -> Value {
        let values: Vec<String> = bodies
            .iter()
            .map(|b| json!({ "body": b, "slots": [] }).to_string())
            .collect();
        json!({ "value": json!({ "blockHeight": "88", "values": values }).to_string() })
    }

    #[test]
    fn takes_latest_stream_entry() {
        let raw = stream_cell(&[
            r##"#{"endoZipBase64Sha512":"old","error":null,"installed":true}"##,
            r##"#{"endoZipBase64Sha512":"new","error":null,"installed":true}"##,
        ]);
        let value = decode_storage_value(&raw).unwrap();
        assert_eq!(value["endoZipBase64Sha512"], "new");
        assert_eq!(value["installed"], true);
        assert!(value["error"].is_null());
    }

    #[test]
    fn unescapes_smallcaps_strings() {
        let raw = stream_cell(&[r##"#{"note":"!#literal","amount":"+25","gone":"#undefined"}"##]);
        let value = decode_storage_value(&raw).unwrap();
        assert_eq!(value["note"], "#literal");
        assert_eq!(value["amount"], "25");
        assert!(value["gone"].is_null());
    }

    #[test]
    fn accepts_single_entry_without_stream_cell() {
        let entry = json!({ "body": r#"{"installed":false}"#, "slots": [] }).to_string();
        let value = decode_storage_value(&json!({ "value": entry })).unwrap();
        assert_eq!(value["installed"], false);
    }

    #[test]
    fn empty_value_is_missing() {
        let err = decode_storage_value(&json!({ "value": "" })).unwrap_err();
        assert!(matches!(err, AgdError::Missing(_)));
    }
}
