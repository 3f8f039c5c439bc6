//! Request body extraction: content type, JSON decode, shape and emptiness checks.

use serde_json::Value;

use super::domain::{InboundRequest, KeyValue};
use crate::errors::KvError;

const PAIR_LIST_MESSAGE: &str =
    "Invalid input, only a list of dictionaries, each containing 'key' and 'value' entries, is accepted in the JSON payload.";

/// Top-level JSON shapes an operation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Object,
    Array,
    /// Array whose elements are objects with `key` (string) and `value` members.
    KeyValueArray,
    StringArray,
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Object => "object",
            Shape::Array => "array",
            Shape::KeyValueArray => "array of {key, value} objects",
            Shape::StringArray => "array of strings",
        }
    }

    fn matches(&self, v: &Value) -> bool {
        match (self, v) {
            (Shape::Object, Value::Object(_)) => true,
            (Shape::Array, Value::Array(_)) => true,
            (Shape::KeyValueArray, Value::Array(items)) => items.iter().all(|item| {
                item.as_object()
                    .is_some_and(|o| o.get("key").is_some_and(Value::is_string) && o.contains_key("value"))
            }),
            (Shape::StringArray, Value::Array(items)) => items.iter().all(Value::is_string),
            _ => false,
        }
    }
}

/// `application/json` or `application/*+json`, with or without parameters.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else { return false };
    let essence = ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let Some(subtype) = essence.strip_prefix("application/") else { return false };
    subtype == "json" || (subtype.len() > "+json".len() && subtype.ends_with("+json"))
}

fn is_empty_json(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(o) => o.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Decode the body and check it against `expected`.
///
/// Never touches the store; every failure here is a client error.
pub fn extract(req: &InboundRequest, expected: &[Shape]) -> Result<Value, KvError> {
    if !is_json_content_type(req.content_type.as_deref()) {
        return Err(KvError::RequestFormat(
            "Invalid request. The HTTP Content-Type Header must indicate 'application/json'.".into(),
        ));
    }
    let value: Value = serde_json::from_slice(&req.body)
        .map_err(|_| KvError::ValueFormat("Invalid input, payload cannot be decoded as valid JSON.".into()))?;
    if value.is_null() {
        return Err(KvError::ValueFormat("Invalid input, JSON payload is empty.".into()));
    }
    if !expected.iter().any(|s| s.matches(&value)) {
        if expected.contains(&Shape::KeyValueArray) && value.is_array() {
            return Err(KvError::ValueFormat(PAIR_LIST_MESSAGE.into()));
        }
        let names: Vec<&str> = expected.iter().map(Shape::name).collect();
        return Err(KvError::ValueFormat(format!(
            "Invalid input, JSON value to store must load as one of: {}",
            names.join(", ")
        )));
    }
    if is_empty_json(&value) {
        return Err(KvError::ValueFormat("Invalid input, JSON payload is empty.".into()));
    }
    Ok(value)
}

/// Split an extracted [`Shape::KeyValueArray`] payload into pairs.
///
/// Each value must itself be non-empty JSON.
pub fn key_value_pairs(payload: Value) -> Result<Vec<KeyValue>, KvError> {
    let Value::Array(items) = payload else {
        return Err(KvError::ValueFormat(PAIR_LIST_MESSAGE.into()));
    };
    items
        .into_iter()
        .map(|item| {
            let Value::Object(mut obj) = item else {
                return Err(KvError::ValueFormat(PAIR_LIST_MESSAGE.into()));
            };
            let key = match obj.remove("key") {
                Some(Value::String(k)) => k,
                _ => return Err(KvError::ValueFormat(PAIR_LIST_MESSAGE.into())),
            };
            let value = obj.remove("value").ok_or_else(|| KvError::ValueFormat(PAIR_LIST_MESSAGE.into()))?;
            if is_empty_json(&value) {
                return Err(KvError::ValueFormat(format!(
                    "Invalid input, JSON value to store for key '{key}' is empty."
                )));
            }
            Ok(KeyValue { key, value })
        })
        .collect()
}

/// Split an extracted [`Shape::StringArray`] payload into key names.
pub fn key_list(payload: Value) -> Result<Vec<String>, KvError> {
    let Value::Array(items) = payload else {
        return Err(KvError::ValueFormat("Invalid input, JSON value must be an array of key strings.".into()));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            _ => Err(KvError::ValueFormat("Invalid input, JSON value must be an array of key strings.".into())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(ct: Option<&str>, body: &str) -> InboundRequest {
        InboundRequest::new(ct.map(str::to_string), None, body.as_bytes().to_vec())
    }

    fn value_message(r: Result<Value, KvError>) -> String {
        match r {
            Err(KvError::ValueFormat(m)) => m,
            other => panic!("expected ValueFormat, got {other:?}"),
        }
    }

    #[test]
    fn content_type_rules() {
        assert!(is_json_content_type(Some("application/json")));
        assert!(is_json_content_type(Some("Application/JSON; charset=utf-8")));
        assert!(is_json_content_type(Some("application/merge-patch+json")));
        assert!(!is_json_content_type(Some("text/plain")));
        assert!(!is_json_content_type(Some("+json")));
        assert!(!is_json_content_type(Some("text/foo+json")));
        assert!(!is_json_content_type(Some("application/+json")));
        assert!(!is_json_content_type(Some("text/json")));
        assert!(!is_json_content_type(None));
    }

    #[test]
    fn wrong_content_type_is_request_error() {
        let err = extract(&req(Some("text/plain"), "{\"a\":1}"), &[Shape::Object]).unwrap_err();
        assert!(matches!(err, KvError::RequestFormat(_)));
        let err = extract(&req(None, "{\"a\":1}"), &[Shape::Object]).unwrap_err();
        assert!(matches!(err, KvError::RequestFormat(_)));
    }

    #[test]
    fn undecodable_and_empty_bodies() {
        let m = value_message(extract(&req(Some("application/json"), "{not json"), &[Shape::Object]));
        assert!(m.contains("cannot be decoded"));
        let m = value_message(extract(&req(Some("application/json"), ""), &[Shape::Object]));
        assert!(m.contains("cannot be decoded"));
        for body in ["null", "{}", "[]"] {
            let m = value_message(extract(&req(Some("application/json"), body), &[Shape::Object, Shape::Array]));
            assert!(m.contains("is empty"), "{body}: {m}");
        }
    }

    #[test]
    fn shape_mismatch_names_accepted_shapes() {
        let m = value_message(extract(&req(Some("application/json"), "42"), &[Shape::Object, Shape::Array]));
        assert!(m.ends_with("one of: object, array"), "{m}");
        let m = value_message(extract(&req(Some("application/json"), "[1, 2]"), &[Shape::StringArray]));
        assert!(m.contains("array of strings"), "{m}");
    }

    #[test]
    fn pair_list_shape() {
        let ok = extract(&req(Some("application/json"), r#"[{"key":"a","value":1}]"#), &[Shape::KeyValueArray]);
        assert!(ok.is_ok());
        let m = value_message(extract(&req(Some("application/json"), r#"[{"key":"a"}]"#), &[Shape::KeyValueArray]));
        assert_eq!(m, PAIR_LIST_MESSAGE);
        let m = value_message(extract(&req(Some("application/json"), r#"[{"key":5,"value":1}]"#), &[Shape::KeyValueArray]));
        assert_eq!(m, PAIR_LIST_MESSAGE);
    }

    #[test]
    fn pairs_reject_empty_values() {
        let pairs = key_value_pairs(json!([{"key": "a", "value": 1}, {"key": "b", "value": {"x": [1]}}])).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], KeyValue { key: "b".into(), value: json!({"x": [1]}) });

        for empty in [json!(null), json!({}), json!([]), json!("")] {
            let err = key_value_pairs(json!([{"key": "a", "value": empty}])).unwrap_err();
            assert!(err.to_string().contains("for key 'a' is empty"), "{err}");
        }
    }

    #[test]
    fn key_list_requires_strings() {
        assert_eq!(key_list(json!(["a", "B"])).unwrap(), vec!["a".to_string(), "B".to_string()]);
        assert!(key_list(json!(["a", 1])).is_err());
    }
}
