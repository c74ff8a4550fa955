//! Entry and value shapes used by the FreeIPA JSON-RPC API.
//!
//! FreeIPA returns almost every attribute as a list, wraps timestamps in
//! `{"__datetime__": ...}` and binary values in `{"__base64__": ...}`. The
//! helpers here flatten that into plain strings for the lifecycle layer.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Option map sent as the second element of a JSON-RPC `params` array.
pub type Options = Map<String, Value>;

const IPA_DATETIME_FORMAT: &str = "%Y%m%d%H%M%SZ";

/// A user entry as returned by `user_show`, `stageuser_show` and the add/mod
/// commands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserEntry {
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl UserEntry {
    pub fn new(attrs: Map<String, Value>) -> Self {
        Self { attrs }
    }

    pub fn uid(&self) -> Option<String> {
        self.first("uid")
    }

    /// First value of an attribute, unwrapped from FreeIPA's list encoding.
    pub fn first(&self, key: &str) -> Option<String> {
        match self.attrs.get(key)? {
            Value::Array(values) => values.iter().find_map(scalar_to_string),
            other => scalar_to_string(other),
        }
    }

    /// All values of a multi-valued attribute.
    pub fn all(&self, key: &str) -> Vec<String> {
        match self.attrs.get(key) {
            Some(Value::Array(values)) => values.iter().filter_map(scalar_to_string).collect(),
            Some(other) => scalar_to_string(other).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Boolean attributes come back as `true`, `"TRUE"` or `["TRUE"]` depending
    /// on the command and server version.
    pub fn flag(&self, key: &str) -> bool {
        match self.attrs.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Array(values)) => values.first().is_some_and(value_is_true),
            Some(other) => value_is_true(other),
            None => false,
        }
    }

    /// Timestamp attribute converted to RFC 3339.
    pub fn datetime(&self, key: &str) -> Option<String> {
        self.first(key).and_then(|raw| decode_datetime(&raw))
    }

    pub fn is_preserved(&self) -> bool {
        self.flag("preserved")
    }

    pub fn is_disabled(&self) -> bool {
        self.flag("nsaccountlock")
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(obj) => obj
            .get("__datetime__")
            .or_else(|| obj.get("__base64__"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

fn value_is_true(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Convert an RFC 3339 timestamp into FreeIPA's `__datetime__` wrapper.
pub fn encode_datetime(rfc3339: &str) -> Result<Value, chrono::ParseError> {
    let parsed = DateTime::parse_from_rfc3339(rfc3339)?;
    Ok(json!({
        "__datetime__": parsed.with_timezone(&Utc).format(IPA_DATETIME_FORMAT).to_string()
    }))
}

/// Convert a FreeIPA generalized time (`20250101000000Z`) into RFC 3339.
/// Values that are already RFC 3339 pass through unchanged.
pub fn decode_datetime(raw: &str) -> Option<String> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, IPA_DATETIME_FORMAT) {
        return Some(naive.and_utc().to_rfc3339());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339())
}
