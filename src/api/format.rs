use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Rewrite store-specific value wrappers into plain JSON for responses.
///
/// - `{"$oid": "..."}` becomes the id string
/// - `{"$date": ...}` becomes an RFC 3339 timestamp string
/// - `{"$numberLong": "..."}` becomes a JSON integer
///
/// Anything else passes through unchanged, recursively.
pub fn to_wire(value: Value) -> Value {
    match value {
        Value::Object(map) => object_to_wire(map),
        Value::Array(items) => Value::Array(items.into_iter().map(to_wire).collect()),
        other => other,
    }
}

fn object_to_wire(map: Map<String, Value>) -> Value {
    if map.len() == 1 {
        if let Some(v) = map.get("$oid").and_then(Value::as_str) {
            return Value::String(v.to_string());
        }
        if let Some(v) = map.get("$date") {
            if let Some(rendered) = date_to_wire(v) {
                return Value::String(rendered);
            }
        }
        if let Some(n) = map
            .get("$numberLong")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<i64>().ok())
        {
            return Value::from(n);
        }
    }

    Value::Object(map.into_iter().map(|(k, v)| (k, to_wire(v))).collect())
}

fn date_to_wire(value: &Value) -> Option<String> {
    let millis = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => {
            let parsed = DateTime::parse_from_rfc3339(s).ok()?;
            return Some(parsed.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        Value::Object(inner) => inner.get("$numberLong")?.as_str()?.parse().ok()?,
        _ => return None,
    };
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}
