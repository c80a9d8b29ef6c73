//! Value comparison rules shared by the update operators.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;

/// Discriminator key marking a typed value inside a document.
pub const DATE_TYPE_TAG: &str = "__type";

/// Discriminator value for tagged dates.
pub const DATE_TYPE_NAME: &str = "Date";

/// Interpret `value` as a tagged date: `{"__type": "Date", "value": "<ISO8601>"}`.
pub(crate) fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    let map = value.as_object()?;
    if map.get(DATE_TYPE_TAG)?.as_str()? != DATE_TYPE_NAME {
        return None;
    }
    let raw = map.get("value")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Deep equality, with tagged dates compared by millisecond timestamp.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(da), Some(db)) = (as_date(a), as_date(b)) {
        return da.timestamp_millis() == db.timestamp_millis();
    }
    a == b
}

/// Ordering under the engine's comparison rule.
///
/// Numbers compare numerically, strings lexicographically (case-sensitive),
/// tagged dates by millisecond timestamp. Every cross-type pair is not
/// comparable and yields `None`.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(da), Some(db)) = (as_date(a), as_date(b)) {
        return Some(da.timestamp_millis().cmp(&db.timestamp_millis()));
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(iso: &str) -> Value {
        json!({DATE_TYPE_TAG: DATE_TYPE_NAME, "value": iso})
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(
            compare_values(&json!(2.5), &json!(2)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn strings_compare_lexicographically_case_sensitive() {
        assert_eq!(
            compare_values(&json!("a"), &json!("b")),
            Some(Ordering::Less)
        );
        // Uppercase sorts before lowercase in code-point order.
        assert_eq!(
            compare_values(&json!("Z"), &json!("a")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn dates_compare_by_timestamp() {
        let earlier = date("2024-01-01T00:00:00.000Z");
        let later = date("2024-01-01T00:00:00.250Z");
        assert_eq!(compare_values(&earlier, &later), Some(Ordering::Less));
        assert!(values_equal(
            &date("2024-01-01T00:00:00Z"),
            &date("2024-01-01T01:00:00+01:00")
        ));
    }

    #[test]
    fn cross_type_pairs_are_not_comparable() {
        assert_eq!(compare_values(&json!(1), &json!("1")), None);
        assert_eq!(compare_values(&json!(null), &json!(0)), None);
        assert_eq!(compare_values(&json!({"a": 1}), &json!(1)), None);
        assert_eq!(compare_values(&date("2024-01-01T00:00:00Z"), &json!(5)), None);
    }

    #[test]
    fn equality_is_deep_for_objects() {
        assert!(values_equal(
            &json!({"a": [1, {"b": 2}]}),
            &json!({"a": [1, {"b": 2}]})
        ));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 2})));
    }
}
