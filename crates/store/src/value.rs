use std::cmp::Ordering;

use serde_json::{Map, Value};

/// One table row, keyed by column name.
pub type Row = Map<String, Value>;

/// Canonical text form of a scalar cell, used for equality and grouping.
///
/// Ids arrive as text from some backends and as integers from others; both
/// `"42"` and `42` map to `"42"`. Null has no key and never equals anything.
pub fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// SQL-style equality: null never matches.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (value_key(a), value_key(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Ascending order with nulls last. Numbers compare numerically, everything
/// else by canonical text (ISO timestamps sort correctly as text).
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        _ => value_key(a).cmp(&value_key(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_and_integer_ids_share_a_key() {
        assert_eq!(value_key(&json!("42")), value_key(&json!(42)));
        assert!(values_equal(&json!("42"), &json!(42)));
    }

    #[test]
    fn null_never_equal() {
        assert!(!values_equal(&Value::Null, &Value::Null));
        assert_eq!(value_key(&Value::Null), None);
    }

    #[test]
    fn nulls_sort_last() {
        let mut vals = vec![Value::Null, json!("2024-02-01"), json!("2024-01-01")];
        vals.sort_by(compare_values);
        assert_eq!(vals, vec![json!("2024-01-01"), json!("2024-02-01"), Value::Null]);
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(compare_values(&json!(9), &json!(10)), Ordering::Less);
    }
}
