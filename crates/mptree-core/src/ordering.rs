//! Sibling ordering by payload fields.
//!
//! With `node_order_by` configured, siblings compare by the listed payload
//! fields in turn. Values of different JSON kinds order as
//! null < bool < number < string < array < object; a missing field counts as
//! null.

use std::cmp::Ordering;

use serde_json::Value;

static NULL: Value = Value::Null;

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Value of `field` in `data`, or null when absent.
pub fn field<'a>(data: &'a Value, name: &str) -> &'a Value {
    data.get(name).unwrap_or(&NULL)
}

/// Compares two payloads by the given key fields, left to right.
pub fn compare_by_keys(a: &Value, b: &Value, keys: &[String]) -> Ordering {
    for key in keys {
        let ord = compare_values(field(a, key), field(b, key));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mixed_kinds_order_by_rank() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(true), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(10), &json!("1")), Ordering::Less);
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(compare_values(&json!(9), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
    }

    #[test]
    fn keys_compare_left_to_right() {
        let keys = vec!["last".to_string(), "first".to_string()];
        let a = json!({"last": "smith", "first": "ann"});
        let b = json!({"last": "smith", "first": "bob"});
        let c = json!({"last": "jones", "first": "zed"});
        assert_eq!(compare_by_keys(&a, &b, &keys), Ordering::Less);
        assert_eq!(compare_by_keys(&c, &a, &keys), Ordering::Less);
        assert_eq!(compare_by_keys(&a, &a, &keys), Ordering::Equal);
    }

    #[test]
    fn missing_field_is_null() {
        let keys = vec!["rank".to_string()];
        assert_eq!(
            compare_by_keys(&json!({}), &json!({"rank": 0}), &keys),
            Ordering::Less
        );
    }
}
