//! The condition DSL: a dotted-path lookup compared with an operator.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    NotEmpty,
    In,
    NotIn,
    Exists,
    Gt,
    Lt,
    Gte,
    Lte,
    Matches,
}

/// One clause of a rule's conjunction: `field operator value?`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<JsonValue>,
}

/// Walk `data` by `.`-separated path segments, stopping at the first
/// missing key or non-object intermediate.
fn lookup<'a>(data: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut current = data;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn as_f64(value: &JsonValue) -> Option<f64> {
    value.as_f64()
}

impl Condition {
    /// Evaluate this condition against `data`. Type-unsafe comparisons and
    /// invalid regex patterns evaluate to `false` rather than erroring, per
    /// the condition language's stated behavior.
    pub fn evaluate(&self, data: &JsonValue) -> bool {
        let found = lookup(data, &self.field);

        match self.operator {
            Operator::Exists => found.is_some(),
            Operator::NotEmpty => match found {
                None | Some(JsonValue::Null) => false,
                Some(JsonValue::String(s)) => !s.is_empty(),
                Some(JsonValue::Array(a)) => !a.is_empty(),
                Some(JsonValue::Object(o)) => !o.is_empty(),
                Some(_) => true,
            },
            Operator::Eq => match (found, &self.value) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            Operator::Neq => match (found, &self.value) {
                (Some(a), Some(b)) => a != b,
                _ => false,
            },
            Operator::In => match (found, &self.value) {
                (Some(a), Some(JsonValue::Array(items))) => items.iter().any(|v| v == a),
                _ => false,
            },
            Operator::NotIn => match (found, &self.value) {
                (Some(a), Some(JsonValue::Array(items))) => !items.iter().any(|v| v == a),
                _ => false,
            },
            Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte => {
                match (found.and_then(as_f64), self.value.as_ref().and_then(as_f64)) {
                    (Some(a), Some(b)) => match self.operator {
                        Operator::Gt => a > b,
                        Operator::Lt => a < b,
                        Operator::Gte => a >= b,
                        Operator::Lte => a <= b,
                        _ => unreachable!(),
                    },
                    _ => false,
                }
            }
            Operator::Matches => {
                let (Some(JsonValue::String(subject)), Some(JsonValue::String(pattern))) =
                    (found, self.value.as_ref())
                else {
                    return false;
                };
                match Regex::new(pattern) {
                    Ok(re) => re.is_match(subject),
                    Err(_) => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(field: &str, op: Operator, value: Option<JsonValue>) -> Condition {
        Condition {
            field: field.to_string(),
            operator: op,
            value,
        }
    }

    #[test]
    fn dotted_path_lookup() {
        let data = json!({"vendor": {"name": "Acme"}});
        let c = cond("vendor.name", Operator::Eq, Some(json!("Acme")));
        assert!(c.evaluate(&data));
    }

    #[test]
    fn missing_path_is_false_for_eq() {
        let data = json!({"vendor": {}});
        let c = cond("vendor.name", Operator::Eq, Some(json!("Acme")));
        assert!(!c.evaluate(&data));
    }

    #[test]
    fn gt_on_non_number_is_false() {
        let data = json!({"amount": "not-a-number"});
        let c = cond("amount", Operator::Gt, Some(json!(100)));
        assert!(!c.evaluate(&data));
    }

    #[test]
    fn invalid_regex_is_false_not_error() {
        let data = json!({"code": "AB-123"});
        let c = cond("code", Operator::Matches, Some(json!("[unclosed")));
        assert!(!c.evaluate(&data));
    }

    #[test]
    fn matches_valid_regex() {
        let data = json!({"code": "AB-123"});
        let c = cond("code", Operator::Matches, Some(json!(r"^[A-Z]{2}-\d+$")));
        assert!(c.evaluate(&data));
    }

    #[test]
    fn not_empty_variants() {
        assert!(cond("x", Operator::NotEmpty, None).evaluate(&json!({"x": "a"})));
        assert!(!cond("x", Operator::NotEmpty, None).evaluate(&json!({"x": ""})));
        assert!(!cond("x", Operator::NotEmpty, None).evaluate(&json!({"x": []})));
        assert!(!cond("x", Operator::NotEmpty, None).evaluate(&json!({})));
    }
}
