//! The evaluation context rules run against.

use chrono::NaiveDate;
use serde_json::Value as JsonValue;

/// `{intent_type, data}` — `data` is a shallow merge of the intent payload
/// plus handler-computed flags, progressively enriched across phases.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub intent_type: String,
    pub data: JsonValue,
    pub effective_date: NaiveDate,
}

impl RuleContext {
    pub fn new(intent_type: impl Into<String>, data: JsonValue, effective_date: NaiveDate) -> Self {
        Self {
            intent_type: intent_type.into(),
            data,
            effective_date,
        }
    }

    /// Merge `fields` into `data` (shallow, object keys only).
    pub fn merge(&mut self, fields: &JsonValue) {
        let (JsonValue::Object(into), JsonValue::Object(from)) = (&mut self.data, fields) else {
            return;
        };
        for (k, v) in from {
            into.insert(k.clone(), v.clone());
        }
    }
}
