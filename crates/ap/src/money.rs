//! Overflow-checked money arithmetic over JSON-carried integer amounts
//! (smallest currency unit), in the same style as the teacher's
//! `invoicing::invoice::Invoice::handle_issue` line-total accumulation.

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cents(pub i64);

impl Cents {
    pub fn from_json(value: &JsonValue, field: &str) -> Result<Self, String> {
        value
            .get(field)
            .and_then(JsonValue::as_i64)
            .map(Cents)
            .ok_or_else(|| format!("{field} is required and must be an integer"))
    }

    /// Absolute percentage difference between `self` and `other`, relative
    /// to `other`, as a fraction (0.01 == 1%). Computed via `i128` to match
    /// the overflow-checked-arithmetic convention for money.
    pub fn variance_fraction(self, other: Cents) -> f64 {
        if other.0 == 0 {
            return if self.0 == 0 { 0.0 } else { f64::INFINITY };
        }
        let diff = (self.0 as i128 - other.0 as i128).abs();
        diff as f64 / other.0.unsigned_abs() as f64
    }
}
