use serde_json::Value;

use crate::report::ReportError;

/// Field holding the count in the first row of a count endpoint's `data`
pub const COUNT_FIELD: &str = "count_id";
const COUNT_FIELD_ALIAS: &str = "count";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenTicketCounts {
    pub unclosed: u64,
    pub open_in_sla: u64,
    pub open_out_sla: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClosedTicketCounts {
    pub closed: u64,
    pub closed_in_sla: u64,
    pub closed_out_sla: u64,
}

/// Read a non-negative integer the way the ticket monitor sends them: as a
/// JSON number or as a numeric string.
pub fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Extract the count from `{ data: [ { count_id: N }, ... ] }`.
///
/// An empty `data` array is an error, not a zero.
pub fn extract_count(endpoint: &str, payload: &Value) -> Result<u64, ReportError> {
    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ReportError::malformed(endpoint, "missing data array"))?;
    let first = rows
        .first()
        .ok_or_else(|| ReportError::malformed(endpoint, "data array is empty"))?;
    let raw = first
        .get(COUNT_FIELD)
        .or_else(|| first.get(COUNT_FIELD_ALIAS))
        .ok_or_else(|| ReportError::malformed(endpoint, format!("first row has no {COUNT_FIELD}")))?;
    count_value(raw).ok_or_else(|| {
        ReportError::malformed(endpoint, format!("{COUNT_FIELD} is not a non-negative integer: {raw}"))
    })
}
