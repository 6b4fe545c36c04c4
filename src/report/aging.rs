//! Aging clusters for tickets open out of SLA.
//!
//! Each entity arrives as a sparse record of per-day counts (`aging_0` ..
//! `aging_100`). Only the three entities with the most tickets are reported,
//! each folded into five fixed day ranges.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::report::counts::count_value;
use crate::report::ReportError;

/// Field naming the entity in an aging row
pub const ENTITY_FIELD: &str = "kip_2";
pub const TOTAL_FIELD: &str = "total_ticket";
pub const AGING_FIELD_PREFIX: &str = "aging_";
pub const MAX_AGING_DAY: u32 = 100;
/// Entities summarized per report
pub const TOP_ENTITIES: usize = 3;

/// Inclusive day range of one aging cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgingRange {
    pub label: &'static str,
    pub first_day: u32,
    pub last_day: u32,
}

pub const AGING_RANGES: [AgingRange; 5] = [
    AgingRange { label: "3-7", first_day: 3, last_day: 7 },
    AgingRange { label: "8-14", first_day: 8, last_day: 14 },
    AgingRange { label: "15-20", first_day: 15, last_day: 20 },
    AgingRange { label: "21-30", first_day: 21, last_day: 30 },
    AgingRange { label: ">30", first_day: 31, last_day: MAX_AGING_DAY },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgingEntity {
    pub name: String,
    pub total_tickets: u64,
    days: BTreeMap<u32, u64>,
}

impl AgingEntity {
    pub fn new(name: impl Into<String>, total_tickets: u64) -> Self {
        Self {
            name: name.into(),
            total_tickets,
            days: BTreeMap::new(),
        }
    }

    pub fn with_day(mut self, day: u32, count: u64) -> Self {
        self.days.insert(day, count);
        self
    }

    /// Tickets aged exactly `day` days; absent days count as zero
    pub fn day(&self, day: u32) -> u64 {
        self.days.get(&day).copied().unwrap_or(0)
    }

    pub fn buckets(&self) -> AgingBuckets {
        AgingBuckets::fold(self)
    }

    fn from_row(endpoint: &str, row: &Map<String, Value>) -> Result<Self, ReportError> {
        let name = match row.get(ENTITY_FIELD) {
            Some(Value::String(name)) => name.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => {
                return Err(ReportError::malformed(
                    endpoint,
                    format!("aging row has no {ENTITY_FIELD}"),
                ))
            }
        };
        let total_tickets = row
            .get(TOTAL_FIELD)
            .and_then(count_value)
            .ok_or_else(|| {
                ReportError::malformed(endpoint, format!("aging row {name} has no numeric {TOTAL_FIELD}"))
            })?;

        let mut entity = AgingEntity::new(name, total_tickets);
        for day in 0..=MAX_AGING_DAY {
            let field = format!("{AGING_FIELD_PREFIX}{day}");
            match row.get(&field) {
                None | Some(Value::Null) => {}
                Some(raw) => {
                    let count = count_value(raw).ok_or_else(|| {
                        ReportError::malformed(
                            endpoint,
                            format!("{field} of {} is not a number", entity.name),
                        )
                    })?;
                    entity.days.insert(day, count);
                }
            }
        }
        Ok(entity)
    }
}

/// Per-entity ticket counts folded into the five aging clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AgingBuckets {
    pub days_3_7: u64,
    pub days_8_14: u64,
    pub days_15_20: u64,
    pub days_21_30: u64,
    pub over_30: u64,
}

impl AgingBuckets {
    pub fn fold(entity: &AgingEntity) -> Self {
        let sum = |range: &AgingRange| -> u64 {
            (range.first_day..=range.last_day)
                .map(|day| entity.day(day))
                .fold(0u64, u64::saturating_add)
        };
        Self {
            days_3_7: sum(&AGING_RANGES[0]),
            days_8_14: sum(&AGING_RANGES[1]),
            days_15_20: sum(&AGING_RANGES[2]),
            days_21_30: sum(&AGING_RANGES[3]),
            over_30: sum(&AGING_RANGES[4]),
        }
    }

    /// Cluster labels with their counts, in report order
    pub fn rows(&self) -> [(&'static str, u64); 5] {
        [
            (AGING_RANGES[0].label, self.days_3_7),
            (AGING_RANGES[1].label, self.days_8_14),
            (AGING_RANGES[2].label, self.days_15_20),
            (AGING_RANGES[3].label, self.days_21_30),
            (AGING_RANGES[4].label, self.over_30),
        ]
    }
}

/// Parse `{ data: [ { kip_2, total_ticket, aging_N... }, ... ] }` keeping the
/// `limit` rows with the most tickets. Only the kept rows are read past
/// `total_ticket`; ties keep input order.
pub fn parse_aging(
    endpoint: &str,
    payload: &Value,
    limit: usize,
) -> Result<Vec<AgingEntity>, ReportError> {
    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ReportError::malformed(endpoint, "missing data array"))?;

    let mut ranked = Vec::with_capacity(rows.len());
    for row in rows {
        let row = row
            .as_object()
            .ok_or_else(|| ReportError::malformed(endpoint, "aging row is not an object"))?;
        let total = row.get(TOTAL_FIELD).and_then(count_value).ok_or_else(|| {
            ReportError::malformed(endpoint, format!("aging row has no numeric {TOTAL_FIELD}"))
        })?;
        ranked.push((total, row));
    }
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.truncate(limit);

    ranked
        .into_iter()
        .map(|(_, row)| AgingEntity::from_row(endpoint, row))
        .collect()
}
