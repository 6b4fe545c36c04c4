//! Top-N KIP rankings per SLA bucket.
//!
//! The ranking endpoint answers with one bucket per SLA target
//! (`sla_1`, `sla_3`, `sla_14`, ...), each mapping a KIP to its number of
//! delayed tickets. Buckets render from the longest SLA target down and the
//! 7-day bucket is never shown.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::report::counts::count_value;
use crate::report::ReportError;

/// Bucket left out of every ranking
pub const EXCLUDED_BUCKET_DAYS: u32 = 7;
/// Entities kept per bucket
pub const TOP_ENTITIES: usize = 3;

static BUCKET_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sla_(\d+)$").expect("bucket key pattern is valid"));
static DAY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("day number pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingEntry {
    pub entity: String,
    pub count: u64,
}

impl RankingEntry {
    pub fn new(entity: impl Into<String>, count: u64) -> Self {
        Self {
            entity: entity.into(),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaBucket {
    /// Key as sent by the endpoint, e.g. `sla_14`
    pub key: String,
    /// Display label, e.g. `14HK`
    pub label: String,
    pub days: u32,
    pub entries: Vec<RankingEntry>,
}

/// `sla_14` becomes `14HK`; anything else is shown as sent
pub fn bucket_label(key: &str) -> String {
    match BUCKET_KEY.captures(key) {
        Some(captures) => format!("{}HK", &captures[1]),
        None => key.to_string(),
    }
}

/// Day value embedded in a bucket label: the first run of digits
pub fn bucket_days(label: &str) -> Option<u32> {
    DAY_NUMBER
        .find(label)
        .and_then(|found| found.as_str().parse().ok())
}

/// Sort descending by count and keep the first `limit`. Ties keep input order.
pub fn top_entries(mut entries: Vec<RankingEntry>, limit: usize) -> Vec<RankingEntry> {
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(limit);
    entries
}

/// Build ordered buckets from already-extracted `(key, entries)` pairs
pub fn rank_buckets(
    endpoint: &str,
    buckets: Vec<(String, Vec<RankingEntry>)>,
) -> Result<Vec<SlaBucket>, ReportError> {
    let mut ranked = Vec::with_capacity(buckets.len());
    for (key, entries) in buckets {
        let label = bucket_label(&key);
        let days = bucket_days(&label).ok_or_else(|| {
            ReportError::malformed(endpoint, format!("bucket {key} carries no day value"))
        })?;
        if days == EXCLUDED_BUCKET_DAYS {
            continue;
        }
        ranked.push(SlaBucket {
            key,
            label,
            days,
            entries: top_entries(entries, TOP_ENTITIES),
        });
    }
    ranked.sort_by(|a, b| b.days.cmp(&a.days));
    Ok(ranked)
}

/// Parse `{ data: { delayed: { <bucket>: { data: { <kip>: <count> } } } } }`
pub fn parse_ranking(endpoint: &str, payload: &Value) -> Result<Vec<SlaBucket>, ReportError> {
    let delayed = payload
        .get("data")
        .and_then(|data| data.get("delayed"))
        .and_then(Value::as_object)
        .ok_or_else(|| ReportError::malformed(endpoint, "missing data.delayed object"))?;

    let mut buckets = Vec::with_capacity(delayed.len());
    for (key, bucket) in delayed {
        if bucket_days(&bucket_label(key)) == Some(EXCLUDED_BUCKET_DAYS) {
            continue;
        }
        let rows = match bucket.get("data") {
            Some(Value::Object(rows)) => rows,
            // empty maps may be serialized as []
            Some(Value::Array(items)) if items.is_empty() => {
                buckets.push((key.clone(), Vec::new()));
                continue;
            }
            _ => {
                return Err(ReportError::malformed(
                    endpoint,
                    format!("bucket {key} has no data object"),
                ))
            }
        };
        let mut entries = Vec::with_capacity(rows.len());
        for (entity, raw) in rows {
            let count = count_value(raw).ok_or_else(|| {
                ReportError::malformed(endpoint, format!("count for {entity} in {key} is not a number"))
            })?;
            entries.push(RankingEntry::new(entity.clone(), count));
        }
        buckets.push((key.clone(), entries));
    }

    rank_buckets(endpoint, buckets)
}
