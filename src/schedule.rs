//! Daily schedule.
//!
//! Cron expressions are evaluated in the report time zone. Both the 6-field
//! form (`sec min hour dom mon dow`) and the classic 5-field form are
//! accepted; the latter fires at second zero.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::delivery::{Trigger, TriggerOrigin};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression {expression:?}: {source}")]
    InvalidExpression {
        expression: String,
        #[source]
        source: cron::error::Error,
    },
    #[error("unknown time zone {0:?}")]
    UnknownTimezone(String),
}

/// Accept 5-field cron expressions by pinning the seconds field to zero
pub fn normalize_expression(expression: &str) -> String {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        fields.join(" ")
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))
}

#[derive(Debug, Clone)]
pub struct DailySchedule {
    schedule: Schedule,
    expression: String,
    timezone: Tz,
}

impl DailySchedule {
    pub fn new(expression: &str, timezone: &str) -> Result<Self, ScheduleError> {
        let expression = normalize_expression(expression);
        let schedule =
            Schedule::from_str(&expression).map_err(|source| ScheduleError::InvalidExpression {
                expression: expression.clone(),
                source,
            })?;
        Ok(Self {
            schedule,
            expression,
            timezone: parse_timezone(timezone)?,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First firing strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .next()
            .map(|at| at.with_timezone(&Utc))
    }

    /// The next `count` firings after `from`, in the report time zone
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Tz>> {
        self.schedule
            .after(&from.with_timezone(&self.timezone))
            .take(count)
            .collect()
    }

    /// Fire `trigger` at every firing until `shutdown` flips. A run that
    /// overlaps the next firing delays it; missed firings are not replayed.
    pub async fn run(&self, trigger: Arc<dyn Trigger>, mut shutdown: watch::Receiver<bool>) {
        info!(cron = %self.expression, timezone = %self.timezone, "Daily schedule started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let now = Utc::now();
            let Some(next) = self.next_after(now) else {
                warn!(cron = %self.expression, "Schedule has no further firings");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(
                next_run = %next.with_timezone(&self.timezone),
                wait_secs = wait.as_secs(),
                "Waiting for next scheduled report"
            );

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(wait) => {
                    let outcome = trigger.fire(TriggerOrigin::Schedule).await;
                    if !outcome.is_success() {
                        warn!(errors = ?outcome.errors, "Scheduled report finished with errors");
                    }
                }
            }
        }
        info!("Daily schedule stopped");
    }
}
