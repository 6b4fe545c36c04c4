//! Previous-year summary report.
//!
//! Sent alongside the daily report while last year still has unclosed
//! tickets. Once every ticket of the year is closed the summary goes out one
//! final time from the daily schedule, and the closing figures are recorded
//! remotely so later runs stay quiet.

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::delivery::TriggerOrigin;
use crate::http::Endpoint;
use crate::report::counts::{count_value, ClosedTicketCounts};
use crate::report::pipeline::ChannelBody;
use crate::report::render::{self, Layout};
use crate::report::{ReportError, ReportPipeline};
use crate::window::{QueryFormat, ReportWindow};

const TITLE_FIELD: &str = "judul";
const COUNT_FIELD: &str = "count_data";
/// Summary queries always carry times, whatever the daily report sends
const SUMMARY_QUERY_FORMAT: QueryFormat = QueryFormat::DateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEndpoints {
    pub kip_out_table: Endpoint,
    pub kip_in_table: Endpoint,
    pub check: Endpoint,
    pub insert: Endpoint,
}

/// One row of a KIP In/Out SLA table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KipTableRow {
    pub title: String,
    pub count: u64,
}

impl KipTableRow {
    pub fn new(title: impl Into<String>, count: u64) -> Self {
        Self {
            title: title.into(),
            count,
        }
    }
}

/// Parse `{ data: [ { judul, count_data }, ... ] }`
pub fn parse_kip_table(endpoint: &str, payload: &Value) -> Result<Vec<KipTableRow>, ReportError> {
    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ReportError::malformed(endpoint, "missing data array"))?;

    rows.iter()
        .map(|row| {
            let title = row
                .get(TITLE_FIELD)
                .and_then(Value::as_str)
                .ok_or_else(|| ReportError::malformed(endpoint, format!("row has no {TITLE_FIELD}")))?;
            let count = row.get(COUNT_FIELD).and_then(count_value).ok_or_else(|| {
                ReportError::malformed(endpoint, format!("row {title} has no numeric {COUNT_FIELD}"))
            })?;
            Ok(KipTableRow::new(title, count))
        })
        .collect()
}

/// What to do with a summary once its figures are known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryDecision {
    Send,
    /// Year fully closed and already recorded, or a manual request for a closed year
    Skip,
    /// Year fully closed; record the closing figures, then send
    RecordAndSend,
}

/// Decide whether a year with `unclosed` open tickets still gets a summary.
/// `already_recorded` is only consulted for scheduled runs of a closed year.
pub fn decide(unclosed: u64, origin: &TriggerOrigin, already_recorded: Option<bool>) -> SummaryDecision {
    if unclosed > 0 {
        return SummaryDecision::Send;
    }
    match (origin, already_recorded) {
        (TriggerOrigin::Schedule, Some(false)) => SummaryDecision::RecordAndSend,
        _ => SummaryDecision::Skip,
    }
}

#[derive(Serialize)]
struct YearBody {
    year: i32,
}

#[derive(Serialize)]
struct ClosingFigures {
    year: i32,
    ticket_closed: u64,
    ticket_closed_in_sla: u64,
    ticket_closed_out_sla: u64,
}

impl ReportPipeline {
    /// Build the previous-year summary, or `None` when it must not be sent
    pub async fn build_yearly_summary(
        &self,
        window: &ReportWindow,
        origin: &TriggerOrigin,
        chat_id: &str,
    ) -> Result<Option<String>, ReportError> {
        let Some(endpoints) = self.endpoints().summary.as_ref() else {
            return Ok(None);
        };

        let (open, out_of_sla, in_sla, closed) = tokio::try_join!(
            self.open_counts_as(window, SUMMARY_QUERY_FORMAT),
            self.fetch_kip_table(&endpoints.kip_out_table, window),
            self.fetch_kip_table(&endpoints.kip_in_table, window),
            self.closed_counts_as(window, SUMMARY_QUERY_FORMAT),
        )?;

        let year = window.year();
        let already_recorded = if open.unclosed == 0 && *origin == TriggerOrigin::Schedule {
            Some(self.summary_recorded(&endpoints.check, year).await?)
        } else {
            None
        };

        match decide(open.unclosed, origin, already_recorded) {
            SummaryDecision::Skip => {
                info!(year, "Summary suppressed, year is fully closed");
                return Ok(None);
            }
            SummaryDecision::RecordAndSend => {
                self.record_closing_figures(&endpoints.insert, year, &closed)
                    .await?;
            }
            SummaryDecision::Send => {}
        }

        let mut fragments = vec![
            render::summary_preamble(window),
            render::summary_header(window),
            render::open_counts(&open),
            render::kip_tables(&out_of_sla, &in_sla),
            render::closed_counts(&closed),
        ];
        let footer = self
            .detail_export_as(window, chat_id, SUMMARY_QUERY_FORMAT)
            .await?;
        fragments.extend(footer);
        Ok(Some(render::render_with(Layout::SUMMARY, &fragments)))
    }

    async fn fetch_kip_table(
        &self,
        endpoint: &Endpoint,
        window: &ReportWindow,
    ) -> Result<Vec<KipTableRow>, ReportError> {
        let payload = self
            .fetcher()
            .post_json(endpoint, &ChannelBody::new(window, SUMMARY_QUERY_FORMAT))
            .await?;
        parse_kip_table(&endpoint.name, &payload)
    }

    async fn summary_recorded(&self, endpoint: &Endpoint, year: i32) -> Result<bool, ReportError> {
        let payload = self.fetcher().post_json(endpoint, &YearBody { year }).await?;
        Ok(payload.get("success").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn record_closing_figures(
        &self,
        endpoint: &Endpoint,
        year: i32,
        closed: &ClosedTicketCounts,
    ) -> Result<(), ReportError> {
        let figures = ClosingFigures {
            year,
            ticket_closed: closed.closed,
            ticket_closed_in_sla: closed.closed_in_sla,
            ticket_closed_out_sla: closed.closed_out_sla,
        };
        self.fetcher().post_json(endpoint, &figures).await?;
        info!(year, "Recorded closing figures for the year");
        Ok(())
    }
}
