//! Report assembly.
//!
//! A daily run is two messages: the combined report (open counts, KIP
//! rankings, closed counts and an optional export footer) and the aging
//! report. Both are built concurrently and any failure aborts the whole run;
//! nothing partial is ever returned.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::http::{Endpoint, JsonFetcher};
use crate::report::aging::{self, AgingEntity};
use crate::report::counts::{extract_count, ClosedTicketCounts, OpenTicketCounts};
use crate::report::ranking::{self, SlaBucket};
use crate::report::render::{self, ReportFragment};
use crate::report::{EndpointSet, ReportError};
use crate::window::{QueryFormat, ReportWindow};

/// Channel filter sent to endpoints that split by intake channel
pub const ALL_CHANNELS: &str = "ALL";
const DETAIL_EXPORT_KIND: &str = "telegram";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct DateRangeBody {
    pub start_date: String,
    pub end_date: String,
}

impl DateRangeBody {
    pub fn new(window: &ReportWindow, format: QueryFormat) -> Self {
        Self {
            start_date: window.query_start(format),
            end_date: window.query_end(format),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct ChannelBody {
    pub channel: &'static str,
    pub start_date: String,
    pub end_date: String,
}

impl ChannelBody {
    pub fn new(window: &ReportWindow, format: QueryFormat) -> Self {
        Self {
            channel: ALL_CHANNELS,
            start_date: window.query_start(format),
            end_date: window.query_end(format),
        }
    }
}

#[derive(Serialize)]
struct DetailExportBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    start_date: String,
    end_date: String,
    chat_id: &'a str,
}

/// The two rendered messages of a daily run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    pub combined: String,
    pub aging: String,
}

impl DailyReport {
    /// Messages in delivery order
    pub fn messages(&self) -> [&str; 2] {
        [self.combined.as_str(), self.aging.as_str()]
    }
}

#[derive(Debug, Clone)]
pub struct ReportPipeline {
    fetcher: JsonFetcher,
    endpoints: EndpointSet,
    query_format: QueryFormat,
}

impl ReportPipeline {
    pub fn new(fetcher: JsonFetcher, endpoints: EndpointSet, query_format: QueryFormat) -> Self {
        Self {
            fetcher,
            endpoints,
            query_format,
        }
    }

    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    pub fn fetcher(&self) -> &JsonFetcher {
        &self.fetcher
    }

    pub fn query_format(&self) -> QueryFormat {
        self.query_format
    }

    pub(crate) fn date_body(&self, window: &ReportWindow) -> DateRangeBody {
        DateRangeBody::new(window, self.query_format)
    }

    pub(crate) fn channel_body(&self, window: &ReportWindow) -> ChannelBody {
        ChannelBody::new(window, self.query_format)
    }

    async fn fetch_count(
        &self,
        endpoint: &Endpoint,
        window: &ReportWindow,
        format: QueryFormat,
    ) -> Result<u64, ReportError> {
        let payload = self
            .fetcher
            .post_json(endpoint, &DateRangeBody::new(window, format))
            .await?;
        extract_count(&endpoint.name, &payload)
    }

    pub async fn fetch_open_counts(&self, window: &ReportWindow) -> Result<OpenTicketCounts, ReportError> {
        self.open_counts_as(window, self.query_format).await
    }

    pub(crate) async fn open_counts_as(
        &self,
        window: &ReportWindow,
        format: QueryFormat,
    ) -> Result<OpenTicketCounts, ReportError> {
        let (unclosed, open_in_sla, open_out_sla) = tokio::try_join!(
            self.fetch_count(&self.endpoints.unclosed, window, format),
            self.fetch_count(&self.endpoints.open_in_sla, window, format),
            self.fetch_count(&self.endpoints.open_out_sla, window, format),
        )?;
        Ok(OpenTicketCounts {
            unclosed,
            open_in_sla,
            open_out_sla,
        })
    }

    pub async fn fetch_closed_counts(&self, window: &ReportWindow) -> Result<ClosedTicketCounts, ReportError> {
        self.closed_counts_as(window, self.query_format).await
    }

    pub(crate) async fn closed_counts_as(
        &self,
        window: &ReportWindow,
        format: QueryFormat,
    ) -> Result<ClosedTicketCounts, ReportError> {
        let (closed, closed_in_sla, closed_out_sla) = tokio::try_join!(
            self.fetch_count(&self.endpoints.closed, window, format),
            self.fetch_count(&self.endpoints.closed_in_sla, window, format),
            self.fetch_count(&self.endpoints.closed_out_sla, window, format),
        )?;
        Ok(ClosedTicketCounts {
            closed,
            closed_in_sla,
            closed_out_sla,
        })
    }

    pub async fn fetch_kip_ranking(&self, window: &ReportWindow) -> Result<Vec<SlaBucket>, ReportError> {
        let endpoint = &self.endpoints.kip_ranking;
        let payload = self
            .fetcher
            .post_json(endpoint, &self.channel_body(window))
            .await?;
        ranking::parse_ranking(&endpoint.name, &payload)
    }

    /// Top aging entities, already cut to the reported few
    pub async fn fetch_aging(&self, window: &ReportWindow) -> Result<Vec<AgingEntity>, ReportError> {
        let endpoint = &self.endpoints.aging;
        let payload = self
            .fetcher
            .post_json(endpoint, &self.channel_body(window))
            .await?;
        aging::parse_aging(&endpoint.name, &payload, aging::TOP_ENTITIES)
    }

    /// Ask the ticket monitor to generate the detailed export in the
    /// background. Returns the footer announcing the outcome, or `None` when
    /// no export endpoint is configured.
    pub async fn request_detail_export(
        &self,
        window: &ReportWindow,
        chat_id: &str,
    ) -> Result<Option<ReportFragment>, ReportError> {
        self.detail_export_as(window, chat_id, self.query_format).await
    }

    pub(crate) async fn detail_export_as(
        &self,
        window: &ReportWindow,
        chat_id: &str,
        format: QueryFormat,
    ) -> Result<Option<ReportFragment>, ReportError> {
        let Some(endpoint) = self.endpoints.detail_export.as_ref() else {
            return Ok(None);
        };
        let body = DetailExportBody {
            kind: DETAIL_EXPORT_KIND,
            start_date: window.query_start(format),
            end_date: window.query_end(format),
            chat_id,
        };
        let payload = self.fetcher.post_json(endpoint, &body).await?;
        let accepted = payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !accepted {
            warn!(endpoint = %endpoint.name, "Detail export was not accepted");
        }
        Ok(Some(render::detail_export_footer(accepted, window.year())))
    }

    /// Fragments of the combined report, unordered
    pub async fn build_combined_report(
        &self,
        window: &ReportWindow,
        chat_id: &str,
    ) -> Result<Vec<ReportFragment>, ReportError> {
        let (open, buckets, closed) = tokio::try_join!(
            self.fetch_open_counts(window),
            self.fetch_kip_ranking(window),
            self.fetch_closed_counts(window),
        )?;

        let mut fragments = vec![
            render::report_header(window),
            render::open_counts(&open),
            render::ranking(&buckets),
            render::closed_counts(&closed),
        ];
        if let Some(footer) = self.request_detail_export(window, chat_id).await? {
            fragments.push(footer);
        }
        Ok(fragments)
    }

    pub async fn build_aging_report(&self, window: &ReportWindow) -> Result<String, ReportError> {
        let entities = self.fetch_aging(window).await?;
        Ok(render::render(&[
            render::aging_header(window),
            render::aging_entities(&entities),
        ]))
    }

    /// Build both daily messages; the first failure aborts both
    pub async fn build_daily_report(
        &self,
        window: &ReportWindow,
        chat_id: &str,
    ) -> Result<DailyReport, ReportError> {
        info!(window = %window, "Building daily report");
        let (combined, aging) = tokio::try_join!(
            self.build_combined_report(window, chat_id),
            self.build_aging_report(window),
        )?;
        Ok(DailyReport {
            combined: render::render(&combined),
            aging,
        })
    }
}
