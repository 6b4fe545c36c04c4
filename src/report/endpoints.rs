use crate::config::{ConfigError, EndpointConfig};
use crate::http::Endpoint;
use crate::report::summary::SummaryEndpoints;

/// Every ticket-monitor URL one report run talks to, validated at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSet {
    pub unclosed: Endpoint,
    pub open_in_sla: Endpoint,
    pub open_out_sla: Endpoint,
    pub closed: Endpoint,
    pub closed_in_sla: Endpoint,
    pub closed_out_sla: Endpoint,
    pub kip_ranking: Endpoint,
    pub aging: Endpoint,
    pub detail_export: Option<Endpoint>,
    pub summary: Option<SummaryEndpoints>,
}

impl EndpointSet {
    pub fn from_config(config: &EndpointConfig) -> Result<Self, ConfigError> {
        let summary = match &config.summary {
            Some(summary) => Some(SummaryEndpoints {
                kip_out_table: required("KipOutSla", "endpoints.summary.kip_out_table", Some(&summary.kip_out_table))?,
                kip_in_table: required("KipInSla", "endpoints.summary.kip_in_table", Some(&summary.kip_in_table))?,
                check: required("CheckSummary", "endpoints.summary.check", Some(&summary.check))?,
                insert: required("InsertSummary", "endpoints.summary.insert", Some(&summary.insert))?,
            }),
            None => None,
        };

        Ok(Self {
            unclosed: required("Unclosed", "endpoints.unclosed", config.unclosed.as_ref())?,
            open_in_sla: required("OpenInSLA", "endpoints.open_in_sla", config.open_in_sla.as_ref())?,
            open_out_sla: required("OpenOutSLA", "endpoints.open_out_sla", config.open_out_sla.as_ref())?,
            closed: required("Closed", "endpoints.closed", config.closed.as_ref())?,
            closed_in_sla: required("ClosedInSLA", "endpoints.closed_in_sla", config.closed_in_sla.as_ref())?,
            closed_out_sla: required("ClosedOutSLA", "endpoints.closed_out_sla", config.closed_out_sla.as_ref())?,
            kip_ranking: required("KIPOutSLA", "endpoints.kip_ranking", config.kip_ranking.as_ref())?,
            aging: required("KIPAging", "endpoints.aging", config.aging.as_ref())?,
            detail_export: config
                .detail_export
                .as_ref()
                .map(|url| checked("DetailExport", "endpoints.detail_export", url))
                .transpose()?,
            summary,
        })
    }
}

fn required(name: &str, field: &'static str, url: Option<&String>) -> Result<Endpoint, ConfigError> {
    match url {
        Some(url) => checked(name, field, url),
        None => Err(ConfigError::MissingField(field)),
    }
}

fn checked(name: &str, field: &'static str, url: &str) -> Result<Endpoint, ConfigError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ConfigError::MissingField(field));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidUrl {
            field,
            url: url.to_string(),
        });
    }
    Ok(Endpoint::new(name, url))
}
