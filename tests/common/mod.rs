// Shared fixtures: a mocked ticket monitor and a notifier that records
// instead of sending.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sla_report_bot::delivery::{Notifier, NotifyError, OutboundMessage};
use sla_report_bot::report::SummaryEndpoints;
use sla_report_bot::{
    Endpoint, EndpointSet, JsonFetcher, QueryFormat, ReportPipeline, ReportWindow, RetryPolicy,
};

pub const SEPARATOR: &str = "-------------------------------";

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn fast_fetcher() -> JsonFetcher {
    JsonFetcher::new(
        RetryPolicy::new(3, Duration::from_millis(10)),
        Duration::from_secs(5),
    )
    .unwrap()
}

pub fn january_2024() -> ReportWindow {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(23, 59, 59).unwrap();
    ReportWindow::new(start, end).unwrap()
}

pub fn count_body(count: u64) -> Value {
    json!({"data": [{"count_id": count}]})
}

/// Mocked ticket monitor with one path per logical endpoint
pub struct TicketMonitor {
    pub server: MockServer,
}

impl TicketMonitor {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{route}", self.server.uri())
    }

    pub fn endpoints(&self) -> EndpointSet {
        EndpointSet {
            unclosed: Endpoint::new("Unclosed", self.url("unclosed")),
            open_in_sla: Endpoint::new("OpenInSLA", self.url("open-in-sla")),
            open_out_sla: Endpoint::new("OpenOutSLA", self.url("open-out-sla")),
            closed: Endpoint::new("Closed", self.url("closed")),
            closed_in_sla: Endpoint::new("ClosedInSLA", self.url("closed-in-sla")),
            closed_out_sla: Endpoint::new("ClosedOutSLA", self.url("closed-out-sla")),
            kip_ranking: Endpoint::new("KIPOutSLA", self.url("kip-out-sla")),
            aging: Endpoint::new("KIPAging", self.url("aging")),
            detail_export: None,
            summary: None,
        }
    }

    pub fn endpoints_with_export(&self) -> EndpointSet {
        EndpointSet {
            detail_export: Some(Endpoint::new("DetailExport", self.url("detail-export"))),
            ..self.endpoints()
        }
    }

    pub fn endpoints_with_summary(&self) -> EndpointSet {
        EndpointSet {
            summary: Some(SummaryEndpoints {
                kip_out_table: Endpoint::new("KipOutSla", self.url("kip-out-table")),
                kip_in_table: Endpoint::new("KipInSla", self.url("kip-in-table")),
                check: Endpoint::new("CheckSummary", self.url("check-summary")),
                insert: Endpoint::new("InsertSummary", self.url("insert-summary")),
            }),
            ..self.endpoints()
        }
    }

    pub fn pipeline(&self, endpoints: EndpointSet) -> ReportPipeline {
        ReportPipeline::new(fast_fetcher(), endpoints, QueryFormat::DateTime)
    }

    pub async fn respond(&self, route: &str, body: Value) {
        Mock::given(method("POST"))
            .and(path(format!("/{route}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Counts 5/10/2 open and 100/90/10 closed, three ranked buckets and
    /// four aging entities
    pub async fn mount_defaults(&self) {
        for (route, count) in [
            ("unclosed", 5),
            ("open-in-sla", 10),
            ("open-out-sla", 2),
            ("closed", 100),
            ("closed-in-sla", 90),
            ("closed-out-sla", 10),
        ] {
            self.respond(route, count_body(count)).await;
        }
        self.respond("kip-out-sla", ranking_payload()).await;
        self.respond("aging", aging_payload()).await;
    }
}

pub fn ranking_payload() -> Value {
    json!({"data": {"delayed": {
        "sla_1": {"data": {"A1": 1, "B1": 5, "C1": 3, "D1": 2}},
        "sla_7": {"data": {"X7": 100}},
        "sla_3": {"data": {"A3": 4, "B3": 4, "C3": 1, "D3": 6}},
        "sla_14": {"data": {"A14": 7, "B14": 2, "C14": 7, "D14": 9}}
    }}})
}

pub fn aging_payload() -> Value {
    json!({"data": [
        {"kip_2": "Refund", "total_ticket": 12, "aging_3": 2, "aging_10": 4, "aging_45": 6},
        {"kip_2": "Top-up", "total_ticket": 3, "aging_5": 3},
        {"kip_2": "Login", "total_ticket": "20", "aging_21": 20},
        {"kip_2": "Other", "total_ticket": 1, "aging_1": 1}
    ]})
}

pub const EXPECTED_COMBINED: &str = "\
-------------------------------
<b>Report 1 Jan 2024 - 31 Jan 2024</b>
-------------------------------

• <b>Ticket - Unclosed : </b>5
• <b>Ticket - Open In SLA : </b>10
• <b>Ticket - Open Out SLA : </b>2

-------------------------------

<b>TOP 3 KIP out of SLA 14HK:
</b>• D14: 9
• A14: 7
• C14: 7

<b>TOP 3 KIP out of SLA 3HK:
</b>• D3: 6
• A3: 4
• B3: 4

<b>TOP 3 KIP out of SLA 1HK:
</b>• B1: 5
• C1: 3
• D1: 2

-------------------------------

<b>• Ticket - Closed : </b>100
<b>• Ticket - Closed In SLA : </b>90
<b>• Ticket - Closed Out SLA : </b>10
";

pub const EXPECTED_AGING: &str = "\
-------------------------------
<b>Aging cluster for ticket open out of SLA </b>
<b>1 Jan 2024 - 31 Jan 2024</b>
-------------------------------

<b> • Login</b>
Total Tickets: 20
<b>Details :</b>
Aging 3-7 : 0
Aging 8-14 : 0
Aging 15-20 : 0
Aging 21-30 : 20
Aging >30 : 0

<b> • Refund</b>
Total Tickets: 12
<b>Details :</b>
Aging 3-7 : 2
Aging 8-14 : 4
Aging 15-20 : 0
Aging 21-30 : 0
Aging >30 : 6

<b> • Top-up</b>
Total Tickets: 3
<b>Details :</b>
Aging 3-7 : 3
Aging 8-14 : 0
Aging 15-20 : 0
Aging 21-30 : 0
Aging >30 : 0

";
