// Full report runs: acknowledgements, delivery order, error notices and
// the previous-year summary rules

mod common;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{RecordingNotifier, TicketMonitor, EXPECTED_AGING, EXPECTED_COMBINED};
use sla_report_bot::delivery::ParseMode;
use sla_report_bot::job::{COMMAND_ACK, SCHEDULE_ACK};
use sla_report_bot::report::render::WIDE_SEPARATOR;
use sla_report_bot::{
    EndpointSet, QueryFormat, ReportJob, ReportPipeline, Trigger, TriggerOrigin, WindowStrategy,
};

/// 2024-02-01 09:00 in Jakarta
fn february_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 1, 2, 0, 0).unwrap()
}

fn job(monitor: &TicketMonitor, endpoints: EndpointSet, notifier: Arc<RecordingNotifier>) -> ReportJob {
    ReportJob::new(
        monitor.pipeline(endpoints),
        notifier,
        WindowStrategy::FixedStart {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        },
        chrono_tz::Asia::Jakarta,
        "-1001",
    )
    .with_clock(february_morning)
}

#[tokio::test]
async fn test_command_run_acknowledges_then_sends_both_reports() {
    let monitor = TicketMonitor::start().await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let job = job(&monitor, monitor.endpoints(), notifier.clone());

    let outcome = job
        .fire(TriggerOrigin::Command {
            chat_id: "777".to_string(),
        })
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.messages_sent, 3);
    let messages = notifier.messages();
    assert!(messages.iter().all(|m| m.chat_id == "777"));
    assert_eq!(messages[0].text, COMMAND_ACK);
    assert_eq!(messages[0].parse_mode, ParseMode::Plain);
    assert_eq!(messages[1].text, EXPECTED_COMBINED);
    assert_eq!(messages[1].parse_mode, ParseMode::Html);
    assert_eq!(messages[2].text, EXPECTED_AGING);
}

#[tokio::test]
async fn test_scheduled_run_goes_to_configured_chat() {
    let monitor = TicketMonitor::start().await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let job = job(&monitor, monitor.endpoints(), notifier.clone());

    job.run(TriggerOrigin::Schedule).await;

    let messages = notifier.messages();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m.chat_id == "-1001"));
    assert_eq!(messages[0].text, SCHEDULE_ACK);
}

#[tokio::test]
async fn test_cli_run_sends_no_acknowledgement() {
    let monitor = TicketMonitor::start().await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let job = job(&monitor, monitor.endpoints(), notifier.clone());

    job.run(TriggerOrigin::Cli).await;

    assert_eq!(notifier.texts(), vec![EXPECTED_COMBINED, EXPECTED_AGING]);
}

#[tokio::test]
async fn test_failure_sends_single_error_notice_and_no_partial_report() {
    let monitor = TicketMonitor::start().await;
    Mock::given(method("POST"))
        .and(path("/kip-out-sla"))
        .respond_with(ResponseTemplate::new(504))
        .mount(&monitor.server)
        .await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let job = job(&monitor, monitor.endpoints(), notifier.clone());

    let outcome = job.run(TriggerOrigin::Cli).await;

    assert_eq!(outcome.errors.len(), 1);
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].parse_mode, ParseMode::Plain);
    assert_eq!(
        messages[0].text,
        "Error generating report: KIPOutSLA responded with HTTP 504 after 3 attempt(s)"
    );
}

#[tokio::test]
async fn test_overlapping_runs_do_not_interleave() {
    let monitor = TicketMonitor::start().await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let job = Arc::new(job(&monitor, monitor.endpoints(), notifier.clone()));

    let first = {
        let job = Arc::clone(&job);
        tokio::spawn(async move { job.run(TriggerOrigin::Schedule).await })
    };
    let second = {
        let job = Arc::clone(&job);
        tokio::spawn(async move {
            job.run(TriggerOrigin::Command {
                chat_id: "777".to_string(),
            })
            .await
        })
    };
    first.await.unwrap();
    second.await.unwrap();

    let chats: Vec<String> = notifier.messages().into_iter().map(|m| m.chat_id).collect();
    assert_eq!(chats.len(), 6);
    // Each run's three messages stay together
    assert!(chats[0..3].iter().all(|c| *c == chats[0]));
    assert!(chats[3..6].iter().all(|c| *c == chats[3]));
    assert_ne!(chats[0], chats[3]);
}

fn previous_year_body() -> serde_json::Value {
    json!({"start_date": "2023-01-01 00:00", "end_date": "2023-12-31 23:59"})
}

async fn mount_summary_tables(monitor: &TicketMonitor) {
    monitor
        .respond("kip-out-table", json!({"data": [{"judul": "Refund", "count_data": 4}]}))
        .await;
    monitor.respond("kip-in-table", json!({"data": []})).await;
}

async fn mount_closed_previous_year(monitor: &TicketMonitor) {
    Mock::given(method("POST"))
        .and(path("/unclosed"))
        .and(body_json(previous_year_body()))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::count_body(0)))
        .mount(&monitor.server)
        .await;
}

#[tokio::test]
async fn test_summary_precedes_daily_report_while_year_is_open() {
    let monitor = TicketMonitor::start().await;
    mount_summary_tables(&monitor).await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let job = job(&monitor, monitor.endpoints_with_summary(), notifier.clone());

    job.run(TriggerOrigin::Cli).await;

    let texts = notifier.texts();
    assert_eq!(texts.len(), 3);
    let expected_summary = format!(
        "Data will only count for ticket created in 2023\n\
         {WIDE_SEPARATOR}\n\
         <b>Summary ticket report 2023\n2023-01-01 00:00 - 2023-12-31 23:59</b>\n\
         {WIDE_SEPARATOR}\n\
         \n\
         • <b>Ticket - Unclosed : </b>5\n\
         • <b>Ticket - Open In SLA : </b>10\n\
         • <b>Ticket - Open Out SLA : </b>2\n\
         \n\
         -------------------------------\n\
         \n\
         <b>KIP Out of SLA:\n</b>• Refund: 4\n\n\
         -------------------------------\n\
         \n\
         <b>• Ticket - Closed : </b>100\n\
         <b>• Ticket - Closed In SLA : </b>90\n\
         <b>• Ticket - Closed Out SLA : </b>10\n"
    );
    assert_eq!(texts[0], expected_summary);
    assert_eq!(texts[1], EXPECTED_COMBINED);
    assert_eq!(texts[2], EXPECTED_AGING);
}

#[tokio::test]
async fn test_closed_year_is_recorded_once_and_sent_from_schedule() {
    let monitor = TicketMonitor::start().await;
    mount_closed_previous_year(&monitor).await;
    mount_summary_tables(&monitor).await;
    Mock::given(method("POST"))
        .and(path("/check-summary"))
        .and(body_json(json!({"year": 2023})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .expect(1)
        .mount(&monitor.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/insert-summary"))
        .and(body_json(json!({
            "year": 2023,
            "ticket_closed": 100,
            "ticket_closed_in_sla": 90,
            "ticket_closed_out_sla": 10
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&monitor.server)
        .await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let job = job(&monitor, monitor.endpoints_with_summary(), notifier.clone());

    job.run(TriggerOrigin::Schedule).await;

    let texts = notifier.texts();
    assert_eq!(texts.len(), 4);
    assert_eq!(texts[0], SCHEDULE_ACK);
    assert!(texts[1].starts_with("Data will only count for ticket created in 2023\n"));
    assert!(texts[1].contains("• <b>Ticket - Unclosed : </b>0\n"));
}

#[tokio::test]
async fn test_recorded_closed_year_is_not_sent_again() {
    let monitor = TicketMonitor::start().await;
    mount_closed_previous_year(&monitor).await;
    mount_summary_tables(&monitor).await;
    monitor
        .respond("check-summary", json!({"success": true}))
        .await;
    Mock::given(method("POST"))
        .and(path("/insert-summary"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&monitor.server)
        .await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let job = job(&monitor, monitor.endpoints_with_summary(), notifier.clone());

    job.run(TriggerOrigin::Schedule).await;

    assert_eq!(
        notifier.texts(),
        vec![SCHEDULE_ACK, EXPECTED_COMBINED, EXPECTED_AGING]
    );
}

#[tokio::test]
async fn test_closed_year_is_never_sent_on_command() {
    let monitor = TicketMonitor::start().await;
    mount_closed_previous_year(&monitor).await;
    mount_summary_tables(&monitor).await;
    Mock::given(method("POST"))
        .and(path("/check-summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .expect(0)
        .mount(&monitor.server)
        .await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let job = job(&monitor, monitor.endpoints_with_summary(), notifier.clone());

    job.run(TriggerOrigin::Command {
        chat_id: "777".to_string(),
    })
    .await;

    assert_eq!(
        notifier.texts(),
        vec![COMMAND_ACK, EXPECTED_COMBINED, EXPECTED_AGING]
    );
}

#[tokio::test]
async fn test_summary_failure_does_not_block_daily_report() {
    let monitor = TicketMonitor::start().await;
    Mock::given(method("POST"))
        .and(path("/kip-out-table"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&monitor.server)
        .await;
    monitor.respond("kip-in-table", json!({"data": []})).await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let job = job(&monitor, monitor.endpoints_with_summary(), notifier.clone());

    let outcome = job.run(TriggerOrigin::Cli).await;

    let texts = notifier.texts();
    assert_eq!(texts.len(), 3);
    assert!(texts[0].starts_with("Error generating report: KipOutSla responded with HTTP 500"));
    assert_eq!(texts[1], EXPECTED_COMBINED);
    assert_eq!(texts[2], EXPECTED_AGING);
    assert_eq!(outcome.errors.len(), 1);
}

#[tokio::test]
async fn test_summary_can_be_switched_off() {
    let monitor = TicketMonitor::start().await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let job = job(&monitor, monitor.endpoints_with_summary(), notifier.clone()).with_summary(false);

    job.run(TriggerOrigin::Cli).await;

    assert_eq!(notifier.texts(), vec![EXPECTED_COMBINED, EXPECTED_AGING]);
    let requested: Vec<String> = monitor
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert!(!requested.iter().any(|p| p.contains("table") || p.contains("summary")));
}

#[tokio::test]
async fn test_summary_queries_carry_times_when_report_uses_dates() {
    let monitor = TicketMonitor::start().await;
    mount_summary_tables(&monitor).await;
    mount_closed_previous_year(&monitor).await;
    monitor.mount_defaults().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = ReportPipeline::new(
        common::fast_fetcher(),
        monitor.endpoints_with_summary(),
        QueryFormat::Date,
    );
    let job = ReportJob::new(
        pipeline,
        notifier.clone(),
        WindowStrategy::FixedStart {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        },
        chrono_tz::Asia::Jakarta,
        "-1001",
    )
    .with_clock(february_morning);

    job.run(TriggerOrigin::Cli).await;

    // the closed previous year is only recognized through its date-time query
    assert_eq!(notifier.texts().len(), 2);
    let table_bodies: Vec<serde_json::Value> = monitor
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/kip-out-table")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(
        table_bodies,
        vec![json!({"channel": "ALL", "start_date": "2023-01-01 00:00", "end_date": "2023-12-31 23:59"})]
    );
}
