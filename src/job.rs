//! One report run, end to end: acknowledge the trigger, send the
//! previous-year summary when due, then the daily report. Runs are
//! serialized; a trigger arriving mid-run waits its turn.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, Instrument};

use crate::delivery::{Notifier, OutboundMessage, RunOutcome, Trigger, TriggerOrigin};
use crate::report::{render, ReportError, ReportPipeline};
use crate::telemetry::{create_report_span, generate_correlation_id};
use crate::window::{ReportWindow, WindowError, WindowStrategy};

pub const COMMAND_ACK: &str = "Bot is running and will send the combined report.";
pub const SCHEDULE_ACK: &str = "Scheduled report is being sent now.";

pub struct ReportJob {
    pipeline: ReportPipeline,
    notifier: Arc<dyn Notifier>,
    strategy: WindowStrategy,
    timezone: Tz,
    chat_id: String,
    summary_enabled: bool,
    run_lock: Mutex<()>,
    clock: fn() -> DateTime<Utc>,
}

impl ReportJob {
    pub fn new(
        pipeline: ReportPipeline,
        notifier: Arc<dyn Notifier>,
        strategy: WindowStrategy,
        timezone: Tz,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            notifier,
            strategy,
            timezone,
            chat_id: chat_id.into(),
            summary_enabled: true,
            run_lock: Mutex::new(()),
            clock: Utc::now,
        }
    }

    /// Whether the previous-year summary is attempted. It also needs its
    /// endpoints configured.
    pub fn with_summary(mut self, enabled: bool) -> Self {
        self.summary_enabled = enabled;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pipeline(&self) -> &ReportPipeline {
        &self.pipeline
    }

    /// Current wall-clock time in the report time zone
    pub fn now_local(&self) -> NaiveDateTime {
        (self.clock)().with_timezone(&self.timezone).naive_local()
    }

    pub fn resolve_window(&self) -> Result<ReportWindow, WindowError> {
        self.strategy.resolve(self.now_local())
    }

    pub async fn run(&self, origin: TriggerOrigin) -> RunOutcome {
        let _guard = self.run_lock.lock().await;
        let correlation_id = generate_correlation_id();
        let span = create_report_span(origin.label(), &correlation_id);
        self.run_locked(origin).instrument(span).await
    }

    async fn run_locked(&self, origin: TriggerOrigin) -> RunOutcome {
        let mut outcome = RunOutcome::default();
        let chat_id = match &origin {
            TriggerOrigin::Command { chat_id } => chat_id.clone(),
            TriggerOrigin::Schedule | TriggerOrigin::Cli => self.chat_id.clone(),
        };
        info!(chat_id = %chat_id, "Report run started");

        let ack = match origin {
            TriggerOrigin::Command { .. } => Some(COMMAND_ACK),
            TriggerOrigin::Schedule => Some(SCHEDULE_ACK),
            TriggerOrigin::Cli => None,
        };
        if let Some(ack) = ack {
            self.deliver(&mut outcome, OutboundMessage::plain(&chat_id, ack))
                .await;
        }

        let now = self.now_local();

        if self.summary_enabled && self.pipeline.endpoints().summary.is_some() {
            match self.build_summary(now, &origin, &chat_id).await {
                Ok(Some(summary)) => {
                    self.deliver(&mut outcome, OutboundMessage::html(&chat_id, summary))
                        .await
                }
                Ok(None) => {}
                Err(e) => self.report_failure(&mut outcome, &chat_id, &e).await,
            }
        }

        match self.build_daily(now, &chat_id).await {
            Ok(report) => {
                for message in report.messages() {
                    self.deliver(&mut outcome, OutboundMessage::html(&chat_id, message))
                        .await;
                }
            }
            Err(e) => self.report_failure(&mut outcome, &chat_id, &e).await,
        }

        info!(
            messages_sent = outcome.messages_sent,
            errors = outcome.errors.len(),
            "Report run finished"
        );
        outcome
    }

    async fn build_summary(
        &self,
        now: NaiveDateTime,
        origin: &TriggerOrigin,
        chat_id: &str,
    ) -> Result<Option<String>, ReportError> {
        let window = WindowStrategy::PreviousYear.resolve(now)?;
        self.pipeline
            .build_yearly_summary(&window, origin, chat_id)
            .await
    }

    async fn build_daily(
        &self,
        now: NaiveDateTime,
        chat_id: &str,
    ) -> Result<crate::report::DailyReport, ReportError> {
        let window = self.strategy.resolve(now)?;
        self.pipeline.build_daily_report(&window, chat_id).await
    }

    async fn report_failure(&self, outcome: &mut RunOutcome, chat_id: &str, e: &ReportError) {
        error!(error = %e, "Report generation failed");
        outcome.errors.push(e.to_string());
        self.deliver(outcome, OutboundMessage::plain(chat_id, render::error_notice(e)))
            .await;
    }

    async fn deliver(&self, outcome: &mut RunOutcome, message: OutboundMessage) {
        match self.notifier.send(&message).await {
            Ok(()) => outcome.messages_sent += 1,
            Err(e) => {
                error!(chat_id = %message.chat_id, error = %e, "Failed to deliver message");
                outcome.errors.push(e.to_string());
            }
        }
    }
}

#[async_trait]
impl Trigger for ReportJob {
    async fn fire(&self, origin: TriggerOrigin) -> RunOutcome {
        self.run(origin).await
    }
}
