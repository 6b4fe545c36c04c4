// SLA report bot library - ticket-monitor aggregation and Telegram delivery
// This exposes the core components for testing and integration

pub mod config;
pub mod delivery;
pub mod http;
pub mod job;
pub mod observability;
pub mod report;
pub mod schedule;
pub mod shutdown;
pub mod telemetry;
pub mod window;

// Re-export key types for easy access
pub use config::{ConfigError, ReportBotConfig};
pub use delivery::{
    Notifier, NotifyError, OutboundMessage, StdoutNotifier, TelegramCommandListener,
    TelegramNotifier, Trigger, TriggerOrigin,
};
pub use http::{Endpoint, FetchError, JsonFetcher, RetryPolicy};
pub use job::ReportJob;
pub use observability::{FetchMetrics, OperationTimer};
pub use report::{DailyReport, EndpointSet, ReportError, ReportPipeline};
pub use schedule::{DailySchedule, ScheduleError};
pub use shutdown::ShutdownCoordinator;
pub use telemetry::{create_report_span, generate_correlation_id, init_telemetry};
pub use window::{QueryFormat, ReportWindow, WindowError, WindowStrategy};
