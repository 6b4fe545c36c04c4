use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sla_report_bot::delivery::Notifier;
use sla_report_bot::schedule::parse_timezone;
use sla_report_bot::{
    init_telemetry, DailySchedule, EndpointSet, JsonFetcher, OperationTimer, QueryFormat,
    ReportBotConfig, ReportJob, ReportPipeline, RetryPolicy, ShutdownCoordinator, StdoutNotifier,
    TelegramCommandListener, TelegramNotifier, Trigger, TriggerOrigin,
};

#[derive(Parser)]
#[command(name = "sla-report-bot")]
#[command(about = "Daily SLA ticket report delivered to Telegram")]
#[command(long_about = "Aggregates ticket-monitor counts, KIP rankings and aging clusters into a \
                       report sent to a Telegram chat every day, and whenever someone sends /start.")]
struct Cli {
    /// Configuration file (defaults to ./sla-report-bot.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily schedule and the /start listener until interrupted (default)
    Run,
    /// Build and deliver one report now
    Report {
        /// Print the messages instead of sending them to Telegram
        #[arg(long)]
        stdout: bool,
        /// Also build the previous-year summary when it is due
        #[arg(long)]
        summary: bool,
    },
    /// Show the reporting window a run would use now
    Window,
    /// Validate the configuration and print it with secrets masked
    CheckConfig,
    /// List upcoming scheduled runs
    NextRun {
        #[arg(long, default_value = "5", help = "Number of firings to list")]
        count: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_file_loaded = ReportBotConfig::load_env_file()?;
    let config = ReportBotConfig::load(cli.config.as_deref())?;
    init_telemetry(&config.observability)?;
    if env_file_loaded {
        info!("Loaded environment variables from .env file");
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => tokio::runtime::Runtime::new()?.block_on(run_command(config)),
        Commands::Report { stdout, summary } => {
            tokio::runtime::Runtime::new()?.block_on(report_command(config, stdout, summary))
        }
        Commands::Window => window_command(&config),
        Commands::CheckConfig => check_config_command(&config),
        Commands::NextRun { count } => next_run_command(&config, count),
    }
}

fn build_pipeline(config: &ReportBotConfig) -> Result<ReportPipeline> {
    let endpoints = EndpointSet::from_config(&config.endpoints)?;
    let fetcher = JsonFetcher::new(
        RetryPolicy::from_config(&config.fetch),
        Duration::from_secs(config.fetch.timeout_seconds),
    )?;
    Ok(ReportPipeline::new(fetcher, endpoints, config.window.query_format))
}

async fn run_command(config: ReportBotConfig) -> Result<()> {
    config.validate()?;
    let (token, chat_id) = config.require_telegram()?;
    let schedule = DailySchedule::new(&config.schedule.cron, &config.schedule.timezone)?;
    let pipeline = build_pipeline(&config)?;
    let client = pipeline.fetcher().client().clone();

    let notifier = Arc::new(TelegramNotifier::new(
        client.clone(),
        &config.telegram.api_base,
        token,
    ));
    let job = Arc::new(ReportJob::new(
        pipeline,
        notifier,
        config.window.strategy.clone(),
        schedule.timezone(),
        chat_id,
    ));
    let trigger: Arc<dyn Trigger> = job.clone();

    let listener = TelegramCommandListener::new(
        client,
        &config.telegram.api_base,
        token,
        Duration::from_secs(config.telegram.poll_timeout_seconds),
    );

    let shutdown = ShutdownCoordinator::new();
    let schedule_task = {
        let trigger = Arc::clone(&trigger);
        let receiver = shutdown.subscribe();
        tokio::spawn(async move { schedule.run(trigger, receiver).await })
    };
    let listener_task = tokio::spawn(listener.run(trigger, shutdown.subscribe()));

    info!("SLA report bot running");
    shutdown.wait_for_signal().await?;

    let (schedule_result, listener_result) = tokio::join!(schedule_task, listener_task);
    if let Err(e) = schedule_result {
        warn!(error = %e, "Schedule task ended abnormally");
    }
    if let Err(e) = listener_result {
        warn!(error = %e, "Listener task ended abnormally");
    }

    job.pipeline().fetcher().metrics().log_stats();
    info!("Graceful shutdown completed successfully");
    Ok(())
}

async fn report_command(config: ReportBotConfig, stdout: bool, summary: bool) -> Result<()> {
    config.validate()?;
    let timezone = parse_timezone(&config.schedule.timezone)?;
    let pipeline = build_pipeline(&config)?;

    let (notifier, chat_id): (Arc<dyn Notifier>, String) = if stdout {
        let chat_id = config.telegram.chat_id.clone().unwrap_or_default();
        (Arc::new(StdoutNotifier), chat_id)
    } else {
        let (token, chat_id) = config.require_telegram()?;
        let notifier = TelegramNotifier::new(
            pipeline.fetcher().client().clone(),
            &config.telegram.api_base,
            token,
        );
        (Arc::new(notifier), chat_id.to_string())
    };

    let timer = OperationTimer::new("report");
    let job = ReportJob::new(
        pipeline,
        notifier,
        config.window.strategy.clone(),
        timezone,
        chat_id,
    )
    .with_summary(summary);
    let outcome = job.run(TriggerOrigin::Cli).await;
    timer.finish();
    job.pipeline().fetcher().metrics().log_stats();

    if !outcome.is_success() {
        bail!(
            "report finished with {} error(s): {}",
            outcome.errors.len(),
            outcome.errors.join("; ")
        );
    }
    Ok(())
}

fn window_command(config: &ReportBotConfig) -> Result<()> {
    let timezone = parse_timezone(&config.schedule.timezone)?;
    let now = Utc::now().with_timezone(&timezone).naive_local();
    let window = config.window.strategy.resolve(now)?;

    println!("Window:    {}", window.display_range());
    println!("Date:      {}", window.query_range(QueryFormat::Date));
    println!("Date-time: {}", window.query_range(QueryFormat::DateTime));
    println!("Sent as:   {}", window.query_range(config.window.query_format));
    Ok(())
}

fn check_config_command(config: &ReportBotConfig) -> Result<()> {
    print!("{}", config.redacted().to_toml()?);
    config.validate()?;
    if let Err(e) = config.require_telegram() {
        warn!(error = %e, "Telegram is not configured; only `report --stdout` will work");
    }
    println!();
    println!("# configuration is valid");
    Ok(())
}

fn next_run_command(config: &ReportBotConfig, count: usize) -> Result<()> {
    let schedule = DailySchedule::new(&config.schedule.cron, &config.schedule.timezone)?;
    for at in schedule.upcoming(Utc::now(), count) {
        println!("{}", at.format("%Y-%m-%d %H:%M:%S %Z"));
    }
    Ok(())
}
