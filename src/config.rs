use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::report::EndpointSet;
use crate::schedule::DailySchedule;
use crate::window::{QueryFormat, WindowStrategy};

/// Configuration file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "sla-report-bot.toml";
pub const ENV_PREFIX: &str = "SLA_REPORT";
const ENV_SEPARATOR: &str = "__";
const REDACTED: &str = "<redacted>";

/// Flat variable names of older deployments, applied last
const LEGACY_ENV: [(&str, LegacyField); 10] = [
    ("BOT_TOKEN", LegacyField::BotToken),
    ("CHAT_ID", LegacyField::ChatId),
    ("API_Unclosed", LegacyField::Unclosed),
    ("API_OpenInSLA", LegacyField::OpenInSla),
    ("API_OpenOutSLA", LegacyField::OpenOutSla),
    ("API_Closed", LegacyField::Closed),
    ("API_ClosedInSLA", LegacyField::ClosedInSla),
    ("API_ClosedOutSLA", LegacyField::ClosedOutSla),
    ("API_KIPOutSLA", LegacyField::KipRanking),
    ("API_AgingOpenOut", LegacyField::Aging),
];

#[derive(Debug, Clone, Copy)]
enum LegacyField {
    BotToken,
    ChatId,
    Unclosed,
    OpenInSla,
    OpenOutSla,
    Closed,
    ClosedInSla,
    ClosedOutSla,
    KipRanking,
    Aging,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    MissingField(&'static str),
    #[error("{field} is not an http(s) URL: {url}")]
    InvalidUrl { field: &'static str, url: String },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Main configuration structure for the SLA report bot
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReportBotConfig {
    pub telegram: TelegramConfig,
    pub endpoints: EndpointConfig,
    pub fetch: FetchConfig,
    pub schedule: ScheduleConfig,
    pub window: WindowConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token (BOT_TOKEN also works)
    pub bot_token: Option<String>,
    /// Chat receiving scheduled reports (CHAT_ID also works)
    pub chat_id: Option<String>,
    pub api_base: String,
    /// Long-poll timeout for getUpdates
    pub poll_timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_seconds: 30,
        }
    }
}

/// Ticket-monitor URLs
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointConfig {
    pub unclosed: Option<String>,
    pub open_in_sla: Option<String>,
    pub open_out_sla: Option<String>,
    pub closed: Option<String>,
    pub closed_in_sla: Option<String>,
    pub closed_out_sla: Option<String>,
    pub kip_ranking: Option<String>,
    pub aging: Option<String>,
    /// Background export of the detailed report
    pub detail_export: Option<String>,
    /// Previous-year summary; disabled when absent
    pub summary: Option<SummaryEndpointConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SummaryEndpointConfig {
    pub kip_out_table: String,
    pub kip_in_table: String,
    pub check: String,
    pub insert: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 6-field (with seconds) or 5-field cron expression
    pub cron: String,
    /// IANA zone the schedule and the report window are evaluated in
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 9 * * *".to_string(),
            timezone: "Asia/Jakarta".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct WindowConfig {
    pub query_format: QueryFormat,
    pub strategy: WindowStrategy,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level, overridden by RUST_LOG
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl ReportBotConfig {
    /// Load configuration with precedence, lowest first:
    /// 1. Default values
    /// 2. Configuration file (`path`, else `sla-report-bot.toml` if present)
    /// 3. Environment variables (`SLA_REPORT__SECTION__KEY`)
    /// 4. Legacy flat variables (`BOT_TOKEN`, `CHAT_ID`, `API_*`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, std::env::vars().collect())
    }

    /// Same as [`ReportBotConfig::load`] with an explicit environment
    pub fn load_with_env(path: Option<&Path>, env: HashMap<String, String>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(
                    File::from(Path::new(DEFAULT_CONFIG_FILE)).format(FileFormat::Toml),
                );
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(Some(env.clone())),
        );

        let mut loaded: ReportBotConfig = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        loaded.apply_legacy_env(&env);
        Ok(loaded)
    }

    fn apply_legacy_env(&mut self, env: &HashMap<String, String>) {
        for (name, field) in LEGACY_ENV {
            let Some(value) = env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
                continue;
            };
            let value = Some(value.to_string());
            let endpoints = &mut self.endpoints;
            match field {
                LegacyField::BotToken => self.telegram.bot_token = value,
                LegacyField::ChatId => self.telegram.chat_id = value,
                LegacyField::Unclosed => endpoints.unclosed = value,
                LegacyField::OpenInSla => endpoints.open_in_sla = value,
                LegacyField::OpenOutSla => endpoints.open_out_sla = value,
                LegacyField::Closed => endpoints.closed = value,
                LegacyField::ClosedInSla => endpoints.closed_in_sla = value,
                LegacyField::ClosedOutSla => endpoints.closed_out_sla = value,
                LegacyField::KipRanking => endpoints.kip_ranking = value,
                LegacyField::Aging => endpoints.aging = value,
            }
        }
    }

    /// Load .env file if it exists. Returns whether one was loaded, so the
    /// caller can log it once telemetry is up.
    pub fn load_env_file() -> Result<bool> {
        Self::load_env_file_from(Path::new(".env"))
    }

    pub fn load_env_file_from(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        dotenvy::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        Ok(true)
    }

    /// Bot token and destination chat, both required to talk to Telegram
    pub fn require_telegram(&self) -> Result<(&str, &str), ConfigError> {
        let token = non_blank(self.telegram.bot_token.as_deref())
            .ok_or(ConfigError::MissingField("telegram.bot_token"))?;
        let chat_id = non_blank(self.telegram.chat_id.as_deref())
            .ok_or(ConfigError::MissingField("telegram.chat_id"))?;
        Ok((token, chat_id))
    }

    /// Check everything a report run needs, short of network access
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.fetch.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch.timeout_seconds",
                reason: "must be positive".to_string(),
            });
        }
        EndpointSet::from_config(&self.endpoints)?;
        DailySchedule::new(&self.schedule.cron, &self.schedule.timezone).map_err(|e| {
            ConfigError::Invalid {
                field: "schedule",
                reason: e.to_string(),
            }
        })?;
        Ok(())
    }

    /// Copy safe to print: the bot token is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.telegram.bot_token.is_some() {
            copy.telegram.bot_token = Some(REDACTED.to_string());
        }
        copy
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
