// Seams between report runs and the outside world: where messages go and
// what starts a run.

use async_trait::async_trait;

use crate::delivery::NotifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Html,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub text: String,
    pub parse_mode: ParseMode,
}

impl OutboundMessage {
    pub fn html(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            parse_mode: ParseMode::Html,
        }
    }

    pub fn plain(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            parse_mode: ParseMode::Plain,
        }
    }
}

/// Delivers finished messages to a chat
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError>;
}

/// What started a report run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOrigin {
    /// `/start` received from a chat
    Command { chat_id: String },
    /// Daily schedule
    Schedule,
    /// One-shot run from the command line
    Cli,
}

impl TriggerOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            TriggerOrigin::Command { .. } => "command",
            TriggerOrigin::Schedule => "schedule",
            TriggerOrigin::Cli => "cli",
        }
    }
}

/// Result of one run, as seen by whoever fired it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub messages_sent: usize,
    pub errors: Vec<String>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Starts report runs; implemented by the report job
#[async_trait]
pub trait Trigger: Send + Sync {
    async fn fire(&self, origin: TriggerOrigin) -> RunOutcome;
}
