use thiserror::Error;

/// Failures talking to the chat service. Request errors never carry the
/// request URL, since it embeds the bot token.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("telegram request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("telegram answered with HTTP {status}: {description}")]
    Status { status: u16, description: String },
    #[error("telegram rejected the request: {0}")]
    Rejected(String),
    #[error("telegram response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("could not write report: {0}")]
    Output(#[from] std::io::Error),
}

impl NotifyError {
    pub(crate) fn transport(source: reqwest::Error) -> Self {
        NotifyError::Transport(source.without_url())
    }

    pub(crate) fn decode(source: reqwest::Error) -> Self {
        NotifyError::Decode(source.without_url())
    }
}
