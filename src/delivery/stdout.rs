use async_trait::async_trait;
use std::io::Write;

use crate::delivery::{Notifier, NotifyError, OutboundMessage};

/// Writes messages to standard output instead of a chat
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", message.text)?;
        writeln!(stdout)?;
        stdout.flush()?;
        Ok(())
    }
}
