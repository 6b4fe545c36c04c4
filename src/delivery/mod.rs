pub mod errors;
pub mod stdout;
pub mod telegram;
pub mod traits;

pub use errors::NotifyError;
pub use stdout::StdoutNotifier;
pub use telegram::{parse_start_command, TelegramCommandListener, TelegramNotifier};
pub use traits::{Notifier, OutboundMessage, ParseMode, RunOutcome, Trigger, TriggerOrigin};
