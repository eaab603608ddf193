//! MailPush core
//!
//! Configuration, message text extraction, keyword rules, notification
//! formatting and the IDLE watch loop that ties them to one mailbox.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod filter;
pub mod scanner;
pub mod timer;
pub mod watch;

#[cfg(test)]
mod testing;

pub use config::{Config, DeliveryOptions, NotifyRule, NotifyRules, Secret};
pub use dispatch::{build_notification, dispatch, EMPTY_BODY};
pub use error::{ConfigError, WatchError};
pub use extract::{extract_text, html_to_text, normalize_whitespace, parse_message};
pub use filter::{decide, FilterDecision, NO_MATCH};
pub use scanner::{MessageRecord, ScanReport, Scanner, SeenMessages};
pub use timer::WaitTimer;
pub use watch::Watcher;
