//! Pushover notification client for MailPush
//!
//! Sends one alert per call through the Pushover messages API.

mod client;
mod error;

pub use client::{Notification, Notifier, PushoverClient, Receipt};
pub use error::{PushoverError, PushoverResult};
