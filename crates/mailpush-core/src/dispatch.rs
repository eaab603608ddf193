//! Formatting and sending one alert

use mailpush_pushover::{Notification, Notifier, PushoverResult, Receipt};

use crate::{DeliveryOptions, MessageRecord};

/// Sent instead of an empty body
pub const EMPTY_BODY: &str = "no mail body";

/// Title shown on the device: display name if known, address otherwise
pub fn notification_title(name: &str, address: &str, subject: &str) -> String {
    if name.is_empty() {
        format!("{} - {}", address, subject)
    } else {
        format!("{} - {}", name, subject)
    }
}

/// First `max_chars` characters of the body, or [`EMPTY_BODY`]
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    let short: String = body.chars().take(max_chars).collect();
    if short.is_empty() {
        EMPTY_BODY.to_string()
    } else {
        short
    }
}

pub fn build_notification(
    record: &MessageRecord,
    priority: i64,
    options: &DeliveryOptions,
) -> Notification {
    Notification {
        title: notification_title(&record.name, &record.address, &record.subject),
        message: truncate_body(&record.text, options.body_length),
        priority,
        device: options.device.clone(),
        sound: options.sound.clone(),
        url: options.url.clone(),
        url_title: options.url_title.clone(),
        retry: options.retry,
        expire: options.expire,
    }
}

/// Send one notification; failures are returned, never retried here
pub async fn dispatch<N: Notifier + ?Sized>(
    notifier: &N,
    record: &MessageRecord,
    priority: i64,
    options: &DeliveryOptions,
) -> PushoverResult<Receipt> {
    let notification = build_notification(record, priority, options);
    notifier.send(&notification).await
}
