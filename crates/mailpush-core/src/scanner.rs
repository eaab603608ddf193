//! Unread message scanning

use std::collections::HashSet;

use mailpush_imap::{MailSession, SessionResult};
use mailpush_pushover::Notifier;
use tracing::{debug, error, info, warn};

use crate::dispatch::dispatch;
use crate::extract::{extract_text, parse_message};
use crate::filter::decide;
use crate::{DeliveryOptions, NotifyRules};

/// UIDs already routed through the rules during this process run
#[derive(Debug, Default)]
pub struct SeenMessages(HashSet<u32>);

impl SeenMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, uid: u32) -> bool {
        self.0.contains(&uid)
    }

    /// Returns false if the UID was already present
    pub fn insert(&mut self, uid: u32) -> bool {
        self.0.insert(uid)
    }
}

/// Everything the rules and the notification need from one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub uid: u32,
    /// Display name of the first sender, empty when absent
    pub name: String,
    pub address: String,
    pub subject: String,
    /// Whitespace-normalized body text
    pub text: String,
}

/// Counters for one pass over the unseen messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Unseen messages fetched and run through the rules
    pub examined: usize,
    /// Unseen messages skipped because they were seen earlier
    pub skipped: usize,
    /// Unseen messages that could not be fetched; retried next pass
    pub unreadable: usize,
    pub notified: usize,
    /// Notifications that could not be delivered
    pub failed: usize,
}

impl std::fmt::Display for ScanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} examined, {} skipped, {} unreadable, {} notified, {} failed",
            self.examined, self.skipped, self.unreadable, self.notified, self.failed
        )
    }
}

/// Runs unseen messages through the rules and sends notifications
pub struct Scanner<N> {
    rules: NotifyRules,
    delivery: DeliveryOptions,
    notifier: N,
}

impl<N: Notifier> Scanner<N> {
    pub fn new(rules: NotifyRules, delivery: DeliveryOptions, notifier: N) -> Self {
        Self {
            rules,
            delivery,
            notifier,
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Process every unseen message not yet in `seen`, in UID order.
    ///
    /// A message that cannot be fetched is logged, left unseen for the next
    /// pass and skipped. Only connection-level failures abort the pass.
    /// Delivery failures are logged and counted.
    pub async fn scan<S: MailSession + ?Sized>(
        &self,
        session: &mut S,
        seen: &mut SeenMessages,
    ) -> SessionResult<ScanReport> {
        info!("Checking for unread messages");

        match session.mailbox_status().await {
            Ok(status) => debug!(
                "Mailbox has {} messages, {} unseen, {} recent",
                status.messages, status.unseen, status.recent
            ),
            Err(e) => warn!("STATUS failed: {}", e),
        }

        let mut report = ScanReport::default();
        for uid in session.unseen_uids().await? {
            if seen.contains(uid) {
                debug!("Already seen message {}", uid);
                report.skipped += 1;
                continue;
            }

            let record = match read_message(session, uid).await {
                Ok(record) => record,
                Err(e) if e.is_message_scoped() => {
                    error!("Cannot read message {}: {}", uid, e);
                    report.unreadable += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            report.examined += 1;
            info!(
                "New message {} from {} <{}>: {}",
                uid, record.name, record.address, record.subject
            );

            let decision = decide(
                &record.name,
                &record.address,
                &record.subject,
                &record.text,
                &self.rules,
            );
            if decision.should_notify() {
                match dispatch(&self.notifier, &record, decision.priority, &self.delivery).await {
                    Ok(receipt) => {
                        info!("Notified message {} ({})", uid, receipt);
                        report.notified += 1;
                    }
                    Err(e) => {
                        error!("Failed to notify message {}: {}", uid, e);
                        report.failed += 1;
                    }
                }
            }

            seen.insert(uid);
        }

        Ok(report)
    }
}

async fn read_message<S: MailSession + ?Sized>(
    session: &mut S,
    uid: u32,
) -> SessionResult<MessageRecord> {
    let envelope = session.fetch_envelope(uid).await?;
    let raw = session.fetch_message(uid).await?;

    let mut record = MessageRecord {
        uid,
        name: String::new(),
        address: envelope.sender_address().unwrap_or_default().to_string(),
        subject: envelope.subject.clone().unwrap_or_default(),
        text: String::new(),
    };

    let Some(message) = parse_message(&raw) else {
        warn!("Message {} could not be parsed", uid);
        return Ok(record);
    };

    let sender = message.from().and_then(|from| from.first());
    if let Some(name) = sender.and_then(|addr| addr.name()) {
        record.name = name.to_string();
    }
    if record.address.is_empty() {
        if let Some(address) = sender.and_then(|addr| addr.address()) {
            record.address = address.to_string();
        }
    }
    if let Some(subject) = message.subject() {
        record.subject = subject.to_string();
    }
    record.text = extract_text(&message);

    Ok(record)
}
