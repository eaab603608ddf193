//! The watch loop
//!
//! Each step makes sure a primary session exists, catches up on unseen mail,
//! then IDLEs until the wait timer ends the cycle. New mail announced during
//! the wait is scanned on a short-lived secondary session so the primary
//! never leaves IDLE early.

use std::convert::Infallible;
use std::time::Duration;

use mailpush_imap::{Connector, IdleEnd, IdleEvent, MailSession};
use mailpush_pushover::Notifier;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::scanner::{Scanner, SeenMessages};
use crate::timer::WaitTimer;
use crate::WatchError;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(300); // 5 minutes

/// Watches one mailbox for as long as the process lives
pub struct Watcher<C: Connector, N> {
    connector: C,
    scanner: Scanner<N>,
    seen: SeenMessages,
    sleep_time: Duration,
    primary: Option<C::Session>,
    connected_once: bool,
    reconnect_delay: Duration,
}

impl<C: Connector, N: Notifier> Watcher<C, N> {
    pub fn new(connector: C, scanner: Scanner<N>, sleep_time: Duration) -> Self {
        Self {
            connector,
            scanner,
            seen: SeenMessages::new(),
            sleep_time,
            primary: None,
            connected_once: false,
            reconnect_delay: INITIAL_RECONNECT_DELAY,
        }
    }

    /// Run until a fatal error occurs
    pub async fn run(mut self) -> Result<Infallible, WatchError> {
        loop {
            self.step().await?;
        }
    }

    /// One pass through the loop: connect if needed, scan, then one IDLE cycle
    pub async fn step(&mut self) -> Result<(), WatchError> {
        if !self.ensure_connected().await? {
            return Ok(());
        }

        let Self {
            connector,
            scanner,
            seen,
            sleep_time,
            primary,
            reconnect_delay,
            ..
        } = self;
        let Some(session) = primary.as_mut() else {
            return Ok(());
        };

        match scanner.scan(session, seen).await {
            Ok(report) => {
                info!("Scan finished: {}", report);
                *reconnect_delay = INITIAL_RECONNECT_DELAY;
            }
            Err(e) if e.is_transient() => {
                warn!("Scan interrupted: {}; retrying in {:?}", e, reconnect_delay);
                back_off(reconnect_delay).await;
                return Ok(());
            }
            Err(e) => {
                error!(
                    "Scan failed, dropping session: {}; reconnecting in {:?}",
                    e, reconnect_delay
                );
                session.disconnect();
                *primary = None;
                back_off(reconnect_delay).await;
                return Ok(());
            }
        }

        let (timer, stop) = WaitTimer::start(*sleep_time);
        let (events, mut incoming) = mpsc::unbounded_channel();

        // Secondary scans run one at a time on this flow, so `seen` keeps a
        // single owner while the primary waits.
        let reacting = async {
            let mut unsupported = false;
            while let Some(IdleEvent::Exists(count)) = incoming.recv().await {
                info!("New mail, mailbox now holds {} messages", count);
                match connector.open().await {
                    Ok(mut secondary) => {
                        match scanner.scan(&mut secondary, seen).await {
                            Ok(report) => info!("Rescan finished: {}", report),
                            Err(e) => error!("Rescan failed: {}", e),
                        }
                        if let Err(e) = secondary.logout().await {
                            debug!("Logout of rescan session failed: {}", e);
                            secondary.disconnect();
                        }
                    }
                    Err(e) if e.is_fatal() => {
                        error!("Cannot open rescan session: {}", e);
                        unsupported = true;
                        break;
                    }
                    Err(e) => warn!("Cannot open rescan session: {}", e),
                }
            }
            unsupported
        };

        info!("Starting IDLE");
        let (outcome, unsupported) = tokio::join!(session.idle(stop, events), reacting);
        drop(timer);

        match outcome {
            Ok(IdleEnd::Stopped) => info!("IDLE ended"),
            Ok(IdleEnd::ServerClosed) => warn!("Server closed the connection during IDLE"),
            Err(e) if e.is_transient() => warn!("IDLE interrupted: {}", e),
            Err(e) => {
                error!("IDLE failed, dropping session: {}", e);
                session.disconnect();
                *primary = None;
            }
        }

        if unsupported {
            return Err(WatchError::IdleUnsupported);
        }
        Ok(())
    }

    /// Make sure a live primary session is held.
    ///
    /// Returns false after a failed reconnect, once the backoff delay passed.
    /// The delay resets only after a scan succeeds on the new session.
    async fn ensure_connected(&mut self) -> Result<bool, WatchError> {
        if self.primary.as_ref().is_some_and(|s| s.is_connected()) {
            return Ok(true);
        }

        if let Some(mut stale) = self.primary.take() {
            info!("IMAP session lost, reconnecting");
            stale.disconnect();
        }

        info!("Connecting to IMAP server");
        match self.connector.open().await {
            Ok(session) => {
                info!("IMAP session established");
                self.primary = Some(session);
                self.connected_once = true;
                Ok(true)
            }
            Err(e) if e.is_fatal() => {
                error!("{}", e);
                Err(WatchError::IdleUnsupported)
            }
            Err(e) if !self.connected_once => Err(WatchError::InitialConnect(e)),
            Err(e) => {
                warn!(
                    "Reconnect failed: {}; retrying in {:?}",
                    e, self.reconnect_delay
                );
                back_off(&mut self.reconnect_delay).await;
                Ok(false)
            }
        }
    }
}

/// Wait out `delay`, then double it up to the cap
async fn back_off(delay: &mut Duration) {
    tokio::time::sleep(*delay).await;
    *delay = (*delay * 2).min(MAX_RECONNECT_DELAY);
}
