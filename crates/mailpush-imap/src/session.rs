//! Session abstractions shared by the IMAP client and the watch loop

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::{ConnectResult, Envelope, MailboxStatus, SessionResult};

/// Unsolicited server data observed while idling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    /// `* n EXISTS`: the mailbox now holds `n` messages
    Exists(u32),
}

/// Channel the session pushes [`IdleEvent`]s into while a wait is in flight
pub type EventSink = mpsc::UnboundedSender<IdleEvent>;

/// Why an IDLE wait returned without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEnd {
    /// The stop signal fired and DONE was sent; the session is still usable
    Stopped,
    /// The server said BYE; the session is gone
    ServerClosed,
}

/// Requests a graceful end of one IDLE wait.
///
/// Firing after the wait already returned is a no-op.
#[derive(Debug)]
pub struct StopHandle(oneshot::Sender<()>);

impl StopHandle {
    /// Ask the wait to finish; returns false if nobody is waiting anymore
    pub fn stop(self) -> bool {
        self.0.send(()).is_ok()
    }
}

/// Resolves once the paired [`StopHandle`] fires or is dropped
#[derive(Debug)]
pub struct StopSignal(oneshot::Receiver<()>);

impl StopSignal {
    pub fn pair() -> (StopHandle, StopSignal) {
        let (tx, rx) = oneshot::channel();
        (StopHandle(tx), StopSignal(rx))
    }
}

impl Future for StopSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.0).poll(cx).map(|_| ())
    }
}

/// An authenticated session with one mailbox examined read-only
#[async_trait]
pub trait MailSession: Send {
    /// Whether the underlying connection is believed to be alive
    fn is_connected(&self) -> bool;

    /// Current message counters of the examined mailbox
    async fn mailbox_status(&mut self) -> SessionResult<MailboxStatus>;

    /// UIDs of messages without the `\Seen` flag, ascending
    async fn unseen_uids(&mut self) -> SessionResult<Vec<u32>>;

    async fn fetch_envelope(&mut self, uid: u32) -> SessionResult<Envelope>;

    /// Full RFC822 message without setting `\Seen`
    async fn fetch_message(&mut self, uid: u32) -> SessionResult<Vec<u8>>;

    /// Enter IDLE and stay there until `stop` fires or the server ends it.
    ///
    /// Every EXISTS seen in between is forwarded to `events` without
    /// leaving IDLE.
    async fn idle(&mut self, stop: StopSignal, events: EventSink) -> SessionResult<IdleEnd>;

    /// Polite LOGOUT
    async fn logout(&mut self) -> SessionResult<()>;

    /// Drop the connection without talking to the server
    fn disconnect(&mut self);
}

/// Opens sessions against one configured mailbox
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: MailSession;

    /// Connect, authenticate, verify IDLE support and examine the mailbox
    async fn open(&self) -> ConnectResult<Self::Session>;
}
