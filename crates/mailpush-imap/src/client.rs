//! IMAP session implementation

use std::pin::pin;

use async_imap::extensions::idle::IdleResponse;
use async_imap::Session;
use async_trait::async_trait;
use futures::future::{self, Either};
use futures::TryStreamExt;
use imap_proto::types::{MailboxDatum, Response, Status};
use tracing::{debug, info, warn};

use crate::connect::BoxedStream;
use crate::{
    Envelope, EventSink, IdleEnd, IdleEvent, MailSession, MailboxStatus, SessionError,
    SessionResult, StopSignal,
};

/// A live session on one examined mailbox
pub struct ImapSession {
    session: Option<Session<BoxedStream>>,
    mailbox: String,
}

impl std::fmt::Debug for ImapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapSession")
            .field("mailbox", &self.mailbox)
            .field("connected", &self.session.is_some())
            .finish()
    }
}

impl ImapSession {
    pub(crate) fn new(session: Session<BoxedStream>, mailbox: String) -> Self {
        Self {
            session: Some(session),
            mailbox,
        }
    }

    /// Get the session, returning an error if not connected
    fn session_mut(&mut self) -> SessionResult<&mut Session<BoxedStream>> {
        self.session.as_mut().ok_or(SessionError::NotConnected)
    }

    /// Convert an async-imap result, forgetting the connection when the
    /// transport is known to be broken.
    fn track<T>(&mut self, result: Result<T, async_imap::error::Error>) -> SessionResult<T> {
        result.map_err(|e| {
            let err = SessionError::from(e);
            if matches!(err, SessionError::ConnectionReset(_) | SessionError::Io(_)) {
                self.session = None;
            }
            err
        })
    }
}

#[async_trait]
impl MailSession for ImapSession {
    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn mailbox_status(&mut self) -> SessionResult<MailboxStatus> {
        let mailbox = self.mailbox.clone();
        let session = self.session_mut()?;
        let result = session.status(&mailbox, "(MESSAGES UNSEEN RECENT)").await;
        let status = self.track(result)?;

        Ok(MailboxStatus {
            messages: status.exists,
            unseen: status.unseen.unwrap_or(0),
            recent: status.recent,
        })
    }

    async fn unseen_uids(&mut self) -> SessionResult<Vec<u32>> {
        let session = self.session_mut()?;
        let result = session.uid_search("UNSEEN").await;
        let mut uids: Vec<u32> = self.track(result)?.into_iter().collect();
        uids.sort_unstable();

        debug!("Found {} unseen messages", uids.len());
        Ok(uids)
    }

    async fn fetch_envelope(&mut self, uid: u32) -> SessionResult<Envelope> {
        let session = self.session_mut()?;
        let result = async {
            let mut stream = session.uid_fetch(uid.to_string(), "ENVELOPE").await?;
            let mut envelope = None;
            while let Some(fetch) = stream.try_next().await? {
                if fetch.uid == Some(uid) {
                    if let Some(env) = fetch.envelope() {
                        envelope = Some(Envelope::from(env));
                    }
                }
            }
            Ok::<_, async_imap::error::Error>(envelope)
        }
        .await;

        self.track(result)?.ok_or(SessionError::MessageNotFound(uid))
    }

    async fn fetch_message(&mut self, uid: u32) -> SessionResult<Vec<u8>> {
        let session = self.session_mut()?;
        // BODY.PEEK[] leaves \Seen alone even on servers that ignore EXAMINE
        let result = async {
            let mut stream = session.uid_fetch(uid.to_string(), "BODY.PEEK[]").await?;
            let mut body = None;
            while let Some(fetch) = stream.try_next().await? {
                if fetch.uid == Some(uid) {
                    if let Some(bytes) = fetch.body() {
                        body = Some(bytes.to_vec());
                    }
                }
            }
            Ok::<_, async_imap::error::Error>(body)
        }
        .await;

        let body = self.track(result)?.ok_or(SessionError::MessageNotFound(uid))?;
        debug!("Fetched body: {} bytes", body.len());
        Ok(body)
    }

    async fn idle(&mut self, mut stop: StopSignal, events: EventSink) -> SessionResult<IdleEnd> {
        let session = self.session.take().ok_or(SessionError::NotConnected)?;
        let mut handle = session.idle();
        handle.init().await?;
        debug!("IMAP IDLE continuation request received");

        let mut stopped = false;
        let end = loop {
            let (wait, interrupt) = handle.wait();
            let wait = pin!(wait);
            let response = match future::select(wait, &mut stop).await {
                Either::Left((response, _)) => response,
                Either::Right(((), wait)) => {
                    // Dropping the interrupt makes async-imap end the wait cleanly
                    stopped = true;
                    drop(interrupt);
                    wait.await
                }
            };

            match response? {
                IdleResponse::NewData(data) => match data.parsed() {
                    Response::MailboxData(MailboxDatum::Exists(count)) => {
                        info!("New message exists ({} in mailbox)", count);
                        let _ = events.send(IdleEvent::Exists(*count));
                    }
                    Response::Data {
                        status: Status::Bye,
                        information,
                        ..
                    } => {
                        warn!("Server ended IDLE with BYE: {:?}", information);
                        return Ok(IdleEnd::ServerClosed);
                    }
                    other => debug!("Ignoring IDLE data: {:?}", other),
                },
                // async-imap's own wait bound; only the stop signal ends the cycle
                IdleResponse::Timeout => debug!("IDLE wait bound reached, waiting again"),
                IdleResponse::ManualInterrupt => break IdleEnd::Stopped,
            }

            // Data raced the stop request; the signal is spent, so finish now
            if stopped {
                break IdleEnd::Stopped;
            }
        };

        let session = handle.done().await?;
        self.session = Some(session);
        Ok(end)
    }

    async fn logout(&mut self) -> SessionResult<()> {
        if let Some(mut session) = self.session.take() {
            session.logout().await?;
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.session.take().is_some() {
            debug!("Dropped IMAP connection to {}", self.mailbox);
        }
    }
}
