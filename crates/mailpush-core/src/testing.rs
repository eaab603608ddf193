//! Scripted IMAP server and recording notifier for unit tests

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mailpush_imap::{
    ConnectError, ConnectResult, Connector, EmailAddress, Envelope, EventSink, IdleEnd, IdleEvent,
    MailSession, MailboxStatus, SessionError, SessionResult, StopSignal,
};
use mailpush_pushover::{Notification, Notifier, PushoverError, PushoverResult, Receipt};

/// A message stored on the fake server
#[derive(Debug, Clone)]
pub struct FakeMessage {
    pub address: String,
    pub raw: Vec<u8>,
}

/// Build a minimal RFC822 message
pub fn raw_message(name: &str, address: &str, subject: &str, body: &str) -> FakeMessage {
    let from = if name.is_empty() {
        address.to_string()
    } else {
        format!("\"{}\" <{}>", name, address)
    };
    let raw = format!(
        "From: {}\r\nTo: watcher@example.com\r\nSubject: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
        from, subject, body
    );
    FakeMessage {
        address: address.to_string(),
        raw: raw.into_bytes(),
    }
}

/// What the next IDLE call on any session does
#[derive(Debug)]
pub enum IdleStep {
    /// Deliver a new message, announce it with EXISTS, then wait for stop
    NewMail(u32, FakeMessage),
    /// Fail with a connection reset
    Reset,
    /// Fail with a protocol error
    ProtocolError,
    /// Server says BYE
    Bye,
}

/// How fetching an unfetchable UID fails
#[derive(Debug, Clone, Copy)]
pub enum FetchFailure {
    /// The server has no such message
    Missing,
    /// The server answers NO
    Rejected,
    /// The connection drops mid-fetch
    Reset,
}

impl FetchFailure {
    fn error(self, uid: u32) -> SessionError {
        match self {
            FetchFailure::Missing => SessionError::MessageNotFound(uid),
            FetchFailure::Rejected => SessionError::Protocol(format!("NO cannot fetch {}", uid)),
            FetchFailure::Reset => SessionError::ConnectionReset("reset by peer".into()),
        }
    }
}

#[derive(Debug, Default)]
struct ServerState {
    messages: BTreeMap<u32, FakeMessage>,
    unfetchable: BTreeMap<u32, FetchFailure>,
    search_failures: VecDeque<SessionError>,
    idle_script: VecDeque<IdleStep>,
    open_failures: VecDeque<ConnectError>,
    opens: usize,
    fetched: Vec<u32>,
    logouts: usize,
    disconnects: usize,
}

/// Shared state behind every fake session
#[derive(Debug, Clone, Default)]
pub struct FakeServer(Arc<Mutex<ServerState>>);

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.0.lock().unwrap()
    }

    pub fn add_message(&self, uid: u32, message: FakeMessage) {
        self.state().messages.insert(uid, message);
    }

    /// An unseen UID whose fetch fails
    pub fn add_unfetchable(&self, uid: u32, failure: FetchFailure) {
        self.state().unfetchable.insert(uid, failure);
    }

    /// Make the next unseen search fail
    pub fn fail_search(&self, error: SessionError) {
        self.state().search_failures.push_back(error);
    }

    pub fn push_idle(&self, step: IdleStep) {
        self.state().idle_script.push_back(step);
    }

    /// Make the next open attempt fail
    pub fn fail_open(&self, error: ConnectError) {
        self.state().open_failures.push_back(error);
    }

    /// Successful opens so far
    pub fn opens(&self) -> usize {
        self.state().opens
    }

    /// UIDs whose full body was fetched, in order
    pub fn fetched(&self) -> Vec<u32> {
        self.state().fetched.clone()
    }

    pub fn logouts(&self) -> usize {
        self.state().logouts
    }

    pub fn disconnects(&self) -> usize {
        self.state().disconnects
    }

    /// A session that does not count as an open
    pub fn session(&self) -> FakeSession {
        FakeSession {
            id: 0,
            server: self.clone(),
            connected: true,
        }
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            server: self.clone(),
        }
    }
}

#[derive(Debug)]
pub struct FakeConnector {
    server: FakeServer,
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn open(&self) -> ConnectResult<FakeSession> {
        let mut state = self.server.state();
        if let Some(error) = state.open_failures.pop_front() {
            return Err(error);
        }
        state.opens += 1;
        Ok(FakeSession {
            id: state.opens,
            server: self.server.clone(),
            connected: true,
        })
    }
}

#[derive(Debug)]
pub struct FakeSession {
    id: usize,
    server: FakeServer,
    connected: bool,
}

impl FakeSession {
    /// 1 for the first opened session, 2 for the second, and so on
    pub fn id(&self) -> usize {
        self.id
    }

    fn check(&self) -> SessionResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }
}

#[async_trait]
impl MailSession for FakeSession {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn mailbox_status(&mut self) -> SessionResult<MailboxStatus> {
        self.check()?;
        let state = self.server.state();
        let unseen = (state.messages.len() + state.unfetchable.len()) as u32;
        Ok(MailboxStatus {
            messages: unseen,
            unseen,
            recent: 0,
        })
    }

    async fn unseen_uids(&mut self) -> SessionResult<Vec<u32>> {
        self.check()?;
        let mut state = self.server.state();
        if let Some(error) = state.search_failures.pop_front() {
            return Err(error);
        }
        let uids: BTreeSet<u32> = state
            .messages
            .keys()
            .chain(state.unfetchable.keys())
            .copied()
            .collect();
        Ok(uids.into_iter().collect())
    }

    async fn fetch_envelope(&mut self, uid: u32) -> SessionResult<Envelope> {
        self.check()?;
        let state = self.server.state();
        if let Some(failure) = state.unfetchable.get(&uid) {
            return Err(failure.error(uid));
        }
        let message = state
            .messages
            .get(&uid)
            .ok_or(SessionError::MessageNotFound(uid))?;
        Ok(Envelope {
            subject: None,
            from: vec![EmailAddress::new(None, message.address.clone())],
            date: None,
        })
    }

    async fn fetch_message(&mut self, uid: u32) -> SessionResult<Vec<u8>> {
        self.check()?;
        let mut state = self.server.state();
        let raw = state
            .messages
            .get(&uid)
            .map(|m| m.raw.clone())
            .ok_or(SessionError::MessageNotFound(uid))?;
        state.fetched.push(uid);
        Ok(raw)
    }

    async fn idle(&mut self, stop: StopSignal, events: EventSink) -> SessionResult<IdleEnd> {
        self.check()?;
        let step = self.server.state().idle_script.pop_front();
        match step {
            None => {}
            Some(IdleStep::NewMail(uid, message)) => {
                let count = {
                    let mut state = self.server.state();
                    state.messages.insert(uid, message);
                    state.messages.len() as u32
                };
                let _ = events.send(IdleEvent::Exists(count));
            }
            Some(IdleStep::Reset) => {
                return Err(SessionError::ConnectionReset("reset by peer".into()));
            }
            Some(IdleStep::ProtocolError) => {
                return Err(SessionError::Protocol("BAD unexpected response".into()));
            }
            Some(IdleStep::Bye) => {
                self.connected = false;
                return Ok(IdleEnd::ServerClosed);
            }
        }
        stop.await;
        Ok(IdleEnd::Stopped)
    }

    async fn logout(&mut self) -> SessionResult<()> {
        self.check()?;
        self.connected = false;
        self.server.state().logouts += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.server.state().disconnects += 1;
    }
}

/// Records every notification; optionally fails them all
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Successfully delivered notifications
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> PushoverResult<Receipt> {
        if self.fail {
            return Err(PushoverError::Rejected {
                errors: vec!["application token is invalid".into()],
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(notification.clone());
        Ok(Receipt {
            request: format!("req-{}", sent.len()),
            receipt: None,
        })
    }
}
