//! IMAP session management for MailPush
//!
//! Opens read-only sessions on one mailbox, verifies IDLE support and
//! exposes the operations the watch loop needs behind [`MailSession`].

mod client;
mod config;
mod connect;
mod error;
mod message;
mod session;

pub use client::ImapSession;
pub use config::{Encryption, ImapConfig, Password};
pub use connect::{BoxedStream, ImapConnector, ImapStream};
pub use error::{ConnectError, ConnectResult, SessionError, SessionResult};
pub use message::{EmailAddress, Envelope, MailboxStatus};
pub use session::{
    Connector, EventSink, IdleEnd, IdleEvent, MailSession, StopHandle, StopSignal,
};
