//! Error types for IMAP operations

use std::io;

use thiserror::Error;

/// Result type for operations on an open session
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for opening a session
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Errors that can occur while opening a session
#[derive(Debug, Error)]
pub enum ConnectError {
    /// TCP connection failed
    #[error("Failed to connect to IMAP server: {0}")]
    ConnectionFailed(String),

    /// TLS handshake or STARTTLS upgrade failed
    #[error("TLS error: {0}")]
    TlsError(String),

    /// The server closed the connection before greeting us
    #[error("IMAP server sent no greeting")]
    MissingGreeting,

    /// Login was rejected
    #[error("IMAP authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server does not advertise the IDLE capability
    #[error("IMAP server does not support IDLE")]
    IdleUnsupported,

    /// The mailbox could not be examined
    #[error("Cannot examine mailbox {mailbox}: {reason}")]
    MailboxUnavailable { mailbox: String, reason: String },
}

impl ConnectError {
    /// Whether retrying can never succeed
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConnectError::IdleUnsupported)
    }
}

/// Errors that can occur on an open session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The peer reset or dropped the connection
    #[error("Connection reset by peer: {0}")]
    ConnectionReset(String),

    /// Any other IO failure
    #[error("IO error: {0}")]
    Io(io::Error),

    /// Server answered BAD/NO or sent something we could not parse
    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    /// Session is not connected
    #[error("IMAP session is not connected")]
    NotConnected,

    /// Message not found
    #[error("Message not found: UID {0}")]
    MessageNotFound(u32),
}

impl SessionError {
    /// Transient errors leave the session object in place; the next
    /// connectivity check decides whether it has to be reopened.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::ConnectionReset(_))
    }

    /// Failures of one command on one message; the connection stays usable
    pub fn is_message_scoped(&self) -> bool {
        matches!(
            self,
            SessionError::MessageNotFound(_) | SessionError::Protocol(_)
        )
    }
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => SessionError::ConnectionReset(e.to_string()),
            _ => SessionError::Io(e),
        }
    }
}

impl From<async_imap::error::Error> for SessionError {
    fn from(e: async_imap::error::Error) -> Self {
        match e {
            async_imap::error::Error::Io(io) => io.into(),
            async_imap::error::Error::ConnectionLost => {
                SessionError::ConnectionReset("connection lost".to_string())
            }
            other => SessionError::Protocol(other.to_string()),
        }
    }
}
