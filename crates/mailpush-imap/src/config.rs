//! Connection settings

/// How the IMAP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    /// Implicit TLS, usually port 993
    Tls,
    /// Plaintext greeting upgraded with STARTTLS, usually port 143
    StartTls,
    /// No encryption at all
    Plain,
}

/// Wrapper for sensitive passwords
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the inner password value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Everything needed to open a session on one mailbox
#[derive(Debug, Clone)]
pub struct ImapConfig {
    /// IMAP server hostname
    pub host: String,
    /// IMAP server port
    pub port: u16,
    pub encryption: Encryption,
    pub username: String,
    pub password: Password,
    /// Mailbox to examine, usually `INBOX`
    pub mailbox: String,
}
