//! IMAP message types

use std::borrow::Cow;

/// Email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address, mailbox and host joined with `@`
    pub address: String,
}

impl EmailAddress {
    pub fn new(name: Option<String>, address: String) -> Self {
        Self { name, address }
    }

    fn from_proto(addr: &imap_proto::types::Address<'_>) -> Self {
        let mailbox = lossy(addr.mailbox.as_ref());
        let host = lossy(addr.host.as_ref());
        let name = addr
            .name
            .as_ref()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .filter(|s| !s.is_empty());
        Self::new(name, format!("{}@{}", mailbox, host))
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// Envelope data from IMAP FETCH
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Subject line
    pub subject: Option<String>,
    /// From addresses
    pub from: Vec<EmailAddress>,
    /// Date sent
    pub date: Option<String>,
}

impl Envelope {
    /// Address of the first From entry, if any
    pub fn sender_address(&self) -> Option<&str> {
        self.from.first().map(|a| a.address.as_str())
    }
}

impl From<&imap_proto::types::Envelope<'_>> for Envelope {
    fn from(env: &imap_proto::types::Envelope<'_>) -> Self {
        Self {
            subject: env
                .subject
                .as_ref()
                .map(|s| String::from_utf8_lossy(s).into_owned()),
            from: env
                .from
                .as_ref()
                .map(|v| v.iter().map(EmailAddress::from_proto).collect())
                .unwrap_or_default(),
            date: env
                .date
                .as_ref()
                .map(|s| String::from_utf8_lossy(s).into_owned()),
        }
    }
}

/// Mailbox counters from a STATUS query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    pub messages: u32,
    pub unseen: u32,
    pub recent: u32,
}

fn lossy(bytes: Option<&Cow<'_, [u8]>>) -> String {
    bytes
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imap_proto::types::Address;

    fn address<'a>(name: Option<&'a str>, mailbox: &'a str, host: &'a str) -> Address<'a> {
        Address {
            name: name.map(|n| Cow::Borrowed(n.as_bytes())),
            adl: None,
            mailbox: Some(Cow::Borrowed(mailbox.as_bytes())),
            host: Some(Cow::Borrowed(host.as_bytes())),
        }
    }

    #[test]
    fn test_sender_joins_mailbox_and_host() {
        let addr = EmailAddress::from_proto(&address(Some("Alice"), "alice", "example.com"));
        assert_eq!(addr.address, "alice@example.com");
        assert_eq!(addr.name.as_deref(), Some("Alice"));
        assert_eq!(addr.to_string(), "Alice <alice@example.com>");
    }

    #[test]
    fn test_empty_display_name_is_none() {
        let addr = EmailAddress::from_proto(&address(Some(""), "bob", "b.com"));
        assert_eq!(addr.name, None);
        assert_eq!(addr.to_string(), "bob@b.com");
    }

    #[test]
    fn test_first_from_entry_wins() {
        let envelope = Envelope {
            subject: Some("Hi".into()),
            from: vec![
                EmailAddress::new(None, "a@b.com".into()),
                EmailAddress::new(None, "c@d.com".into()),
            ],
            date: None,
        };
        assert_eq!(envelope.sender_address(), Some("a@b.com"));
        assert_eq!(Envelope::default().sender_address(), None);
    }
}
