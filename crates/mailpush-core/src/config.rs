//! Configuration loaded once at startup from a YAML file

use std::fmt;
use std::path::Path;
use std::time::Duration;

use mailpush_imap::{Encryption, ImapConfig, Password};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::filter::NO_MATCH;
use crate::ConfigError;

/// Credential read from the config; never printed
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// One keyword and the priority it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyRule {
    /// Lowercase substring to look for
    pub keyword: String,
    pub priority: i64,
}

/// Keyword rules in the order they appear in the config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyRules(Vec<NotifyRule>);

impl NotifyRules {
    pub fn new<K: Into<String>>(rules: impl IntoIterator<Item = (K, i64)>) -> Self {
        Self(
            rules
                .into_iter()
                .map(|(keyword, priority)| NotifyRule {
                    keyword: keyword.into().to_lowercase(),
                    priority,
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &NotifyRule> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for NotifyRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = NotifyRules;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of keyword to integer priority")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<NotifyRules, A::Error> {
                let mut rules = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((keyword, priority)) = map.next_entry::<String, i64>()? {
                    rules.push((keyword, priority));
                }
                Ok(NotifyRules::new(rules))
            }
        }

        deserializer.deserialize_map(RulesVisitor)
    }
}

/// Pushover delivery options shared by every notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// Maximum number of characters of body text sent
    pub body_length: usize,
    pub device: Option<String>,
    pub sound: Option<String>,
    pub url: Option<String>,
    pub url_title: Option<String>,
    pub retry: Option<u32>,
    pub expire: Option<u32>,
}

fn default_port() -> u16 {
    993
}

fn default_ssl() -> bool {
    true
}

fn default_folder() -> String {
    "INBOX".to_string()
}

/// Full application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IMAP server hostname
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Implicit TLS
    #[serde(default = "default_ssl")]
    pub ssl: bool,
    /// Upgrade a plaintext connection, only consulted without `ssl`
    #[serde(default)]
    pub starttls: bool,
    pub username: String,
    pub password: Secret,
    /// Mailbox to watch
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Seconds each IDLE cycle lasts before it is renewed
    pub sleep_time: u64,
    pub notify_words: NotifyRules,
    pub body_length: usize,

    pub pushover_user: String,
    pub pushover_token: Secret,
    #[serde(default)]
    pub pushover_device: Option<String>,
    #[serde(default)]
    pub pushover_sound: Option<String>,
    #[serde(default)]
    pub pushover_url: Option<String>,
    #[serde(default)]
    pub pushover_url_title: Option<String>,
    #[serde(default)]
    pub pushover_retry: Option<u32>,
    #[serde(default)]
    pub pushover_expire: Option<u32>,
}

impl Config {
    /// Read and validate a YAML config file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml_bw::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::Invalid("server must not be empty".into()));
        }
        if self.username.is_empty() {
            return Err(ConfigError::Invalid("username must not be empty".into()));
        }
        if self.folder.is_empty() {
            return Err(ConfigError::Invalid("folder must not be empty".into()));
        }
        if self.sleep_time == 0 {
            return Err(ConfigError::Invalid("sleep_time must be at least 1".into()));
        }
        if let Some(rule) = self.notify_words.iter().find(|r| r.priority <= NO_MATCH) {
            return Err(ConfigError::Invalid(format!(
                "priority {} of '{}' must be greater than {}",
                rule.priority, rule.keyword, NO_MATCH
            )));
        }
        Ok(())
    }

    pub fn encryption(&self) -> Encryption {
        match (self.ssl, self.starttls) {
            (true, _) => Encryption::Tls,
            (false, true) => Encryption::StartTls,
            (false, false) => Encryption::Plain,
        }
    }

    pub fn imap_config(&self) -> ImapConfig {
        ImapConfig {
            host: self.server.clone(),
            port: self.port,
            encryption: self.encryption(),
            username: self.username.clone(),
            password: Password::new(self.password.expose()),
            mailbox: self.folder.clone(),
        }
    }

    pub fn sleep_duration(&self) -> Duration {
        Duration::from_secs(self.sleep_time)
    }

    pub fn delivery(&self) -> DeliveryOptions {
        DeliveryOptions {
            body_length: self.body_length,
            device: self.pushover_device.clone(),
            sound: self.pushover_sound.clone(),
            url: self.pushover_url.clone(),
            url_title: self.pushover_url_title.clone(),
            retry: self.pushover_retry,
            expire: self.pushover_expire,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server: imap.example.com
port: 993
ssl: true
username: watcher@example.com
password: hunter2
folder: INBOX
sleep_time: 600
body_length: 100
notify_words:
  Urgent: 2
  invoice: 0
  "server down": 1
pushover_user: user-key
pushover_token: app-token
pushover_sound: siren
pushover_retry: 60
pushover_expire: 3600
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.server, "imap.example.com");
        assert_eq!(config.encryption(), Encryption::Tls);
        assert_eq!(config.sleep_duration(), Duration::from_secs(600));
        assert_eq!(config.password.expose(), "hunter2");

        let delivery = config.delivery();
        assert_eq!(delivery.body_length, 100);
        assert_eq!(delivery.sound.as_deref(), Some("siren"));
        assert_eq!(delivery.device, None);
        assert_eq!(delivery.retry, Some(60));
    }

    #[test]
    fn test_rules_keep_order_and_are_lowercased() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        let rules: Vec<_> = config
            .notify_words
            .iter()
            .map(|r| (r.keyword.as_str(), r.priority))
            .collect();
        assert_eq!(rules, vec![("urgent", 2), ("invoice", 0), ("server down", 1)]);
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
server: mail.example.org
username: me
password: pw
sleep_time: 60
body_length: 50
notify_words: {}
pushover_user: u
pushover_token: t
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.port, 993);
        assert_eq!(config.folder, "INBOX");
        assert_eq!(config.encryption(), Encryption::Tls);
        assert!(config.notify_words.is_empty());
    }

    #[test]
    fn test_encryption_modes() {
        let plain = SAMPLE.replace("ssl: true", "ssl: false");
        assert_eq!(
            Config::from_yaml_str(&plain).unwrap().encryption(),
            Encryption::Plain
        );

        let starttls = SAMPLE.replace("ssl: true", "ssl: false\nstarttls: true");
        assert_eq!(
            Config::from_yaml_str(&starttls).unwrap().encryption(),
            Encryption::StartTls
        );
    }

    #[test]
    fn test_rejects_priority_at_sentinel() {
        let yaml = SAMPLE.replace("invoice: 0", "invoice: -1000");
        let err = Config::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_sleep_time() {
        let yaml = SAMPLE.replace("sleep_time: 600", "sleep_time: 0");
        assert!(matches!(
            Config::from_yaml_str(&yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let yaml = SAMPLE.replace("server: imap.example.com\n", "");
        assert!(matches!(
            Config::from_yaml_str(&yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_secrets_not_in_debug_output() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("app-token"));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = Config::load("/nonexistent/mailpush.yaml").await.unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
