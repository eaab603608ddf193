//! Opening and authenticating sessions

use std::fmt::Debug;

use async_imap::Client;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::{ConnectError, ConnectResult, Connector, Encryption, ImapConfig, ImapSession};

/// Any transport async-imap can drive
pub trait ImapStream: AsyncRead + AsyncWrite + Unpin + Send + Debug {}

impl<T> ImapStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + Debug {}

/// TLS, upgraded or plain connections all end up as this type
pub type BoxedStream = Box<dyn ImapStream>;

/// Opens read-only sessions on the configured mailbox
#[derive(Debug, Clone)]
pub struct ImapConnector {
    config: ImapConfig,
}

impl ImapConnector {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> ConnectResult<Client<BoxedStream>> {
        let host = self.config.host.as_str();
        let tcp_stream = TcpStream::connect((host, self.config.port))
            .await
            .map_err(|e| ConnectError::ConnectionFailed(e.to_string()))?;

        let client = match self.config.encryption {
            Encryption::Tls => {
                let tls_stream = TlsConnector::new()
                    .connect(host, tcp_stream)
                    .await
                    .map_err(|e| ConnectError::TlsError(e.to_string()))?;
                debug!("TLS connection established");
                let mut client = Client::new(Box::new(tls_stream) as BoxedStream);
                read_greeting(&mut client).await?;
                client
            }
            Encryption::StartTls => {
                let mut client = Client::new(tcp_stream);
                read_greeting(&mut client).await?;
                client
                    .run_command_and_check_ok("STARTTLS", None)
                    .await
                    .map_err(|e| ConnectError::TlsError(format!("STARTTLS refused: {}", e)))?;
                let tls_stream = TlsConnector::new()
                    .connect(host, client.into_inner())
                    .await
                    .map_err(|e| ConnectError::TlsError(e.to_string()))?;
                debug!("STARTTLS upgrade complete");
                Client::new(Box::new(tls_stream) as BoxedStream)
            }
            Encryption::Plain => {
                warn!("Connecting to {} without encryption", host);
                let mut client = Client::new(Box::new(tcp_stream) as BoxedStream);
                read_greeting(&mut client).await?;
                client
            }
        };

        Ok(client)
    }
}

async fn read_greeting<T: ImapStream>(client: &mut Client<T>) -> ConnectResult<()> {
    let greeting = client
        .read_response()
        .await
        .ok_or(ConnectError::MissingGreeting)?
        .map_err(|e| ConnectError::ConnectionFailed(e.to_string()))?;
    debug!("Greeting: {:?}", greeting.parsed());
    Ok(())
}

#[async_trait]
impl Connector for ImapConnector {
    type Session = ImapSession;

    async fn open(&self) -> ConnectResult<ImapSession> {
        info!(
            "Opening new IMAP connection to {}:{}",
            self.config.host, self.config.port
        );

        let client = self.connect().await?;

        info!("Authenticating with LOGIN for {}", self.config.username);
        let mut session = client
            .login(&self.config.username, self.config.password.as_str())
            .await
            .map_err(|(e, _)| ConnectError::AuthenticationFailed(e.to_string()))?;

        let capabilities = session
            .capabilities()
            .await
            .map_err(|e| ConnectError::ConnectionFailed(format!("CAPABILITY failed: {}", e)))?;
        if !capabilities.has_str("IDLE") {
            let _ = session.logout().await;
            return Err(ConnectError::IdleUnsupported);
        }

        let mailbox = session.examine(&self.config.mailbox).await.map_err(|e| {
            ConnectError::MailboxUnavailable {
                mailbox: self.config.mailbox.clone(),
                reason: e.to_string(),
            }
        })?;

        info!(
            "Examined {} read-only with {} messages",
            self.config.mailbox, mailbox.exists
        );

        Ok(ImapSession::new(session, self.config.mailbox.clone()))
    }
}
