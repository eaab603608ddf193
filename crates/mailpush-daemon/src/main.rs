//! MailPush - IMAP IDLE to Pushover forwarder

use std::path::PathBuf;

use anyhow::{Context, Result};
use mailpush_core::{Config, Scanner, Watcher};
use mailpush_imap::ImapConnector;
use mailpush_pushover::PushoverClient;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CONFIG_ENV: &str = "MAILPUSH_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mailpush=info")))
        .init();

    tracing::info!("Starting MailPush");

    let path = config_path()?;
    let config = Config::load(&path)
        .await
        .with_context(|| format!("Cannot load configuration from {}", path.display()))?;
    tracing::info!(
        "Watching {} on {}:{} ({} keyword rules)",
        config.folder,
        config.server,
        config.port,
        config.notify_words.len()
    );

    let connector = ImapConnector::new(config.imap_config());
    let notifier = PushoverClient::new(&config.pushover_user, config.pushover_token.expose());
    let scanner = Scanner::new(config.notify_words.clone(), config.delivery(), notifier);

    let watcher = Watcher::new(connector, scanner, config.sleep_duration());
    match watcher.run().await.context("Mailbox watch stopped")? {}
}

/// First argument, then `MAILPUSH_CONFIG`, then `config.yaml` beside the executable
fn config_path() -> Result<PathBuf> {
    if let Some(arg) = std::env::args_os().nth(1) {
        return Ok(PathBuf::from(arg));
    }
    if let Some(env) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(env));
    }
    let exe = std::env::current_exe().context("Cannot locate the mailpush executable")?;
    let dir = exe
        .parent()
        .context("Executable path has no parent directory")?;
    Ok(dir.join(DEFAULT_CONFIG_FILE))
}
