//! Pushover messages API
//!
//! POSTs form-encoded notifications to /1/messages.json.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{PushoverError, PushoverResult};

const PUSHOVER_MESSAGES_URL: &str = "https://api.pushover.net/1/messages.json";

/// One outbound alert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Pushover priority, -2 (silent) through 2 (emergency)
    pub priority: i64,
    /// Device name to target instead of all of the user's devices
    pub device: Option<String>,
    pub sound: Option<String>,
    /// Supplementary link shown under the message
    pub url: Option<String>,
    pub url_title: Option<String>,
    /// Seconds between retries for emergency priority
    pub retry: Option<u32>,
    /// Seconds until an emergency notification stops retrying
    pub expire: Option<u32>,
}

/// Delivery acknowledgment returned by the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Request id assigned by Pushover
    pub request: String,
    /// Receipt id, only for emergency priority
    pub receipt: Option<String>,
}

impl std::fmt::Display for Receipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.receipt {
            Some(receipt) => write!(f, "request {} receipt {}", self.request, receipt),
            None => write!(f, "request {}", self.request),
        }
    }
}

/// Anything that can deliver a [`Notification`]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> PushoverResult<Receipt>;
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    token: &'a str,
    user: &'a str,
    title: &'a str,
    message: &'a str,
    priority: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url_title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expire: Option<u32>,
}

#[derive(Deserialize)]
struct MessageResponse {
    status: i64,
    #[serde(default)]
    request: String,
    receipt: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

/// Pushover API client bound to one user key and application token
#[derive(Clone)]
pub struct PushoverClient {
    http: reqwest::Client,
    endpoint: String,
    user: String,
    token: String,
}

impl std::fmt::Debug for PushoverClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushoverClient")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl PushoverClient {
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: PUSHOVER_MESSAGES_URL.to_string(),
            user: user.into(),
            token: token.into(),
        }
    }

    /// Point the client at another endpoint, e.g. a local mock server
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request<'a>(&'a self, notification: &'a Notification) -> MessageRequest<'a> {
        MessageRequest {
            token: &self.token,
            user: &self.user,
            title: &notification.title,
            message: &notification.message,
            priority: notification.priority,
            device: notification.device.as_deref(),
            sound: notification.sound.as_deref(),
            url: notification.url.as_deref(),
            url_title: notification.url_title.as_deref(),
            retry: notification.retry,
            expire: notification.expire,
        }
    }
}

/// Turn an HTTP status and body into a receipt or an error
fn interpret_response(status: u16, body: &str) -> PushoverResult<Receipt> {
    if !(200..300).contains(&status) {
        return Err(PushoverError::ApiError {
            status,
            body: body.to_string(),
        });
    }

    let response: MessageResponse =
        serde_json::from_str(body).map_err(|_| PushoverError::ApiError {
            status,
            body: body.to_string(),
        })?;

    if response.status != 1 {
        return Err(PushoverError::Rejected {
            errors: response.errors,
        });
    }

    Ok(Receipt {
        request: response.request,
        receipt: response.receipt,
    })
}

#[async_trait]
impl Notifier for PushoverClient {
    async fn send(&self, notification: &Notification) -> PushoverResult<Receipt> {
        debug!(
            "Sending Pushover notification '{}' with priority {}",
            notification.title, notification.priority
        );

        let response = self
            .http
            .post(&self.endpoint)
            .form(&self.request(notification))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        let receipt = interpret_response(status, &body)?;

        info!("Notification sent to Pushover, {}", receipt);
        Ok(receipt)
    }
}
