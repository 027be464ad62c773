// src/services/notifier.rs

//! Listing delivery.
//!
//! `Notifier` is the boundary to the messaging channel. `TelegramNotifier`
//! talks to the Bot API `sendMessage` method; `ConsoleNotifier` prints to
//! stdout for dry runs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Destination, Listing, TelegramConfig};
use crate::utils::http::create_notify_client;

/// Upper bound on a server-requested `retry_after` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Delivers messages to a destination channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a plain status text.
    async fn send_text(&self, destination: &Destination, text: &str) -> Result<()>;

    /// Send one listing.
    async fn send_listing(&self, destination: &Destination, listing: &Listing) -> Result<()>;
}

/// Escape characters that Telegram's legacy Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render a listing with the message template, escaping free-text fields.
pub fn format_listing(template: &str, listing: &Listing) -> String {
    let escaped = Listing {
        title: escape_markdown(&listing.title),
        location: escape_markdown(&listing.location),
        price_display: escape_markdown(&listing.price_display),
        ..listing.clone()
    };
    escaped.format(template)
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Telegram Bot API notifier.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    template: String,
    max_retries: u8,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, token: &str, template: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: create_notify_client(config.timeout_secs)?,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                token
            ),
            template: template.into(),
            max_retries: config.max_retries.max(1),
        })
    }

    async fn send(&self, destination: &Destination, payload: &SendMessage<'_>) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.try_send(destination, payload).await {
                Ok(()) => return Ok(()),
                Err(SendError::Permanent(e)) => return Err(e),
                Err(SendError::Transient { error, retry_after }) => {
                    if attempt >= self.max_retries {
                        return Err(error);
                    }
                    let delay = match retry_after {
                        Some(wait) => wait.min(MAX_RETRY_AFTER),
                        None => Duration::from_millis(500u64 << (attempt - 1).min(6)),
                    };
                    log::warn!(
                        "Send to {} failed (attempt {}/{}), retrying in {:?}: {}",
                        destination,
                        attempt,
                        self.max_retries,
                        delay,
                        error
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_send(
        &self,
        destination: &Destination,
        payload: &SendMessage<'_>,
    ) -> std::result::Result<(), SendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| SendError::Transient {
                error: AppError::notify(destination, e),
                retry_after: None,
            })?;

        let status = response.status();
        let body: Option<ApiResponse> = response.json().await.ok();
        let description = body
            .as_ref()
            .and_then(|b| b.description.clone())
            .unwrap_or_else(|| status.to_string());

        if status.is_success() && body.as_ref().is_none_or(|b| b.ok) {
            return Ok(());
        }

        let error = AppError::notify(destination, description);
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let retry_after = body
                .and_then(|b| b.parameters)
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs);
            Err(SendError::Transient { error, retry_after })
        } else {
            Err(SendError::Permanent(error))
        }
    }
}

enum SendError {
    /// Worth retrying; `retry_after` is the wait the server asked for
    Transient {
        error: AppError,
        retry_after: Option<Duration>,
    },
    Permanent(AppError),
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, destination: &Destination, text: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: destination.as_str(),
            text,
            parse_mode: None,
            disable_web_page_preview: true,
        };
        self.send(destination, &payload).await
    }

    async fn send_listing(&self, destination: &Destination, listing: &Listing) -> Result<()> {
        let text = format_listing(&self.template, listing);
        let payload = SendMessage {
            chat_id: destination.as_str(),
            text: &text,
            parse_mode: Some("Markdown"),
            disable_web_page_preview: true,
        };
        self.send(destination, &payload).await
    }
}

/// Prints messages to stdout instead of delivering them.
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    template: String,
}

impl ConsoleNotifier {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send_text(&self, destination: &Destination, text: &str) -> Result<()> {
        println!("[{}] {}", destination, text);
        Ok(())
    }

    async fn send_listing(&self, destination: &Destination, listing: &Listing) -> Result<()> {
        println!("[{}]\n{}\n", destination, listing.format(&self.template));
        Ok(())
    }
}
