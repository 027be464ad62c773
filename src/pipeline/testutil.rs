//! Test doubles for pipeline tests.

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Destination, Listing, RawPage};
use crate::services::{Notifier, PageSource};

pub fn card(id: u32, title: &str, price: &str) -> String {
    format!(
        r#"<div data-cy="l-card">
            <a href="/d/oferta/ogloszenie-ID{id}.html"></a>
            <h6>{title}</h6>
            <p data-testid="ad-price">{price}</p>
            <p data-testid="location-date">Warszawa</p>
        </div>"#
    )
}

pub fn link(id: u32) -> String {
    format!("https://www.olx.pl/d/oferta/ogloszenie-ID{id}.html")
}

pub fn page(cards: &[String]) -> String {
    format!("<html><body>{}</body></html>", cards.concat())
}

/// Serves a fixed body and counts fetches.
pub struct StaticSource {
    body: StdMutex<String>,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new(body: String) -> Self {
        Self {
            body: StdMutex::new(body),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_body(&self, body: String) {
        *self.body.lock().unwrap() = body;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for StaticSource {
    async fn fetch(&self, url: &str) -> Result<RawPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(RawPage {
            url: url.to_string(),
            body: self.body.lock().unwrap().clone(),
        })
    }
}

/// Always fails like a timed-out request.
pub struct FailingSource;

#[async_trait]
impl PageSource for FailingSource {
    async fn fetch(&self, url: &str) -> Result<RawPage> {
        Err(AppError::Status {
            url: url.to_string(),
            status: 504,
        })
    }
}

/// What a `RecordingNotifier` was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(Destination, String),
    Listing(Destination, String),
}

/// Records every message instead of delivering it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: StdMutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Links delivered to `destination`, in order.
    pub fn links_for(&self, destination: &Destination) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Listing(d, link) if &d == destination => Some(link),
                _ => None,
            })
            .collect()
    }

    /// Status texts sent to `destination`, in order.
    pub fn texts_for(&self, destination: &Destination) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(d, text) if &d == destination => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, destination: &Destination, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Text(destination.clone(), text.to_string()));
        Ok(())
    }

    async fn send_listing(&self, destination: &Destination, listing: &Listing) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Listing(destination.clone(), listing.link.clone()));
        Ok(())
    }
}
