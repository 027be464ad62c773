// src/pipeline/detect.rs

//! Change detection cycle.
//!
//! One cycle: fetch the search page, extract candidates, apply the price
//! filter, and keep the listings whose links are not yet in the seen-set.
//! Kept listings are marked seen as they are collected, in page order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::Result;
use crate::models::{Config, Listing, RawPage};
use crate::services::{ListingExtractor, PageSource, PriceFilter};
use crate::storage::SeenStore;

/// Summary of a detection cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Newly qualifying listings, in page order
    pub listings: Vec<Listing>,
    /// Cards that yielded a candidate
    pub candidates: usize,
    /// Candidates dropped by the price filter
    pub rejected: usize,
    /// Candidates already in the seen-set
    pub already_seen: usize,
    /// New listings left for a later cycle because of the limit
    pub deferred: usize,
    /// Set when the page could not be fetched
    pub source_error: Option<String>,
}

impl CycleReport {
    fn unavailable(reason: String) -> Self {
        Self {
            source_error: Some(reason),
            ..Self::default()
        }
    }

    /// Whether the cycle ended early because the source failed.
    pub fn is_source_unavailable(&self) -> bool {
        self.source_error.is_some()
    }
}

struct CachedPage {
    fetched_at: Instant,
    page: Arc<RawPage>,
}

/// Runs detection cycles against a shared seen-set.
pub struct ChangeDetector {
    source: Arc<dyn PageSource>,
    extractor: ListingExtractor,
    filter: PriceFilter,
    store: Arc<SeenStore>,
    search_url: String,
    coalesce_window: Duration,
    /// Fetch gate; at most one fetch is in flight and its page is shared.
    last_page: Mutex<Option<CachedPage>>,
}

impl ChangeDetector {
    /// Build a detector from configuration.
    pub fn new(
        config: &Config,
        source: Arc<dyn PageSource>,
        store: Arc<SeenStore>,
    ) -> Result<Self> {
        Ok(Self {
            source,
            extractor: ListingExtractor::new(&config.selectors, config.source.origin_url()?)?,
            filter: PriceFilter::new(&config.filter, &config.messages),
            store,
            search_url: config.source.search_url(config.filter.threshold())?,
            coalesce_window: config.source.coalesce_window(),
            last_page: Mutex::new(None),
        })
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    pub fn store(&self) -> &Arc<SeenStore> {
        &self.store
    }

    /// Run one cycle, surfacing at most `limit` new listings.
    ///
    /// Only surfaced listings are marked seen; new listings past the limit
    /// stay unseen for the next cycle. A fetch failure yields an empty report
    /// with `source_error` set and leaves the seen-set untouched.
    pub async fn run_cycle(&self, limit: Option<usize>) -> CycleReport {
        let page = match self.fetch_page().await {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Fetching {} failed: {}", self.search_url, e);
                return CycleReport::unavailable(e.to_string());
            }
        };

        let candidates = self.extractor.extract(&page);
        let mut report = CycleReport {
            candidates: candidates.len(),
            ..CycleReport::default()
        };

        let accepted: Vec<Listing> = candidates
            .into_iter()
            .filter_map(|c| self.filter.apply(c))
            .collect();
        report.rejected = report.candidates - accepted.len();

        for listing in accepted {
            if self.store.contains(&listing.link).await {
                report.already_seen += 1;
                continue;
            }
            if limit.is_some_and(|max| report.listings.len() >= max) {
                report.deferred += 1;
                continue;
            }

            match self.store.mark_seen(&listing.link).await {
                Ok(true) => report.listings.push(listing),
                // Claimed by a concurrent cycle between contains and insert.
                Ok(false) => report.already_seen += 1,
                Err(e) => {
                    log::error!("Could not persist seen link {}: {}", listing.link, e);
                    report.listings.push(listing);
                }
            }
        }

        log::info!(
            "Cycle: {} candidates, {} rejected, {} seen, {} new, {} deferred",
            report.candidates,
            report.rejected,
            report.already_seen,
            report.listings.len(),
            report.deferred
        );
        report
    }

    /// Fetch the search page, reusing a page fetched within the coalescing window.
    async fn fetch_page(&self) -> Result<Arc<RawPage>> {
        let mut cached = self.last_page.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.coalesce_window {
                log::debug!("Reusing page fetched {:?} ago", entry.fetched_at.elapsed());
                return Ok(Arc::clone(&entry.page));
            }
        }

        let page = Arc::new(self.source.fetch(&self.search_url).await?);
        *cached = Some(CachedPage {
            fetched_at: Instant::now(),
            page: Arc::clone(&page),
        });
        Ok(page)
    }
}
