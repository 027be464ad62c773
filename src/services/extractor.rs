// src/services/extractor.rs

//! Listing extractor.
//!
//! Turns a search results page into listing candidates using the configured
//! card and field selectors. A card missing a required field (link or title)
//! is dropped on its own; the rest of the page is still extracted.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Candidate, RawPage, SelectorConfig};
use crate::utils::{normalize_whitespace, resolve_url};

/// Extracts listing candidates from search result pages.
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    card: Selector,
    link: Selector,
    title: Selector,
    price: Selector,
    location: Selector,
    origin: Url,
}

impl ListingExtractor {
    /// Create an extractor, parsing all selectors up front.
    pub fn new(selectors: &SelectorConfig, origin: Url) -> Result<Self> {
        Ok(Self {
            card: Self::parse_selector(&selectors.card)?,
            link: Self::parse_selector(&selectors.link)?,
            title: Self::parse_selector(&selectors.title)?,
            price: Self::parse_selector(&selectors.price)?,
            location: Self::parse_selector(&selectors.location)?,
            origin,
        })
    }

    /// Extract candidates in page order.
    pub fn extract(&self, page: &RawPage) -> Vec<Candidate> {
        let document = Html::parse_document(&page.body);

        let mut cards = 0usize;
        let candidates: Vec<Candidate> = document
            .select(&self.card)
            .inspect(|_| cards += 1)
            .filter_map(|card| self.parse_card(&card))
            .collect();

        if cards > candidates.len() {
            log::debug!(
                "Dropped {} of {} cards missing a link or title",
                cards - candidates.len(),
                cards
            );
        }
        if cards == 0 {
            log::warn!("No listing cards found on {}", page.url);
        }

        candidates
    }

    fn parse_card(&self, card: &ElementRef) -> Option<Candidate> {
        let link = card
            .select(&self.link)
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .find(|href| !href.is_empty())
            .and_then(|href| resolve_url(&self.origin, href))?;

        let title = card
            .select(&self.title)
            .next()
            .map(|el| Self::element_text(&el))
            .filter(|t| !t.is_empty())?;

        let price_text = card
            .select(&self.price)
            .next()
            .map(|el| Self::element_text(&el));

        let location = card
            .select(&self.location)
            .next()
            .map(|el| Self::element_text(&el))
            .filter(|t| !t.is_empty());

        Some(Candidate {
            title,
            link,
            price_text,
            location,
        })
    }

    fn element_text(el: &ElementRef) -> String {
        let raw: String = el.text().collect::<Vec<_>>().join(" ");
        normalize_whitespace(&raw)
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}
