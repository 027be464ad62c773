// src/services/price.rs

//! Price normalization and minimum-price filtering.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{Candidate, FilterConfig, Listing, Messages};

/// First run of digits, allowing whitespace used as a thousands separator.
fn price_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d[\d\s]*").ok()).as_ref()
}

/// Parse the first numeric run of a price text, ignoring embedded whitespace.
///
/// `"1 000 zł"` and `"1\u{a0}000 zł"` both parse to `1000`.
pub fn parse_price(text: &str) -> Option<u64> {
    let run = price_pattern()?.find(text)?;
    let digits: String = run
        .as_str()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    digits.parse().ok()
}

/// Outcome of checking a price text against the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceCheck {
    /// Price parsed and at or above the threshold (or no threshold set)
    Accepted { value: u64, display: String },
    /// Price parsed but below the threshold
    BelowThreshold { value: u64 },
    /// No digit run in the text
    Unparsable,
}

impl PriceCheck {
    pub fn passes(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Applies the configured price floor to listing candidates.
#[derive(Debug, Clone)]
pub struct PriceFilter {
    threshold: Option<u64>,
    currency: String,
    no_price: String,
    unknown_location: String,
}

impl PriceFilter {
    pub fn new(filter: &FilterConfig, messages: &Messages) -> Self {
        Self {
            threshold: filter.threshold(),
            currency: filter.currency.clone(),
            no_price: messages.no_price.clone(),
            unknown_location: messages.unknown_location.clone(),
        }
    }

    /// Whether a price floor is active.
    pub fn is_enabled(&self) -> bool {
        self.threshold.is_some()
    }

    /// Format a price for display.
    pub fn format_price(&self, value: u64) -> String {
        if self.currency.is_empty() {
            value.to_string()
        } else {
            format!("{} {}", value, self.currency)
        }
    }

    /// Check a raw price text against the threshold.
    pub fn evaluate(&self, price_text: &str) -> PriceCheck {
        let Some(value) = parse_price(price_text) else {
            return PriceCheck::Unparsable;
        };

        match self.threshold {
            Some(min) if value < min => PriceCheck::BelowThreshold { value },
            _ => PriceCheck::Accepted {
                value,
                display: self.format_price(value),
            },
        }
    }

    /// Turn a candidate into a listing, or `None` if the filter rejects it.
    ///
    /// With a threshold set, a missing or unparsable price rejects the
    /// candidate. Without one, such candidates are kept with no price.
    pub fn apply(&self, candidate: Candidate) -> Option<Listing> {
        let check = candidate.price_text.as_deref().map(|t| self.evaluate(t));

        let (price, price_display) = match check {
            Some(PriceCheck::Accepted { value, display }) => (Some(value), display),
            Some(PriceCheck::BelowThreshold { value }) => {
                log::debug!("Rejected {} ({} below floor)", candidate.link, value);
                return None;
            }
            Some(PriceCheck::Unparsable) | None if self.is_enabled() => {
                log::debug!("Rejected {} (no usable price)", candidate.link);
                return None;
            }
            Some(PriceCheck::Unparsable) => {
                let raw = candidate.price_text.clone().unwrap_or_default();
                let display = if raw.is_empty() { self.no_price.clone() } else { raw };
                (None, display)
            }
            None => (None, self.no_price.clone()),
        };

        Some(Listing {
            title: candidate.title,
            price,
            price_display,
            location: candidate
                .location
                .unwrap_or_else(|| self.unknown_location.clone()),
            link: candidate.link,
        })
    }
}
