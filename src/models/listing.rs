//! Listing data structures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw content of a fetched search results page.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// URL the page was fetched from
    pub url: String,

    /// Response body
    pub body: String,
}

/// A listing card as found on the page, before price validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,

    /// Absolute URL of the listing
    pub link: String,

    /// Text of the price element, if the card had one
    pub price_text: Option<String>,

    /// Text of the location/date element, if the card had one
    pub location: Option<String>,
}

/// A validated listing ready for delivery.
///
/// Identity is the `link`; two listings with the same link are the same ad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Listing title
    pub title: String,

    /// Price in whole currency units, if it could be parsed
    pub price: Option<u64>,

    /// Price as shown to users (e.g. "1000 zł")
    pub price_display: String,

    /// Location text, or the configured unknown-location sentinel
    pub location: String,

    /// Full URL to the listing
    pub link: String,
}

impl Listing {
    /// Format listing for display using a template.
    ///
    /// Supported placeholders: `{title}`, `{price}`, `{location}`, `{link}`.
    /// The template is scanned once, so braces inside inserted values are
    /// copied as-is. Unknown `{...}` tokens are left untouched.
    pub fn format(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len() + self.title.len() + self.link.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            rest = &rest[open..];
            let Some(close) = rest.find('}') else {
                break;
            };

            let value = match &rest[1..close] {
                "title" => Some(self.title.as_str()),
                "price" => Some(self.price_display.as_str()),
                "location" => Some(self.location.as_str()),
                "link" => Some(self.link.as_str()),
                _ => None,
            };
            match value {
                Some(value) => {
                    out.push_str(value);
                    rest = &rest[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = &rest[1..];
                }
            }
        }

        out.push_str(rest);
        out
    }
}

/// Identity of a delivery channel (a Telegram chat id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(String);

impl Destination {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Destination {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for Destination {
    fn from(id: i64) -> Self {
        Self::new(id.to_string())
    }
}
