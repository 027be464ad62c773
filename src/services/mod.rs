//! Service layer for the watcher.
//!
//! This module contains the building blocks of a detection cycle:
//! - Page fetching (`PageSource`, `HttpSource`)
//! - Listing extraction (`ListingExtractor`)
//! - Price filtering (`PriceFilter`)
//! - Message delivery (`Notifier`, `TelegramNotifier`, `ConsoleNotifier`)

mod extractor;
mod notifier;
mod price;
mod source;

pub use extractor::ListingExtractor;
pub use notifier::{ConsoleNotifier, Notifier, TelegramNotifier, escape_markdown, format_listing};
pub use price::{PriceCheck, PriceFilter, parse_price};
pub use source::{HttpSource, PageSource};
