// src/models/mod.rs

//! Domain models for the watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod listing;

// Re-export all public types
pub use config::{
    BOT_TOKEN_ENV, Config, FilterConfig, Messages, ScheduleConfig, SelectorConfig, SourceConfig,
    StorageConfig, TelegramConfig,
};
pub use listing::{Candidate, Destination, Listing, RawPage};
