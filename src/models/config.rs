//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::utils::slugify;

/// Environment variable that overrides `telegram.token`.
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search page and HTTP settings
    #[serde(default)]
    pub source: SourceConfig,

    /// CSS selectors describing a listing card
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Price filtering
    #[serde(default)]
    pub filter: FilterConfig,

    /// Polling schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Seen-set persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Telegram delivery
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// User-facing message texts
    #[serde(default)]
    pub messages: Messages,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.source.keyword.trim().is_empty() && self.source.search_url.is_none() {
            return Err(AppError::validation(
                "source.keyword is empty and no source.search_url is set",
            ));
        }
        self.source.origin_url()?;
        self.source.search_url(self.filter.threshold())?;
        if self.schedule.interval_secs == 0 {
            return Err(AppError::validation("schedule.interval_secs must be > 0"));
        }
        if self.schedule.check_limit == 0 {
            return Err(AppError::validation("schedule.check_limit must be > 0"));
        }
        if self.telegram.max_retries == 0 {
            return Err(AppError::validation("telegram.max_retries must be > 0"));
        }
        Ok(())
    }

    /// Bot token from the environment, falling back to the config file.
    ///
    /// Missing or blank tokens are a fatal configuration error.
    pub fn bot_token(&self) -> Result<String> {
        std::env::var(BOT_TOKEN_ENV)
            .ok()
            .or_else(|| self.telegram.token.clone())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::config(format!(
                    "bot token missing: set {} or telegram.token",
                    BOT_TOKEN_ENV
                ))
            })
    }
}

/// Search page location and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Site origin used to build the search URL and resolve relative links
    #[serde(default = "defaults::origin")]
    pub origin: String,

    /// Search keyword (slugified into the search path)
    #[serde(default = "defaults::keyword")]
    pub keyword: String,

    /// Full search URL; overrides origin/keyword/min_price when set
    #[serde(default)]
    pub search_url: Option<String>,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// A page fetched this recently is reused instead of fetched again
    #[serde(default = "defaults::coalesce")]
    pub coalesce_secs: u64,
}

impl SourceConfig {
    pub fn origin_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.origin)?)
    }

    /// Build the search URL for the keyword and optional price floor.
    pub fn search_url(&self, min_price: Option<u64>) -> Result<String> {
        if let Some(url) = &self.search_url {
            return Ok(Url::parse(url)?.to_string());
        }

        let path = format!("/oferty/q-{}/", slugify(&self.keyword));
        let mut url = self.origin_url()?.join(&path)?;
        if let Some(min_price) = min_price {
            url.query_pairs_mut()
                .append_pair("search[filter_float_price:from]", &min_price.to_string());
        }
        Ok(url.to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_secs(self.coalesce_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            origin: defaults::origin(),
            keyword: defaults::keyword(),
            search_url: None,
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            coalesce_secs: defaults::coalesce(),
        }
    }
}

/// CSS selectors for a listing card and its fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// One element per listing card
    #[serde(default = "defaults::card_selector")]
    pub card: String,

    /// Anchor carrying the listing href
    #[serde(default = "defaults::link_selector")]
    pub link: String,

    /// Heading holding the title
    #[serde(default = "defaults::title_selector")]
    pub title: String,

    /// Price element
    #[serde(default = "defaults::price_selector")]
    pub price: String,

    /// Location/date element
    #[serde(default = "defaults::location_selector")]
    pub location: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: defaults::card_selector(),
            link: defaults::link_selector(),
            title: defaults::title_selector(),
            price: defaults::price_selector(),
            location: defaults::location_selector(),
        }
    }
}

/// Price filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// When false, listings without a usable price are kept for display
    #[serde(default = "defaults::filter_enabled")]
    pub enabled: bool,

    /// Inclusive lower bound in whole currency units
    #[serde(default = "defaults::min_price")]
    pub min_price: u64,

    /// Currency suffix for display
    #[serde(default = "defaults::currency")]
    pub currency: String,
}

impl FilterConfig {
    /// Active price floor, if filtering is enabled.
    pub fn threshold(&self) -> Option<u64> {
        self.enabled.then_some(self.min_price)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::filter_enabled(),
            min_price: defaults::min_price(),
            currency: defaults::currency(),
        }
    }
}

/// Polling schedule settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between scheduled cycles
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Seconds before the first scheduled cycle
    #[serde(default = "defaults::first_delay")]
    pub first_delay_secs: u64,

    /// Maximum listings delivered by an on-demand check
    #[serde(default = "defaults::check_limit")]
    pub check_limit: usize,
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn first_delay(&self) -> Duration {
        Duration::from_secs(self.first_delay_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            first_delay_secs: defaults::first_delay(),
            check_limit: defaults::check_limit(),
        }
    }
}

/// Seen-set persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Seen-set file; relative paths resolve against the storage directory
    #[serde(default = "defaults::seen_path")]
    pub seen_path: PathBuf,
}

impl StorageConfig {
    pub fn seen_path_in(&self, storage_dir: &Path) -> PathBuf {
        if self.seen_path.is_absolute() {
            self.seen_path.clone()
        } else {
            storage_dir.join(&self.seen_path)
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            seen_path: defaults::seen_path(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token; `BOT_TOKEN` takes precedence
    #[serde(default)]
    pub token: Option<String>,

    /// Chats subscribed when the service starts
    #[serde(default)]
    pub chat_ids: Vec<String>,

    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    #[serde(default = "defaults::telegram_timeout")]
    pub timeout_secs: u64,

    /// Attempts per message, including the first
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u8,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            chat_ids: Vec::new(),
            api_base: defaults::api_base(),
            timeout_secs: defaults::telegram_timeout(),
            max_retries: defaults::max_retries(),
        }
    }
}

/// User-facing message strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Messages {
    #[serde(default = "defaults::msg_started")]
    pub started: String,
    #[serde(default = "defaults::msg_already_running")]
    pub already_running: String,
    #[serde(default = "defaults::msg_checking")]
    pub checking: String,
    #[serde(default = "defaults::msg_no_new_listings")]
    pub no_new_listings: String,
    #[serde(default = "defaults::msg_source_unavailable")]
    pub source_unavailable: String,
    #[serde(default = "defaults::msg_no_price")]
    pub no_price: String,
    #[serde(default = "defaults::msg_unknown_location")]
    pub unknown_location: String,
    /// Listing template; `{title}`, `{price}`, `{location}`, `{link}`
    #[serde(default = "defaults::msg_listing")]
    pub listing: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            started: defaults::msg_started(),
            already_running: defaults::msg_already_running(),
            checking: defaults::msg_checking(),
            no_new_listings: defaults::msg_no_new_listings(),
            source_unavailable: defaults::msg_source_unavailable(),
            no_price: defaults::msg_no_price(),
            unknown_location: defaults::msg_unknown_location(),
            listing: defaults::msg_listing(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Source defaults
    pub fn origin() -> String {
        "https://www.olx.pl".into()
    }
    pub fn keyword() -> String {
        "lego kg".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn coalesce() -> u64 {
        30
    }

    // Selector defaults
    pub fn card_selector() -> String {
        "div[data-cy='l-card']".into()
    }
    pub fn link_selector() -> String {
        "a[href]".into()
    }
    pub fn title_selector() -> String {
        "h1, h2, h3, h4, h5, h6".into()
    }
    pub fn price_selector() -> String {
        "p[data-testid='ad-price']".into()
    }
    pub fn location_selector() -> String {
        "p[data-testid='location-date']".into()
    }

    // Filter defaults
    pub fn filter_enabled() -> bool {
        true
    }
    pub fn min_price() -> u64 {
        1000
    }
    pub fn currency() -> String {
        "zł".into()
    }

    // Schedule defaults
    pub fn interval() -> u64 {
        3600
    }
    pub fn first_delay() -> u64 {
        5
    }
    pub fn check_limit() -> usize {
        5
    }

    pub fn seen_path() -> PathBuf {
        PathBuf::from("seen.json")
    }

    // Telegram defaults
    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn telegram_timeout() -> u64 {
        10
    }
    pub fn max_retries() -> u8 {
        3
    }

    // Message defaults
    pub fn msg_started() -> String {
        "✅ Bot aktywowany! Nowe oferty będą wysyłane co godzinę.".into()
    }
    pub fn msg_already_running() -> String {
        "ℹ️ Bot już działa w tym czacie.".into()
    }
    pub fn msg_checking() -> String {
        "🔍 Sprawdzam oferty...".into()
    }
    pub fn msg_no_new_listings() -> String {
        "📭 Brak nowych ofert.".into()
    }
    pub fn msg_source_unavailable() -> String {
        "⚠️ Serwis z ogłoszeniami chwilowo niedostępny.".into()
    }
    pub fn msg_no_price() -> String {
        "brak ceny".into()
    }
    pub fn msg_unknown_location() -> String {
        "brak lokalizacji".into()
    }
    pub fn msg_listing() -> String {
        "🧱 *{title}*\n💰 {price}\n📍 {location}\n🔗 [Zobacz ofertę]({link})".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.source.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.schedule.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_origin() {
        let mut config = Config::default();
        config.source.origin = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_search_url_encodes_keyword_and_price() {
        let config = Config::default();
        let url = config.source.search_url(config.filter.threshold()).unwrap();
        assert_eq!(
            url,
            "https://www.olx.pl/oferty/q-lego-kg/?search%5Bfilter_float_price%3Afrom%5D=1000"
        );
    }

    #[test]
    fn search_url_without_price_floor() {
        let config = Config::default();
        let url = config.source.search_url(None).unwrap();
        assert_eq!(url, "https://www.olx.pl/oferty/q-lego-kg/");
    }

    #[test]
    fn seen_path_resolves_against_storage_dir() {
        let mut storage = StorageConfig::default();
        assert_eq!(
            storage.seen_path_in(Path::new("storage")),
            PathBuf::from("storage/seen.json")
        );
        storage.seen_path = PathBuf::from("/var/lib/watcher/seen.json");
        assert_eq!(
            storage.seen_path_in(Path::new("storage")),
            PathBuf::from("/var/lib/watcher/seen.json")
        );
    }

    #[test]
    fn disabled_filter_has_no_threshold() {
        let mut config = Config::default();
        config.filter.enabled = false;
        assert_eq!(config.filter.threshold(), None);
    }

    #[test]
    fn search_url_override_wins() {
        let mut config = Config::default();
        config.source.search_url = Some("https://example.com/search?q=x".to_string());
        assert_eq!(
            config.source.search_url(Some(5)).unwrap(),
            "https://example.com/search?q=x"
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [filter]
            min_price = 250

            [schedule]
            check_limit = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.filter.threshold(), Some(250));
        assert_eq!(config.filter.currency, "zł");
        assert_eq!(config.schedule.check_limit, 10);
        assert_eq!(config.schedule.interval_secs, 3600);
        assert_eq!(config.source.timeout_secs, 15);
    }
}
