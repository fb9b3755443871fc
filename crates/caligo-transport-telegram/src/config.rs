//! Telegram transport settings.

use caligo_core::config::TransmissionSettings;
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Bot token and owner list, read from the layered config.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Bot API token (`TELEGRAM_TOKEN`).
    pub telegram_token: String,
    /// User ids separated by commas, semicolons or whitespace.
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,
}

/// Everything the dispatcher needs, shared behind `Arc`s.
#[derive(Clone)]
pub struct BotSettings {
    /// Transmission settings shared with the runtime.
    pub transmission: Arc<TransmissionSettings>,
    /// Token and access list.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Bundle transmission and Telegram settings.
    #[must_use]
    pub fn new(transmission: TransmissionSettings, telegram: TelegramSettings) -> Self {
        Self {
            transmission: Arc::new(transmission),
            telegram: Arc::new(telegram),
        }
    }
}

impl TelegramSettings {
    /// Load from `config/*` files and the environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        caligo_core::config::build_config()?.try_deserialize()
    }

    /// Owner ids allowed to issue commands; malformed entries are skipped.
    #[must_use]
    pub fn allowed_users(&self) -> HashSet<i64> {
        let Some(raw) = self.allowed_users_str.as_deref() else {
            return HashSet::new();
        };
        raw.split([',', ';'])
            .flat_map(str::split_whitespace)
            .filter_map(|id| id.parse::<i64>().ok())
            .collect()
    }
}

/// Time-to-live (seconds) for observed messages.
/// Default: 24 hours.
pub const MESSAGE_CACHE_TTL_SECS: u64 = 86_400;
/// Maximum number of observed messages kept.
pub const MESSAGE_CACHE_MAX_SIZE: u64 = 50_000;

/// Initial backoff before retrying a Telegram API call.
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound of the retry backoff.
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4_000;
/// Attempts after the first failed call.
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Get message cache TTL from env or default.
///
/// Environment variable: `MESSAGE_CACHE_TTL_SECS`.
#[must_use]
pub fn get_message_cache_ttl() -> u64 {
    std::env::var("MESSAGE_CACHE_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(MESSAGE_CACHE_TTL_SECS)
}

/// Get message cache max size from env or default.
///
/// Environment variable: `MESSAGE_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_message_cache_max_size() -> u64 {
    std::env::var("MESSAGE_CACHE_MAX_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(MESSAGE_CACHE_MAX_SIZE)
}
