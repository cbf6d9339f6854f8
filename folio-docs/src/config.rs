use std::time::Duration;

use anyhow::Context;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_FILTER_DEBOUNCE_MS: u64 = 300;

/// Timing policy for the folder cache and the filter reload debounce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub debounce: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            debounce: Duration::from_millis(DEFAULT_FILTER_DEBOUNCE_MS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DocsConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub cache: CacheSettings,
}

impl DocsConfig {
    pub fn from_env() -> Self {
        let api_url = std::env::var("FOLIO_API_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_token = std::env::var("FOLIO_API_TOKEN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let cache = CacheSettings {
            ttl: Duration::from_secs(read_u64_env(
                "FOLIO_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )),
            debounce: Duration::from_millis(read_u64_env(
                "FOLIO_FILTER_DEBOUNCE_MS",
                DEFAULT_FILTER_DEBOUNCE_MS,
            )),
        };

        Self {
            api_url,
            api_token,
            cache,
        }
    }

    pub fn require_token(&self) -> anyhow::Result<&str> {
        self.api_token
            .as_deref()
            .context("FOLIO_API_TOKEN is not set")
    }
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
