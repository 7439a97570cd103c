use std::time::Duration;
use url::Url;

pub const DEFAULT_ANKI_URL: &str = "http://127.0.0.1:8765";

/// AnkiConnect API version requested in every call
pub const DEFAULT_API_VERSION: u8 = 6;

#[derive(Debug, Clone)]
pub struct Config {
    /// Endpoint of the AnkiConnect add-on
    pub anki_url: Url,

    /// `version` field sent with each AnkiConnect action
    pub api_version: u8,

    /// Timeout applied to every AnkiConnect request
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anki_url: Url::parse(DEFAULT_ANKI_URL).expect("default AnkiConnect URL is valid"),

            api_version: DEFAULT_API_VERSION,

            // Large collections can take a few seconds to compute deck stats
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anki_url(mut self, url: Url) -> Self {
        self.anki_url = url;
        self
    }

    pub fn with_api_version(mut self, version: u8) -> Self {
        self.api_version = version;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
