use serde::Serialize;

/// Application-level constants
pub const APP_NAME: &str = "PriorAuth";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default hosted model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default Gemini REST endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const MODEL_ENV: &str = "PRIORAUTH_MODEL";
const MAX_RETRIES_ENV: &str = "PRIORAUTH_MAX_RETRIES";
const TIMEOUT_ENV: &str = "PRIORAUTH_API_TIMEOUT_SECS";
const BASE_URL_ENV: &str = "PRIORAUTH_BASE_URL";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,priorauth_lib=debug,priorauth=debug"
}

/// Settings for the authorization engine and its model client.
#[derive(Debug, Clone, Serialize)]
pub struct EngineConfig {
    pub model: String,
    pub base_url: String,
    /// Total analysis attempts, including the first one.
    pub max_retries: u32,
    /// Passed to the HTTP client, not enforced by the retry loop.
    pub api_timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Rate-limit backoff is `rate_limit_base_secs * attempt`.
    pub rate_limit_base_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 3,
            api_timeout_secs: 30,
            temperature: 0.1,
            max_output_tokens: 4000,
            rate_limit_base_secs: 10,
        }
    }
}

impl EngineConfig {
    /// Defaults with optional `PRIORAUTH_*` overrides from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(model) = lookup(MODEL_ENV).filter(|m| !m.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(retries) = parse_override::<u32>(&lookup, MAX_RETRIES_ENV) {
            // Zero attempts would never call the model at all.
            config.max_retries = retries.max(1);
        }
        if let Some(timeout) = parse_override::<u64>(&lookup, TIMEOUT_ENV) {
            config.api_timeout_secs = timeout;
        }

        config
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, "Ignoring unparsable configuration override");
            None
        }
    }
}

/// Length bounds for operator-entered case text.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NormalizerConfig {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_length: 15,
            max_length: 5000,
        }
    }
}
