// Configuration module for semquery
// Reads from environment variables with sensible defaults

use std::env;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Page size used when a request does not specify one (SEMQUERY_DEFAULT_PAGE_SIZE)
    pub default_page_size: usize,

    /// Upper clamp for requested page sizes (SEMQUERY_MAX_PAGE_SIZE)
    pub max_page_size: usize,

    /// Default per-request budget in milliseconds (SEMQUERY_DEFAULT_TIMEOUT_MS)
    pub default_timeout_ms: u64,

    /// Upper clamp for traversal depth options (SEMQUERY_MAX_DEPTH)
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 200,
            default_timeout_ms: 30_000,
            max_depth: 10,
        }
    }
}

/// Parse a value that must be at least 1. Every field is used as a clamp
/// bound or divisor somewhere, so zero is as invalid as garbage.
fn positive<T: std::str::FromStr + PartialOrd + Default>(val: &str) -> Option<T> {
    val.parse().ok().filter(|n| *n > T::default())
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(val) = env::var("SEMQUERY_DEFAULT_PAGE_SIZE") {
            if let Some(parsed) = positive(&val) {
                config.default_page_size = parsed;
            } else {
                eprintln!(
                    "semquery: Warning: Invalid SEMQUERY_DEFAULT_PAGE_SIZE value: {}, using default: {}",
                    val, config.default_page_size
                );
            }
        }

        if let Ok(val) = env::var("SEMQUERY_MAX_PAGE_SIZE") {
            if let Some(parsed) = positive(&val) {
                config.max_page_size = parsed;
            } else {
                eprintln!(
                    "semquery: Warning: Invalid SEMQUERY_MAX_PAGE_SIZE value: {}, using default: {}",
                    val, config.max_page_size
                );
            }
        }

        if let Ok(val) = env::var("SEMQUERY_DEFAULT_TIMEOUT_MS") {
            if let Some(parsed) = positive(&val) {
                config.default_timeout_ms = parsed;
            } else {
                eprintln!(
                    "semquery: Warning: Invalid SEMQUERY_DEFAULT_TIMEOUT_MS value: {}, using default: {}",
                    val, config.default_timeout_ms
                );
            }
        }

        if let Ok(val) = env::var("SEMQUERY_MAX_DEPTH") {
            if let Some(parsed) = positive(&val) {
                config.max_depth = parsed;
            } else {
                eprintln!(
                    "semquery: Warning: Invalid SEMQUERY_MAX_DEPTH value: {}, using default: {}",
                    val, config.max_depth
                );
            }
        }

        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}
