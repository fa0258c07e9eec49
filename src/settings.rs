use once_cell::sync::Lazy;
use std::{env, time::Duration};

/// Holds all tunables, read-once from ENV with fallbacks.
#[derive(Debug, Clone)]
pub struct Settings {
    pub lounge_base_url: String,
    pub device_name: String,
    pub request_timeout: Duration,
    pub status_refresh_timeout: Duration,
    pub event_buffer_capacity: usize,
}

impl Settings {
    fn from_env() -> Self {
        // optionally load .env
        let _ = dotenvy::dotenv();

        fn parse_string(var: &str, default: &str) -> String {
            env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        }

        fn parse_usize(var: &str, default: usize) -> usize {
            env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(default)
        }

        fn parse_secs(var: &str, default_secs: u64) -> Duration {
            env::var(var)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(default_secs))
        }

        fn parse_millis(var: &str, default_ms: u64) -> Duration {
            env::var(var)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or_else(|| Duration::from_millis(default_ms))
        }

        Settings {
            lounge_base_url: parse_string("LOUNGE_BASE_URL", "https://www.youtube.com"),
            device_name: parse_string("LOUNGE_DEVICE_NAME", "cast_lounge_rs"),
            request_timeout: parse_secs("REQUEST_TIMEOUT_SECS", 10),
            status_refresh_timeout: parse_millis("STATUS_REFRESH_TIMEOUT_MS", 1_000),
            event_buffer_capacity: parse_usize("EVENT_BUFFER_CAPACITY", 100),
        }
    }
}

/// Global settings instance
pub static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);
