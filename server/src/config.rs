//! Relay configuration loaded from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 1234;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 2000;

/// Runtime configuration for the relay process.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the relay listens on.
    pub port: u16,
    /// Directory holding one snapshot file per document.
    pub data_dir: PathBuf,
    /// Quiet period after the last mutation before a snapshot is written.
    pub save_debounce: Duration,
}

impl Config {
    /// Read configuration from `PORT`, `DATA_DIR`, and `SAVE_DEBOUNCE_MS`,
    /// falling back to defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            data_dir: PathBuf::from(
                std::env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into()),
            ),
            save_debounce: Duration::from_millis(env_parse("SAVE_DEBOUNCE_MS", DEFAULT_SAVE_DEBOUNCE_MS)),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
