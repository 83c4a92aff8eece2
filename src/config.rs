//! Process configuration from the environment (and `.env`, loaded in main).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::state::Timing;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub settings_file: PathBuf,
    pub words_file: PathBuf,
    pub used_words_file: PathBuf,
    /// Token required for admin commands (None = admin commands disabled)
    pub admin_token: Option<String>,
    pub timing: Timing,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            settings_file: PathBuf::from("server_config.json"),
            words_file: PathBuf::from("nouns.txt"),
            used_words_file: PathBuf::from("used_words.txt"),
            admin_token: None,
            timing: Timing::default(),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

impl AppConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let admin_token = env_string("ADMIN_TOKEN");
        if admin_token.is_none() {
            tracing::warn!("ADMIN_TOKEN not set - admin commands are disabled");
        }

        let timing = Timing {
            role_reveal_delay: env_parse("ROLE_REVEAL_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.timing.role_reveal_delay),
            notify_min_interval: env_parse("NOTIFY_MIN_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.timing.notify_min_interval),
            lobby_timeout: env_parse("LOBBY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timing.lobby_timeout),
        };

        Self {
            bind_addr: env_parse("BIND_ADDR").unwrap_or(defaults.bind_addr),
            settings_file: env_string("SETTINGS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.settings_file),
            words_file: env_string("WORDS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.words_file),
            used_words_file: env_string("USED_WORDS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.used_words_file),
            admin_token,
            timing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "BIND_ADDR",
        "SETTINGS_FILE",
        "WORDS_FILE",
        "USED_WORDS_FILE",
        "ADMIN_TOKEN",
        "LOBBY_TIMEOUT_SECS",
        "ROLE_REVEAL_DELAY_MS",
        "NOTIFY_MIN_INTERVAL_MS",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = AppConfig::from_env();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.settings_file, PathBuf::from("server_config.json"));
        assert_eq!(config.admin_token, None);
        assert_eq!(config.timing.lobby_timeout, Duration::from_secs(3600));
    }

    #[test]
    #[serial]
    fn test_overrides_and_invalid_values() {
        clear_env();
        std::env::set_var("BIND_ADDR", "127.0.0.1:9000");
        std::env::set_var("ADMIN_TOKEN", "  secret ");
        std::env::set_var("LOBBY_TIMEOUT_SECS", "soon");
        std::env::set_var("NOTIFY_MIN_INTERVAL_MS", "250");

        let config = AppConfig::from_env();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.admin_token.as_deref(), Some("secret"));
        assert_eq!(config.timing.lobby_timeout, Duration::from_secs(3600));
        assert_eq!(
            config.timing.notify_min_interval,
            Duration::from_millis(250)
        );
        clear_env();
    }
}
