use std::time::Duration;

use crate::poll::{PollConfig, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the generation backend (default: `http://localhost:3000`).
    pub api_url: String,
    /// Bearer token sent with every request, if any.
    pub api_token: Option<String>,
    pub poll: PollConfig,
}

/// A configuration variable held an unusable value.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be a whole number of milliseconds, got '{value}'")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            api_token: None,
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `GENJOB_API_URL`            | `http://localhost:3000` |
    /// | `GENJOB_API_TOKEN`          | unset                   |
    /// | `GENJOB_POLL_INTERVAL_MS`   | `3000`                  |
    /// | `GENJOB_POLL_TIMEOUT_MS`    | `300000`                |
    /// | `GENJOB_REQUEST_TIMEOUT_MS` | `45000`                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("GENJOB_API_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "http://localhost:3000".into());

        let api_token = lookup("GENJOB_API_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let poll = PollConfig {
            interval: millis(&lookup, "GENJOB_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL)?,
            timeout: millis(&lookup, "GENJOB_POLL_TIMEOUT_MS", DEFAULT_POLL_TIMEOUT)?,
            request_timeout: millis(&lookup, "GENJOB_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT)?,
        };

        Ok(Self {
            api_url,
            api_token,
            poll,
        })
    }
}

fn millis<F>(lookup: &F, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("GENJOB_API_URL", "https://gen.example.com"),
            ("GENJOB_API_TOKEN", "secret"),
            ("GENJOB_POLL_INTERVAL_MS", "500"),
            ("GENJOB_POLL_TIMEOUT_MS", " 60000 "),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://gen.example.com");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.poll.interval, Duration::from_millis(500));
        assert_eq!(config.poll.timeout, Duration::from_secs(60));
        assert_eq!(config.poll.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn blank_token_is_ignored() {
        let config = ClientConfig::from_lookup(lookup(&[("GENJOB_API_TOKEN", "  ")])).unwrap();
        assert!(config.api_token.is_none());
    }

    #[test]
    fn invalid_number_names_the_variable() {
        let err = ClientConfig::from_lookup(lookup(&[("GENJOB_REQUEST_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert_eq!(err.var, "GENJOB_REQUEST_TIMEOUT_MS");
        assert!(err.to_string().contains("soon"));
    }
}
