use serde::Deserialize;

use crate::{HttpError, Result};

/// Configures per-attempt timeout, retry ceiling and redirect ceiling.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Failures tolerated before a server error is surfaced to the caller.
    pub max_retries: u32,
    /// Number of 3xx hops followed before giving up.
    pub max_redirects: u32,
    /// Backoff period; attempt `n` waits `retry_delay_start_ms * n^2`.
    pub retry_delay_start_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 5,
            max_redirects: 5,
            retry_delay_start_ms: 50,
        }
    }
}

impl ClientOptions {
    /// Reads overrides from the environment, starting from the defaults.
    ///
    /// Recognized variables:
    /// - `HTTP_RETRY_MAX_RETRIES`
    /// - `HTTP_RETRY_MAX_REDIRECTS`
    /// - `HTTP_RETRY_DELAY_START_MS`
    /// - `HTTP_RETRY_TIMEOUT_MS`
    ///
    /// Unset variables keep their default; values that do not parse are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();
        if let Some(value) = parse_var(&lookup, "HTTP_RETRY_MAX_RETRIES")? {
            opts.max_retries = value;
        }
        if let Some(value) = parse_var(&lookup, "HTTP_RETRY_MAX_REDIRECTS")? {
            opts.max_redirects = value;
        }
        if let Some(value) = parse_var(&lookup, "HTTP_RETRY_DELAY_START_MS")? {
            opts.retry_delay_start_ms = value;
        }
        if let Some(value) = parse_var(&lookup, "HTTP_RETRY_TIMEOUT_MS")? {
            opts.timeout_ms = value;
        }
        Ok(opts)
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| HttpError::Config(format!("{name} must be an integer, got '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::ClientOptions;
    use crate::HttpError;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_ceilings() {
        let opts = ClientOptions::default();
        assert_eq!(opts.max_retries, 5);
        assert_eq!(opts.max_redirects, 5);
        assert_eq!(opts.retry_delay_start_ms, 50);
    }

    #[test]
    fn env_overrides_only_what_is_set() {
        let opts = ClientOptions::from_lookup(lookup(&[
            ("HTTP_RETRY_MAX_RETRIES", "2"),
            ("HTTP_RETRY_MAX_REDIRECTS", " "),
        ]))
        .expect("options must parse");
        assert_eq!(opts.max_retries, 2);
        assert_eq!(opts.max_redirects, 5);
    }

    #[test]
    fn env_rejects_non_numeric_values() {
        let err = ClientOptions::from_lookup(lookup(&[("HTTP_RETRY_TIMEOUT_MS", "soon")]))
            .expect_err("must reject");
        assert!(matches!(err, HttpError::Config(msg) if msg.contains("HTTP_RETRY_TIMEOUT_MS")));
    }

    #[test]
    fn deserializes_partial_config_with_defaults() {
        let opts: ClientOptions =
            serde_json::from_str(r#"{"max_redirects": 1}"#).expect("config must deserialize");
        assert_eq!(opts.max_redirects, 1);
        assert_eq!(opts.max_retries, 5);
    }
}
