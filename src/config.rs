//! Client configuration
//!
//! A [`ClientConfig`] is built once and then shared read-only. To change a
//! running client, build a new config and swap it in whole.

use crate::transport::DebugSink;
use crate::types::{Credentials, Environment};
use crate::{PayssionError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_API_KEY: &str = "PAYSSION_API_KEY";
pub const ENV_API_SECRET: &str = "PAYSSION_API_SECRET";
pub const ENV_LIVE: &str = "PAYSSION_LIVE";
pub const ENV_TIMEOUT_SECS: &str = "PAYSSION_TIMEOUT_SECS";
pub const ENV_BASE_URL: &str = "PAYSSION_BASE_URL";

/// Configuration for a [`PayssionClient`](crate::PayssionClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key and secret
    pub credentials: Credentials,
    /// Live or sandbox gateway
    pub environment: Environment,
    /// Per-request timeout
    pub timeout: Option<Duration>,
    /// Overrides the environment's base URL (tests, proxies)
    pub base_url: Option<String>,
    /// Where request/response dumps go
    pub debug_sink: DebugSink,
}

/// On-disk form of [`ClientConfig`]
#[derive(Debug, Deserialize)]
struct ConfigFile {
    api_key: String,
    api_secret: String,
    #[serde(default)]
    live: bool,
    timeout_secs: Option<u64>,
    base_url: Option<String>,
}

impl ClientConfig {
    /// Create a sandbox config with the default timeout
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(api_key, api_secret),
            environment: Environment::default(),
            timeout: Some(DEFAULT_TIMEOUT),
            base_url: None,
            debug_sink: DebugSink::discard(),
        }
    }

    /// Set the environment
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Switch between live and sandbox
    pub fn with_live(self, live: bool) -> Self {
        self.with_environment(Environment::from_live(live))
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disable the client-side timeout
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Send requests to a custom base URL instead of the environment's host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the debug sink
    pub fn with_debug_sink(mut self, debug_sink: DebugSink) -> Self {
        self.debug_sink = debug_sink;
        self
    }

    /// Base URL requests are sent to
    pub fn api_host(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    /// Full URL for an API path
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.api_host().trim_end_matches('/'), path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.credentials.api_key.is_empty() {
            return Err(PayssionError::config("API key cannot be empty"));
        }

        if self.credentials.api_secret.is_empty() {
            return Err(PayssionError::config("API secret cannot be empty"));
        }

        if let Some(base_url) = &self.base_url {
            let parsed = url::Url::parse(base_url)
                .map_err(|e| PayssionError::config(format!("Invalid base URL: {}", e)))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(PayssionError::config(
                    "Base URL must start with http:// or https://",
                ));
            }
        }

        Ok(())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Load configuration through a variable lookup function
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .ok_or_else(|| PayssionError::config(format!("{} is required", ENV_API_KEY)))?;
        let api_secret = lookup(ENV_API_SECRET)
            .ok_or_else(|| PayssionError::config(format!("{} is required", ENV_API_SECRET)))?;

        let mut config = Self::new(api_key, api_secret);

        if let Some(live) = lookup(ENV_LIVE) {
            let live: bool = live
                .trim()
                .parse()
                .map_err(|e| PayssionError::config(format!("Invalid {}: {}", ENV_LIVE, e)))?;
            config = config.with_live(live);
        }

        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                PayssionError::config(format!("Invalid {}: {}", ENV_TIMEOUT_SECS, e))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config = config.with_base_url(base_url);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| PayssionError::config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Self::new(file.api_key, file.api_secret).with_live(file.live);
        if let Some(secs) = file.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(base_url) = file.base_url {
            config = config.with_base_url(base_url);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("ak1", "sk1");
        assert_eq!(config.environment, Environment::Sandbox);
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT));
        assert!(!config.debug_sink.is_enabled());
        assert_eq!(config.api_host(), "https://sandbox.payssion.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_url_per_environment() {
        let sandbox = ClientConfig::new("ak1", "sk1");
        assert_eq!(
            sandbox.endpoint_url("/api/v1/payment/create"),
            "https://sandbox.payssion.com/api/v1/payment/create"
        );

        let live = sandbox.with_live(true);
        assert_eq!(
            live.endpoint_url("/api/v1/payment/create"),
            "https://www.payssion.com/api/v1/payment/create"
        );
    }

    #[test]
    fn test_base_url_override() {
        let config = ClientConfig::new("ak1", "sk1")
            .with_live(true)
            .with_base_url("http://127.0.0.1:8080/");
        assert_eq!(
            config.endpoint_url("/api/v1/payment/create"),
            "http://127.0.0.1:8080/api/v1/payment/create"
        );
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let err = ClientConfig::new("", "sk1").validate().unwrap_err();
        assert!(err.to_string().contains("API key cannot be empty"));

        let err = ClientConfig::new("ak1", "").validate().unwrap_err();
        assert!(err.to_string().contains("API secret cannot be empty"));

        let err = ClientConfig::new("ak1", "sk1")
            .with_base_url("not a url")
            .validate()
            .unwrap_err();
        assert!(matches!(err, PayssionError::Config { .. }));

        let err = ClientConfig::new("ak1", "sk1")
            .with_base_url("ftp://example.com")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("http:// or https://"));
    }

    #[test]
    fn test_from_env_with() {
        let config = ClientConfig::from_env_with(lookup(&[
            (ENV_API_KEY, "ak1"),
            (ENV_API_SECRET, "sk1"),
            (ENV_LIVE, "true"),
            (ENV_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();

        assert_eq!(config.credentials.api_key, "ak1");
        assert_eq!(config.credentials.api_secret, "sk1");
        assert!(config.environment.is_live());
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.base_url, None);
    }

    #[test]
    fn test_from_env_with_missing_secret() {
        let err = ClientConfig::from_env_with(lookup(&[(ENV_API_KEY, "ak1")])).unwrap_err();
        assert!(err.to_string().contains(ENV_API_SECRET));
    }

    #[test]
    fn test_from_env_with_invalid_live_flag() {
        let err = ClientConfig::from_env_with(lookup(&[
            (ENV_API_KEY, "ak1"),
            (ENV_API_SECRET, "sk1"),
            (ENV_LIVE, "yes please"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(ENV_LIVE));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"api_key": "ak1", "api_secret": "sk1", "live": true, "timeout_secs": 10}}"#
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.credentials, Credentials::new("ak1", "sk1"));
        assert_eq!(config.environment, Environment::Live);
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_from_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = ClientConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));

        let err = ClientConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, PayssionError::Io(_)));
    }
}
