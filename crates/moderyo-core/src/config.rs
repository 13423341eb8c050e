use serde_json::Value;

use crate::error::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.moderyo.com";
pub const DEFAULT_MODEL: &str = "omni-moderation-latest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;

/// Immutable connection and retry parameters, validated at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_key: String,
    /// Base URL with any trailing slash stripped.
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_delay_secs: f64,
    /// Model sent when a request does not name one.
    pub default_model: String,
}

impl Config {
    const API_KEY_ENV: &'static str = "MODERYO_API_KEY";
    const BASE_URL_ENV: &'static str = "MODERYO_BASE_URL";
    const TIMEOUT_ENV: &'static str = "MODERYO_TIMEOUT";
    const MAX_RETRIES_ENV: &'static str = "MODERYO_MAX_RETRIES";

    /// Configuration with the given API key and defaults everywhere else.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Self::builder(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(api_key)
    }

    /// Build from an untyped options mapping.
    ///
    /// Each option is recognized under both its camelCase and snake_case
    /// spelling (`maxRetries` / `max_retries`), camelCase winning when both
    /// are present.
    pub fn from_value(options: &Value) -> Result<Self, Error> {
        let map = options
            .as_object()
            .ok_or_else(|| Error::InvalidConfiguration("options must be an object".into()))?;

        let pick = |camel: &str, snake: &str| {
            map.get(camel)
                .filter(|v| !v.is_null())
                .or_else(|| map.get(snake).filter(|v| !v.is_null()))
        };

        let mut builder = ConfigBuilder::new(
            pick("apiKey", "api_key")
                .map(|v| option_string(v, "apiKey"))
                .transpose()?
                .unwrap_or_default(),
        );
        if let Some(value) = pick("baseUrl", "base_url") {
            builder = builder.base_url(option_string(value, "baseUrl")?);
        }
        if let Some(value) = pick("timeoutSeconds", "timeout_seconds").or_else(|| pick("timeout", "timeout")) {
            builder = builder.timeout_secs(option_u64(value, "timeoutSeconds")?);
        }
        if let Some(value) = pick("maxRetries", "max_retries") {
            builder = builder.max_retries(option_u64(value, "maxRetries")? as u32);
        }
        if let Some(value) = pick("retryDelaySeconds", "retry_delay_seconds")
            .or_else(|| pick("retryDelay", "retry_delay"))
        {
            builder = builder.retry_delay_secs(option_f64(value, "retryDelaySeconds")?);
        }
        if let Some(value) = pick("defaultModel", "default_model") {
            builder = builder.default_model(option_string(value, "defaultModel")?);
        }
        builder.build()
    }

    /// Build from `MODERYO_API_KEY`, `MODERYO_BASE_URL`, `MODERYO_TIMEOUT`
    /// and `MODERYO_MAX_RETRIES`. Unset or unparseable numeric variables fall
    /// back to the defaults.
    pub fn from_env() -> Result<Self, Error> {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let mut builder = ConfigBuilder::new(read(Self::API_KEY_ENV).unwrap_or_default());
        if let Some(base_url) = read(Self::BASE_URL_ENV) {
            builder = builder.base_url(base_url);
        }
        if let Some(timeout) = read(Self::TIMEOUT_ENV).and_then(|v| v.trim().parse().ok()) {
            builder = builder.timeout_secs(timeout);
        }
        if let Some(retries) = read(Self::MAX_RETRIES_ENV).and_then(|v| v.trim().parse().ok()) {
            builder = builder.max_retries(retries);
        }
        builder.build()
    }
}

/// Fluent constructor for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    api_key: String,
    base_url: String,
    timeout_secs: u64,
    max_retries: u32,
    retry_delay_secs: f64,
    default_model: String,
}

impl ConfigBuilder {
    fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay_secs(mut self, retry_delay_secs: f64) -> Self {
        self.retry_delay_secs = retry_delay_secs;
        self
    }

    pub fn default_model(mut self, default_model: impl Into<String>) -> Self {
        self.default_model = default_model.into();
        self
    }

    pub fn build(self) -> Result<Config, Error> {
        if self.api_key.trim().is_empty() {
            return Err(Error::InvalidConfiguration("API key is required".into()));
        }
        if !self.retry_delay_secs.is_finite() || self.retry_delay_secs < 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "retry delay must be a non-negative number of seconds (got {})",
                self.retry_delay_secs
            )));
        }
        Ok(Config {
            api_key: self.api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            retry_delay_secs: self.retry_delay_secs,
            default_model: self.default_model,
        })
    }
}

fn option_string(value: &Value, key: &str) -> Result<String, Error> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidConfiguration(format!("`{key}` must be a string")))
}

fn option_u64(value: &Value, key: &str) -> Result<u64, Error> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| Error::InvalidConfiguration(format!("`{key}` must be a non-negative integer")))
}

fn option_f64(value: &Value, key: &str) -> Result<f64, Error> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| Error::InvalidConfiguration(format!("`{key}` must be a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use serde_json::json;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn with_env_lock<F: FnOnce()>(func: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var(Config::API_KEY_ENV);
        env::remove_var(Config::BASE_URL_ENV);
        env::remove_var(Config::TIMEOUT_ENV);
        env::remove_var(Config::MAX_RETRIES_ENV);
        func();
        env::remove_var(Config::API_KEY_ENV);
        env::remove_var(Config::BASE_URL_ENV);
        env::remove_var(Config::TIMEOUT_ENV);
        env::remove_var(Config::MAX_RETRIES_ENV);
    }

    #[test]
    fn api_key_alone_yields_documented_defaults() {
        let config = Config::new("test-key").unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_secs, 1.0);
        assert_eq!(config.default_model, "omni-moderation-latest");
    }

    #[test]
    fn empty_api_key_fails_construction() {
        let err = Config::new("   ").unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn trailing_slash_is_stripped_from_base_url() {
        let config = Config::builder("key")
            .base_url("https://custom.api.com/")
            .build()
            .unwrap();
        assert_eq!(config.base_url, "https://custom.api.com");
    }

    #[test]
    fn negative_retry_delay_is_rejected() {
        let err = Config::builder("key").retry_delay_secs(-1.0).build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn from_value_accepts_camel_case_options() {
        let config = Config::from_value(&json!({
            "apiKey": "key",
            "baseUrl": "https://custom.api.com",
            "timeoutSeconds": 60,
            "maxRetries": 5,
            "retryDelaySeconds": 2.0,
            "defaultModel": "text-moderation-latest",
        }))
        .unwrap();
        assert_eq!(config.base_url, "https://custom.api.com");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay_secs, 2.0);
        assert_eq!(config.default_model, "text-moderation-latest");
    }

    #[test]
    fn from_value_accepts_snake_case_options() {
        let config = Config::from_value(&json!({
            "api_key": "key",
            "base_url": "https://snake.api.com",
            "max_retries": 5,
            "retry_delay": 0.5,
        }))
        .unwrap();
        assert_eq!(config.base_url, "https://snake.api.com");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay_secs, 0.5);
    }

    #[test]
    fn camel_case_wins_when_both_spellings_present() {
        let config = Config::from_value(&json!({
            "apiKey": "key",
            "maxRetries": 7,
            "max_retries": 2,
        }))
        .unwrap();
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn from_value_requires_an_api_key() {
        let err = Config::from_value(&json!({ "baseUrl": "https://x.com" })).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn from_value_rejects_mistyped_options() {
        let err = Config::from_value(&json!({ "apiKey": "key", "maxRetries": "lots" }))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(ref msg) if msg.contains("maxRetries")));
    }

    #[test]
    fn from_env_reads_all_variables() {
        with_env_lock(|| {
            env::set_var(Config::API_KEY_ENV, "env-key");
            env::set_var(Config::BASE_URL_ENV, "https://env.api.com/");
            env::set_var(Config::TIMEOUT_ENV, "45");
            env::set_var(Config::MAX_RETRIES_ENV, "6");

            let config = Config::from_env().unwrap();
            assert_eq!(config.api_key, "env-key");
            assert_eq!(config.base_url, "https://env.api.com");
            assert_eq!(config.timeout_secs, 45);
            assert_eq!(config.max_retries, 6);
        });
    }

    #[test]
    fn from_env_falls_back_on_unparseable_numbers() {
        with_env_lock(|| {
            env::set_var(Config::API_KEY_ENV, "env-key");
            env::set_var(Config::TIMEOUT_ENV, "a while");

            let config = Config::from_env().unwrap();
            assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        });
    }

    #[test]
    fn from_env_errors_without_api_key() {
        with_env_lock(|| {
            assert!(Config::from_env().is_err());
        });
    }
}
