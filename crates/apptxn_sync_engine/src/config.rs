//! Configuration for flushing.

use apptxn_core::DeviceInfo;
use apptxn_storage::StoreConfig;
use apptxn_sync_protocol::{Charset, RequestMeta};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how transactions are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// URI of the remote transaction-store resource.
    pub resource_uri: String,
    /// Authentication scheme name.
    pub auth_scheme: String,
    /// Authentication token parameter name.
    pub auth_token_param_name: String,
    /// Payload character set.
    #[serde(default)]
    pub charset: Charset,
    /// Version of the app-transaction media type.
    #[serde(default = "default_media_type_version")]
    pub apptxn_media_type_version: String,
}

fn default_media_type_version() -> String {
    "0.0.1".into()
}

impl RemoteConfig {
    /// Creates a remote configuration.
    pub fn new(
        resource_uri: impl Into<String>,
        auth_scheme: impl Into<String>,
        auth_token_param_name: impl Into<String>,
    ) -> Self {
        Self {
            resource_uri: resource_uri.into(),
            auth_scheme: auth_scheme.into(),
            auth_token_param_name: auth_token_param_name.into(),
            charset: Charset::utf8(),
            apptxn_media_type_version: default_media_type_version(),
        }
    }

    /// Sets the payload charset.
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Sets the media-type version.
    pub fn with_media_type_version(mut self, version: impl Into<String>) -> Self {
        self.apptxn_media_type_version = version.into();
        self
    }

    /// Builds request metadata carrying `auth_token`.
    pub fn request_meta(&self, auth_token: &str) -> RequestMeta {
        RequestMeta {
            auth_scheme: self.auth_scheme.clone(),
            auth_token_param_name: self.auth_token_param_name.clone(),
            auth_token: auth_token.to_string(),
            charset: self.charset.clone(),
            apptxn_media_type_version: self.apptxn_media_type_version.clone(),
        }
    }
}

/// Backoff applied to transactions whose flush keeps failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Consecutive failures after which the delay stops growing.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }

    /// A configuration that retries failed transactions on every pass.
    pub fn no_backoff() -> Self {
        Self {
            max_attempts: u32::MAX,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before retrying after `failures` consecutive failures.
    ///
    /// Grows exponentially up to `max_delay`, and is `max_delay` once the
    /// failures are exhausted.
    pub fn delay_for_attempt(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        if self.is_exhausted(failures) {
            return self.max_delay;
        }

        let exponent = failures.saturating_sub(1);
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let delay_secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = delay_secs.min(self.max_delay.as_secs_f64());

        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }

    /// Returns true once `failures` has reached the cap.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Configuration for the flush coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushConfig {
    /// Remote endpoint and protocol metadata.
    pub remote: RemoteConfig,
    /// Backoff for failing transactions.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Period of the recurring asynchronous flush.
    #[serde(default = "default_flush_interval")]
    pub flush_interval: Duration,
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(60)
}

impl FlushConfig {
    /// Creates a flush configuration with default retry and interval.
    pub fn new(remote: RemoteConfig) -> Self {
        Self {
            remote,
            retry: RetryConfig::default(),
            flush_interval: default_flush_interval(),
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the recurring flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }
}

/// Everything needed to open a [`crate::TransactionManager`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Device metadata stamped on every new transaction.
    pub device: DeviceInfo,
    /// Flush configuration.
    pub flush: FlushConfig,
    /// Local store options.
    #[serde(skip)]
    pub store: StoreConfig,
}

impl ManagerConfig {
    /// Creates a manager configuration with default store options.
    pub fn new(device: DeviceInfo, flush: FlushConfig) -> Self {
        Self {
            device,
            flush,
            store: StoreConfig::default(),
        }
    }

    /// Sets the store options.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> RemoteConfig {
        RemoteConfig::new("https://api.example.com/apptxns", "fp-auth", "fp-token")
    }

    #[test]
    fn remote_config_builds_meta() {
        let config = remote().with_media_type_version("1.2.0");
        let meta = config.request_meta("tok");
        assert_eq!(meta.auth_token, "tok");
        assert_eq!(meta.media_type(), "application/vnd.apptxn-1.2.0+json");
        assert!(meta.charset.is_utf8());
    }

    #[test]
    fn flush_config_builder() {
        let config = FlushConfig::new(remote())
            .with_flush_interval(Duration::from_secs(15))
            .with_retry(RetryConfig::no_backoff());
        assert_eq!(config.flush_interval, Duration::from_secs(15));
        assert_eq!(config.retry.delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn retry_delay_is_capped() {
        let config = RetryConfig::new(4)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(5));
        assert!(!config.is_exhausted(3));
        assert!(config.is_exhausted(4));
    }

    #[test]
    fn exhausted_retries_wait_the_maximum_delay() {
        let config = RetryConfig::default();

        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(300));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(300));
        assert_eq!(RetryConfig::no_backoff().delay_for_attempt(u32::MAX), Duration::ZERO);
    }

    #[test]
    fn manager_config_from_json() {
        let json = r#"{
            "device": {"make": "Pixel 8", "os": "Android", "os_version": "14"},
            "flush": {
                "remote": {
                    "resource_uri": "https://api.example.com/apptxns",
                    "auth_scheme": "fp-auth",
                    "auth_token_param_name": "fp-token"
                }
            }
        }"#;
        let config: ManagerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.device.os, "Android");
        assert_eq!(config.flush.flush_interval, Duration::from_secs(60));
        assert_eq!(config.flush.remote.apptxn_media_type_version, "0.0.1");
        assert!(config.flush.remote.charset.is_utf8());
        assert_eq!(config.flush.retry, RetryConfig::default());
    }
}
