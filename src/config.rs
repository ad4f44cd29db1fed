//! Configuration types for userdata-packager

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Remote async-job polling configuration
///
/// Every long-running job on the table service (CSV export, bulk attachment
/// download) is driven by the same bounded poll loop; these two knobs bound
/// the wait for any single job to `interval_millis * max_tries`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfig {
    /// Sleep between poll attempts, in milliseconds (default: 1000).
    ///
    /// Zero means "poll as fast as possible" and is intended for tests.
    #[serde(default = "default_poll_interval_millis")]
    pub interval_millis: u64,

    /// Maximum number of poll attempts before a job is declared timed out (default: 300)
    #[serde(default = "default_poll_max_tries")]
    pub max_tries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_millis: default_poll_interval_millis(),
            max_tries: default_poll_max_tries(),
        }
    }
}

impl PollConfig {
    /// Poll interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_millis)
    }
}

/// Object storage configuration for the finished archive
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket the master archive is uploaded to (required, no default)
    #[serde(default)]
    pub userdata_bucket: String,

    /// Lifetime of the returned pre-signed URL, in hours (default: 24)
    #[serde(default = "default_url_expiration_hours")]
    pub url_expiration_hours: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            userdata_bucket: String::new(),
            url_expiration_hours: default_url_expiration_hours(),
        }
    }
}

/// Packager behavior configuration (working directory, concurrency)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PackagerConfig {
    /// Root directory under which per-request temp directories are created (default: "./temp")
    #[serde(default = "default_temp_root")]
    pub temp_root: PathBuf,

    /// Maximum number of per-table download tasks running concurrently (default: 4)
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
}

impl Default for PackagerConfig {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
        }
    }
}

/// Main configuration for the packager
///
/// Fields are organized into logical sub-configs:
/// - [`poll`](PollConfig) -- remote async-job poll interval and retry cap
/// - [`storage`](StorageConfig) -- destination bucket and URL lifetime
/// - [`packager`](PackagerConfig) -- temp directory root and task concurrency
///
/// This is a plain serde struct; reading it from a file or the environment
/// is the embedding application's concern.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote async-job polling settings
    #[serde(default)]
    pub poll: PollConfig,

    /// Object storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Packager behavior settings
    #[serde(default)]
    pub packager: PackagerConfig,
}

impl Config {
    /// Validate the configuration, returning the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.poll.max_tries == 0 {
            return Err(Error::Config {
                message: "poll retry cap must be greater than zero".into(),
                key: Some("poll.max_tries".into()),
            });
        }
        if self.storage.userdata_bucket.is_empty() {
            return Err(Error::Config {
                message: "destination bucket must be set".into(),
                key: Some("storage.userdata_bucket".into()),
            });
        }
        if self.storage.url_expiration_hours <= 0 {
            return Err(Error::Config {
                message: "pre-signed URL lifetime must be greater than zero".into(),
                key: Some("storage.url_expiration_hours".into()),
            });
        }
        if self.packager.max_concurrent_tasks == 0 {
            return Err(Error::Config {
                message: "task concurrency must be greater than zero".into(),
                key: Some("packager.max_concurrent_tasks".into()),
            });
        }
        Ok(())
    }
}

fn default_poll_interval_millis() -> u64 {
    1000
}

fn default_poll_max_tries() -> u32 {
    300
}

fn default_url_expiration_hours() -> i64 {
    24
}

fn default_temp_root() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_max_concurrent_tasks() -> usize {
    4
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.storage.userdata_bucket = "org-userdata".to_string();
        config
    }

    #[test]
    fn default_config_fails_validation_without_bucket() {
        let err = Config::default().validate().unwrap_err();
        match err {
            Error::Config { key, .. } => {
                assert_eq!(key.as_deref(), Some("storage.userdata_bucket"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn zero_max_tries_is_rejected() {
        let mut config = valid_config();
        config.poll.max_tries = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry cap"));
    }

    #[test]
    fn zero_expiration_is_rejected() {
        let mut config = valid_config();
        config.storage.url_expiration_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = valid_config();
        config.packager.max_concurrent_tasks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_fields_take_defaults_when_deserializing() {
        let config: Config =
            serde_json::from_str(r#"{"storage":{"userdata_bucket":"bucket-1"}}"#).unwrap();
        assert_eq!(config.poll.interval_millis, 1000);
        assert_eq!(config.poll.max_tries, 300);
        assert_eq!(config.storage.url_expiration_hours, 24);
        assert_eq!(config.storage.userdata_bucket, "bucket-1");
        assert_eq!(config.packager.max_concurrent_tasks, 4);
        config.validate().unwrap();
    }

    #[test]
    fn zero_interval_is_allowed() {
        let mut config = valid_config();
        config.poll.interval_millis = 0;
        config.validate().unwrap();
        assert_eq!(config.poll.interval(), Duration::ZERO);
    }
}
