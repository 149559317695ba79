//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment name (e.g., "dev", "prod").
    #[serde(default = "default_env")]
    pub env: String,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
    /// Application-level settings.
    #[serde(default)]
    pub app: ApplicationConfig,
    /// Object store configuration.
    pub objectstore: ObjectStoreConfig,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum level: debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: json or text.
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Include source file/line in log events.
    #[serde(default)]
    pub add_source: bool,
    /// Timestamp format string (empty = subscriber default).
    #[serde(default)]
    pub time_format: String,
}

/// Application settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Service name used in logs.
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Bind address for the HTTP server.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Capacity of the background push job queue. Enqueueing blocks when
    /// this many jobs are already waiting.
    #[serde(default = "default_job_buffer")]
    pub job_buffer: usize,
    /// JWT settings, consumed by the auth layer in front of this service.
    #[serde(default)]
    pub jwt: JwtConfig,
}

/// JWT configuration. Carried for the surrounding auth layer; the storage
/// core does not interpret these values.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_token_duration")]
    pub access_token_duration: i64,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_token_duration")]
    pub refresh_token_duration: i64,
    #[serde(default)]
    pub refresh_secret: String,
}

/// Object store configuration: local cache tier, remote primary tier, and
/// the cache eviction budget.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Default TTL in seconds for presigned URLs passed through to clients.
    #[serde(default = "default_presigned_ttl")]
    pub presigned_default_ttl: i64,
    /// Local filesystem backend (cache tier).
    pub local: LocalConfig,
    /// Remote backend (primary tier), reached via the Storj S3 gateway.
    pub storj: StorjConfig,
    /// Cache sizing.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Local filesystem backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Root directory where objects are stored on disk.
    pub root: PathBuf,
    /// Public base URL used to construct object URLs. Optional.
    #[serde(default)]
    pub base_url: String,
}

/// Remote backend configuration.
///
/// The primary tier speaks S3 against the Storj gateway. `access_grant`
/// carries the gateway credentials as `access_key_id:secret_access_key`;
/// `base_url` is the gateway endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorjConfig {
    /// Bucket name where objects are stored.
    pub bucket: String,
    /// Gateway credentials, `access_key_id:secret_access_key`.
    pub access_grant: String,
    /// Gateway endpoint URL.
    #[serde(default)]
    pub base_url: String,
}

/// Cache tier sizing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cache size in megabytes. 0 disables eviction.
    #[serde(default)]
    pub max_size: i64,
}

impl CacheConfig {
    /// Byte budget handed to the eviction policy.
    pub fn max_size_bytes(&self) -> i64 {
        self.max_size * 1024 * 1024
    }
}

fn default_env() -> String {
    "dev".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_app_name() -> String {
    "templar".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_job_buffer() -> usize {
    16
}

fn default_access_token_duration() -> i64 {
    900
}

fn default_refresh_token_duration() -> i64 {
    86400
}

fn default_presigned_ttl() -> i64 {
    3600
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            add_source: false,
            time_format: String::new(),
        }
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            bind: default_bind(),
            job_buffer: default_job_buffer(),
            jwt: JwtConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self.log.level.as_str() {
            "debug" | "info" | "warn" | "error" => {}
            other => return Err(format!("log.level must be one of debug|info|warn|error, got {other:?}")),
        }
        match self.log.format.as_str() {
            "json" | "text" => {}
            other => return Err(format!("log.format must be json or text, got {other:?}")),
        }
        if self.app.job_buffer < 1 {
            return Err("app.job_buffer must be at least 1".to_string());
        }
        if self.objectstore.local.root.as_os_str().is_empty() {
            return Err("objectstore.local.root is required".to_string());
        }
        if self.objectstore.cache.max_size < 0 {
            return Err("objectstore.cache.max_size must not be negative".to_string());
        }
        Ok(())
    }

    /// Create a test configuration rooted at the given directory.
    ///
    /// **For testing only.** The remote tier points at a dummy gateway; tests
    /// substitute in-memory or filesystem backends instead of connecting.
    pub fn for_testing(root: impl Into<PathBuf>) -> Self {
        Self {
            env: "test".to_string(),
            log: LogConfig::default(),
            app: ApplicationConfig {
                job_buffer: 4,
                ..ApplicationConfig::default()
            },
            objectstore: ObjectStoreConfig {
                presigned_default_ttl: default_presigned_ttl(),
                local: LocalConfig {
                    root: root.into(),
                    base_url: String::new(),
                },
                storj: StorjConfig {
                    bucket: "templar-test".to_string(),
                    access_grant: "test:test".to_string(),
                    base_url: "http://localhost:7777".to_string(),
                },
                cache: CacheConfig { max_size: 0 },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_testing_validates() {
        let config = AppConfig::for_testing("/tmp/templar-test");
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_log_level() {
        let mut config = AppConfig::for_testing("/tmp/templar-test");
        config.log.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_job_buffer() {
        let mut config = AppConfig::for_testing("/tmp/templar-test");
        config.app.job_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_size_bytes_converts_megabytes() {
        let cache = CacheConfig { max_size: 10 };
        assert_eq!(cache.max_size_bytes(), 10 * 1024 * 1024);
        assert_eq!(CacheConfig { max_size: 0 }.max_size_bytes(), 0);
    }
}
