use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Bounded polling schedule for resources that become ready asynchronously.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay before the second probe.
    pub interval_ms: u64,
    /// Upper bound for the doubling delay.
    pub max_interval_ms: u64,
    /// Probes before giving up with `PollTimeout`.
    pub max_attempts: u32,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms.max(self.interval_ms))
    }

    /// A schedule for tests: 1 ms between probes.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            interval_ms: 1,
            max_interval_ms: 1,
            max_attempts,
        }
    }
}

/// Configuration for the storage layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Provisioned read throughput for new tables.
    pub read_capacity: u64,
    /// Provisioned write throughput for new tables.
    pub write_capacity: u64,
    /// File extension of package blobs. Part of the persisted key format.
    pub package_extension: String,
    /// Wait for a new bucket to become visible.
    pub bucket_poll: PollConfig,
    /// Wait for a new table to become active.
    pub table_poll: PollConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            read_capacity: 5,
            write_capacity: 1,
            package_extension: "nupkg".into(),
            bucket_poll: PollConfig {
                interval_ms: 100,
                max_interval_ms: 1_000,
                max_attempts: 120,
            },
            table_poll: PollConfig {
                interval_ms: 200,
                max_interval_ms: 2_000,
                max_attempts: 150,
            },
        }
    }
}

impl StorageConfig {
    /// Fast polling for tests and in-memory embedding.
    pub fn for_tests() -> Self {
        Self {
            bucket_poll: PollConfig::immediate(20),
            table_poll: PollConfig::immediate(20),
            ..Default::default()
        }
    }

    pub fn from_toml_str(source: &str) -> StorageResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| StorageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.bucket_poll.max_attempts == 0 || self.table_poll.max_attempts == 0 {
            return Err(StorageError::Config("poll max_attempts must be at least 1".into()));
        }
        if self.read_capacity == 0 || self.write_capacity == 0 {
            return Err(StorageError::Config("table capacities must be at least 1".into()));
        }
        if self.package_extension.is_empty() || self.package_extension.contains(&['/', '.'][..]) {
            return Err(StorageError::Config(format!(
                "invalid package extension {:?}",
                self.package_extension
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = StorageConfig::default();
        assert_eq!(c.bucket_poll.interval(), Duration::from_millis(100));
        assert_eq!(c.table_poll.interval(), Duration::from_millis(200));
        assert_eq!(c.read_capacity, 5);
        assert_eq!(c.write_capacity, 1);
        assert_eq!(c.package_extension, "nupkg");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = StorageConfig::from_toml_str(
            r#"
            read_capacity = 10

            [table_poll]
            interval_ms = 50
            max_interval_ms = 400
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(c.read_capacity, 10);
        assert_eq!(c.table_poll.max_attempts, 5);
        assert_eq!(c.bucket_poll, StorageConfig::default().bucket_poll);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = StorageConfig::from_toml_str(
            "[bucket_poll]\ninterval_ms = 1\nmax_interval_ms = 1\nmax_attempts = 0\n",
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn bad_extension_rejected() {
        let c = StorageConfig {
            package_extension: "tar.gz".into(),
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn max_interval_never_below_interval() {
        let p = PollConfig {
            interval_ms: 500,
            max_interval_ms: 10,
            max_attempts: 3,
        };
        assert_eq!(p.max_interval(), Duration::from_millis(500));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "package_extension = \"snupkg\"").unwrap();
        let c = StorageConfig::load(file.path()).unwrap();
        assert_eq!(c.package_extension, "snupkg");
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StorageConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let c = StorageConfig::for_tests();
        let text = toml::to_string(&c).unwrap();
        assert_eq!(StorageConfig::from_toml_str(&text).unwrap(), c);
    }
}
