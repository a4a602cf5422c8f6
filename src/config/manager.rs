//! Connection controller timing and behavior configuration.
//!
//! Defaults match the original device firmware. Every value can be
//! overridden from a key lookup (the process environment on the host):
//!
//! | Key | Field |
//! |---|---|
//! | `WIFI_MANAGER_CONNECT_WAIT_MS` | `connect_wait_ms` |
//! | `WIFI_MANAGER_MIN_RETRY_WAIT_MS` | `min_retry_wait_ms` |
//! | `WIFI_MANAGER_MONITOR_INTERVAL_MS` | `monitor_interval_ms` |
//! | `WIFI_MANAGER_MAX_RETRIES` | `max_retries` |
//! | `WIFI_MANAGER_MAX_SYNC_WAIT_MS` | `max_sync_wait_ms` |
//! | `WIFI_MANAGER_SYNC_POLL_MS` | `sync_poll_ms` |
//! | `WIFI_MANAGER_SYNC_THRESHOLD_SECS` | `sync_threshold_secs` |
//! | `WIFI_MANAGER_RESET_COUNTDOWN_SECS` | `reset_countdown_secs` |
//! | `WIFI_MANAGER_NTP_SERVERS` | `ntp_servers` (comma separated) |
//! | `WIFI_MANAGER_RESTART_AFTER_PROVISIONING` | `restart_after_provisioning` |
//! | `WIFI_MANAGER_RECORD_OFFSET` | `record_offset` |
//!
//! `record_offset` must leave room for the whole record inside the
//! [`STORAGE_SIZE`] byte store, i.e. at most `STORAGE_SIZE - RECORD_LEN`.

use super::RECORD_LEN;
use crate::storage::STORAGE_SIZE;
use std::fmt;
use std::str::FromStr;

/// Prefix shared by all override keys.
pub const ENV_PREFIX: &str = "WIFI_MANAGER_";

/// Unix time of 2024-01-01T00:00:00Z.
///
/// Clock readings below this are treated as "not yet synchronized". The
/// value goes stale as firmware ages; override it rather than relying on it.
pub const DEFAULT_SYNC_THRESHOLD_SECS: u64 = 1_704_067_200;

/// Maximum number of time servers handed to the time-sync client.
pub const MAX_NTP_SERVERS: usize = 2;

/// Configuration for the connection controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Time the link driver is given to associate before the outcome is checked.
    pub connect_wait_ms: u64,

    /// Minimum time between two connection attempts.
    pub min_retry_wait_ms: u64,

    /// Minimum time between two link status queries while connected.
    pub monitor_interval_ms: u64,

    /// Connection attempts allowed before the device is reset.
    pub max_retries: u32,

    /// Deadline for time synchronization after the link comes up.
    pub max_sync_wait_ms: u64,

    /// Interval between clock plausibility checks while waiting for sync.
    pub sync_poll_ms: u64,

    /// Clock readings at or above this Unix time count as synchronized.
    pub sync_threshold_secs: u64,

    /// Countdown logged before a forced reset.
    pub reset_countdown_secs: u32,

    /// Time servers, primary first.
    pub ntp_servers: Vec<String>,

    /// Restart the device after new credentials are saved.
    pub restart_after_provisioning: bool,

    /// Countdown used for the post-provisioning restart.
    pub provisioning_countdown_secs: u32,

    /// Offset of the credential record inside the blob store.
    pub record_offset: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            connect_wait_ms: 3_000,
            min_retry_wait_ms: 15_000,
            monitor_interval_ms: 1_000,
            max_retries: 10,
            max_sync_wait_ms: 60_000,
            sync_poll_ms: 10,
            sync_threshold_secs: DEFAULT_SYNC_THRESHOLD_SECS,
            reset_countdown_secs: 10,
            ntp_servers: vec!["pool.ntp.org".to_string()],
            restart_after_provisioning: false,
            provisioning_countdown_secs: 3,
            record_offset: 0,
        }
    }
}

impl ManagerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be > 0"));
        }
        if self.min_retry_wait_ms == 0 {
            return Err(ConfigError::Invalid("min_retry_wait_ms must be > 0"));
        }
        if self.connect_wait_ms == 0 {
            return Err(ConfigError::Invalid("connect_wait_ms must be > 0"));
        }
        if self.monitor_interval_ms == 0 {
            return Err(ConfigError::Invalid("monitor_interval_ms must be > 0"));
        }
        if self.sync_poll_ms == 0 {
            return Err(ConfigError::Invalid("sync_poll_ms must be > 0"));
        }
        if self.max_sync_wait_ms <= self.sync_poll_ms {
            return Err(ConfigError::Invalid(
                "max_sync_wait_ms must be > sync_poll_ms",
            ));
        }
        if self.ntp_servers.is_empty() {
            return Err(ConfigError::Invalid("at least one NTP server is required"));
        }
        if self.ntp_servers.len() > MAX_NTP_SERVERS {
            return Err(ConfigError::Invalid("at most two NTP servers are supported"));
        }
        if self.ntp_servers.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid("NTP server names cannot be empty"));
        }
        let record_end = self.record_offset.checked_add(RECORD_LEN);
        if record_end.map_or(true, |end| end > STORAGE_SIZE) {
            return Err(ConfigError::Invalid(
                "record_offset leaves no room for the credential record",
            ));
        }
        Ok(())
    }

    /// Apply overrides from `lookup`, then validate.
    ///
    /// `lookup` receives full key names such as `WIFI_MANAGER_MAX_RETRIES`
    /// and returns `None` for keys that are not set.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        override_parsed(&mut self.connect_wait_ms, "CONNECT_WAIT_MS", &get)?;
        override_parsed(&mut self.min_retry_wait_ms, "MIN_RETRY_WAIT_MS", &get)?;
        override_parsed(&mut self.monitor_interval_ms, "MONITOR_INTERVAL_MS", &get)?;
        override_parsed(&mut self.max_retries, "MAX_RETRIES", &get)?;
        override_parsed(&mut self.max_sync_wait_ms, "MAX_SYNC_WAIT_MS", &get)?;
        override_parsed(&mut self.sync_poll_ms, "SYNC_POLL_MS", &get)?;
        override_parsed(&mut self.sync_threshold_secs, "SYNC_THRESHOLD_SECS", &get)?;
        override_parsed(&mut self.reset_countdown_secs, "RESET_COUNTDOWN_SECS", &get)?;
        override_parsed(
            &mut self.restart_after_provisioning,
            "RESTART_AFTER_PROVISIONING",
            &get,
        )?;
        override_parsed(&mut self.record_offset, "RECORD_OFFSET", &get)?;

        if let Some(servers) = get("NTP_SERVERS") {
            self.ntp_servers = servers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        self.validate()?;
        Ok(self)
    }
}

fn override_parsed<T, G>(field: &mut T, name: &'static str, get: &G) -> Result<(), ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(name) {
        *field = raw.trim().parse().map_err(|_| ConfigError::Parse {
            key: name,
            value: raw.clone(),
        })?;
    }
    Ok(())
}

/// Errors that can occur while building a [`ManagerConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value is out of range.
    Invalid(&'static str),
    /// An override could not be parsed.
    Parse { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "invalid manager config: {}", msg),
            Self::Parse { key, value } => {
                write!(f, "cannot parse {}{}={:?}", ENV_PREFIX, key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ManagerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.min_retry_wait_ms, 15_000);
        assert_eq!(config.ntp_servers, vec!["pool.ntp.org".to_string()]);
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = ManagerConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_retry_interval_rejected() {
        let config = ManagerConfig {
            min_retry_wait_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_record_offset_bounds() {
        let last = ManagerConfig {
            record_offset: STORAGE_SIZE - RECORD_LEN,
            ..Default::default()
        };
        assert!(last.validate().is_ok());

        let past_end = ManagerConfig {
            record_offset: STORAGE_SIZE - RECORD_LEN + 1,
            ..Default::default()
        };
        assert!(past_end.validate().is_err());
    }

    #[test]
    fn test_overflowing_record_offset_rejected() {
        let max = usize::MAX.to_string();
        let result = ManagerConfig::default()
            .with_overrides(lookup_from(&[("WIFI_MANAGER_RECORD_OFFSET", max.as_str())]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_sync_deadline_must_exceed_poll() {
        let config = ManagerConfig {
            max_sync_wait_ms: 10,
            sync_poll_ms: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ntp_server_count_bounds() {
        let none = ManagerConfig {
            ntp_servers: vec![],
            ..Default::default()
        };
        assert!(none.validate().is_err());

        let three = ManagerConfig {
            ntp_servers: vec!["a".into(), "b".into(), "c".into()],
            ..Default::default()
        };
        assert!(three.validate().is_err());
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let config = ManagerConfig::default()
            .with_overrides(|_| None)
            .unwrap();
        assert_eq!(config, ManagerConfig::default());
    }

    #[test]
    fn test_overrides_applied() {
        let config = ManagerConfig::default()
            .with_overrides(lookup_from(&[
                ("WIFI_MANAGER_MAX_RETRIES", "3"),
                ("WIFI_MANAGER_MIN_RETRY_WAIT_MS", " 500 "),
                ("WIFI_MANAGER_NTP_SERVERS", "time.a.example, time.b.example"),
                ("WIFI_MANAGER_RESTART_AFTER_PROVISIONING", "true"),
            ]))
            .unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.min_retry_wait_ms, 500);
        assert_eq!(config.ntp_servers, vec!["time.a.example", "time.b.example"]);
        assert!(config.restart_after_provisioning);
    }

    #[test]
    fn test_unparsable_override() {
        let result = ManagerConfig::default()
            .with_overrides(lookup_from(&[("WIFI_MANAGER_MAX_RETRIES", "lots")]));
        assert_eq!(
            result,
            Err(ConfigError::Parse {
                key: "MAX_RETRIES",
                value: "lots".to_string()
            })
        );
    }

    #[test]
    fn test_override_validated() {
        let result = ManagerConfig::default()
            .with_overrides(lookup_from(&[("WIFI_MANAGER_NTP_SERVERS", " , ")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
