//! Persisted credentials and controller configuration.
//!
//! # Components
//!
//! - `credentials` - credential record and its fixed-width layout (host-testable)
//! - `manager` - timing and behavior settings for the connection controller

mod credentials;
mod manager;

pub use credentials::{
    truncate_to_capacity, AccessPoint, CredentialError, Credentials, ServiceConfig,
    API_KEY_CAPACITY, BROKER_HOST_CAPACITY, HOSTNAME_CAPACITY, MAX_ACCESS_POINTS, PSK_CAPACITY,
    RECORD_LEN, SIGNATURE, SSID_CAPACITY, TOPIC_CAPACITY,
};
pub use manager::{
    ConfigError, ManagerConfig, DEFAULT_SYNC_THRESHOLD_SECS, ENV_PREFIX, MAX_NTP_SERVERS,
};
