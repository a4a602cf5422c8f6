//! Link-layer, time-sync and clock abstractions.
//!
//! The connection controller only talks to the outside world through the
//! traits in this module, so the same state machine runs on:
//! - **ESP32** (`esp32` feature): [`EspLink`] over `EspWifi`, [`EspTimeSync`] over SNTP
//! - **Host**: [`HostLink`] (the OS owns networking) and [`SystemTimeSync`]
//! - **Tests**: scripted doubles from [`crate::testing`]
//!
//! # Example
//!
//! ```
//! use wifi_manager_esp32::network::{HostLink, LinkDriver, LinkStatus};
//!
//! let mut link = HostLink::new();
//! link.register_candidate("HomeNet", "secret");
//! link.begin(None).unwrap();
//! assert_eq!(link.status(), LinkStatus::Connected);
//! ```

use crate::config::AccessPoint;
use std::net::IpAddr;
use std::time::Instant;

mod host;

#[cfg(feature = "esp32")]
mod sntp;
#[cfg(feature = "esp32")]
mod wifi;

pub use host::{HostLink, SystemTimeSync};

#[cfg(feature = "esp32")]
pub use sntp::EspTimeSync;
#[cfg(feature = "esp32")]
pub use wifi::EspLink;

/// Link state as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// No connection has been requested.
    Idle,
    /// Association or address assignment is in progress.
    Connecting,
    /// Associated and holding an address.
    Connected,
    /// A previously requested connection is down.
    Disconnected,
    /// The driver could not report a state.
    Failed,
}

impl LinkStatus {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// Radio / link-layer driver.
///
/// `begin` and `disconnect` only start the operation; the outcome is
/// observed later through [`LinkDriver::status`].
pub trait LinkDriver {
    /// Set the hostname announced on the network.
    fn set_hostname(&mut self, hostname: &str) -> Result<(), LinkError>;

    /// Remember an SSID/PSK pair as a connection candidate.
    fn register_candidate(&mut self, ssid: &str, psk: &str);

    /// Forget all registered candidates.
    fn clear_candidates(&mut self);

    /// Start connecting.
    ///
    /// With `Some`, joins that access point. With `None`, picks from the
    /// registered candidates.
    fn begin(&mut self, target: Option<&AccessPoint>) -> Result<(), LinkError>;

    /// Current link state.
    fn status(&mut self) -> LinkStatus;

    /// Tear the link down.
    fn disconnect(&mut self) -> Result<(), LinkError>;

    /// SSID of the network currently joined or being joined.
    fn current_ssid(&self) -> Option<String>;

    /// Local address, if one is assigned.
    fn local_addr(&self) -> Option<IpAddr>;

    /// Signal strength of the current access point in dBm.
    fn rssi(&self) -> Option<i32>;
}

/// Network time client.
pub trait TimeSync {
    /// Start synchronizing against `servers`, primary first.
    fn begin(&mut self, servers: &[String]) -> Result<(), LinkError>;

    /// Current wall-clock time in seconds since the Unix epoch.
    ///
    /// Before synchronization this is typically a small value close to zero.
    fn unix_time(&self) -> u64;
}

/// Monotonic millisecond clock.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;
}

/// [`Clock`] backed by [`std::time::Instant`].
///
/// Works on the host and on ESP-IDF, where `Instant` reads the system timer.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Link-layer errors.
#[derive(Debug)]
pub enum LinkError {
    /// `begin(None)` was called with no registered candidates.
    NoCandidates,
    /// SSID is not accepted by the driver (too long or contains invalid characters).
    InvalidSsid,
    /// Password is not accepted by the driver.
    InvalidPassword,
    /// ESP-IDF error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCandidates => write!(f, "no candidate networks registered"),
            Self::InvalidSsid => write!(f, "invalid SSID"),
            Self::InvalidPassword => write!(f, "invalid password"),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for LinkError {}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for LinkError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}
