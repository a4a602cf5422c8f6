//! Host link and time providers.
//!
//! On host systems the OS handles networking and clock discipline. These
//! providers are thin wrappers that let the controller run its full
//! lifecycle on a development machine.

use super::{LinkDriver, LinkError, LinkStatus, TimeSync};
use crate::config::AccessPoint;
use log::info;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Host link driver.
///
/// Association is simulated: `begin` records the requested network and the
/// link reports connected until `disconnect` is called.
#[derive(Debug, Default)]
pub struct HostLink {
    hostname: String,
    candidates: Vec<String>,
    active: Option<String>,
    ip_addr: Option<IpAddr>,
}

impl HostLink {
    /// Create a new host link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hostname last set by the controller.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Get the primary local IP address.
    ///
    /// Creates a UDP socket and "connects" it to a public address (nothing is
    /// sent), then reads back which local address the OS picked.
    fn detect_local_ip() -> Option<IpAddr> {
        use std::net::UdpSocket;

        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        let local_addr = socket.local_addr().ok()?;
        Some(local_addr.ip())
    }
}

impl LinkDriver for HostLink {
    fn set_hostname(&mut self, hostname: &str) -> Result<(), LinkError> {
        self.hostname = hostname.to_string();
        Ok(())
    }

    fn register_candidate(&mut self, ssid: &str, _psk: &str) {
        self.candidates.push(ssid.to_string());
    }

    fn clear_candidates(&mut self) {
        self.candidates.clear();
    }

    fn begin(&mut self, target: Option<&AccessPoint>) -> Result<(), LinkError> {
        let ssid = match target {
            Some(ap) => ap.ssid().to_string(),
            None => self
                .candidates
                .first()
                .cloned()
                .ok_or(LinkError::NoCandidates)?,
        };

        self.ip_addr = Self::detect_local_ip();
        match self.ip_addr {
            Some(ip) => info!("Host link up as '{}' via {}, local IP: {}", self.hostname, ssid, ip),
            None => info!("Host link up as '{}' via {}, no routable IP", self.hostname, ssid),
        }
        self.active = Some(ssid);
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        if self.active.is_some() {
            LinkStatus::Connected
        } else {
            LinkStatus::Idle
        }
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        self.active = None;
        self.ip_addr = None;
        Ok(())
    }

    fn current_ssid(&self) -> Option<String> {
        self.active.clone()
    }

    fn local_addr(&self) -> Option<IpAddr> {
        self.ip_addr
    }

    fn rssi(&self) -> Option<i32> {
        None
    }
}

/// Host time provider.
///
/// The host clock is already disciplined by the OS, so `begin` only logs.
#[derive(Debug, Default)]
pub struct SystemTimeSync;

impl TimeSync for SystemTimeSync {
    fn begin(&mut self, servers: &[String]) -> Result<(), LinkError> {
        info!("Using system clock (servers {:?} not contacted)", servers);
        Ok(())
    }

    fn unix_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SYNC_THRESHOLD_SECS;

    #[test]
    fn test_host_link_idle_until_begin() {
        let mut link = HostLink::new();
        assert_eq!(link.status(), LinkStatus::Idle);
        assert!(link.current_ssid().is_none());
    }

    #[test]
    fn test_host_link_explicit_target() {
        let mut link = HostLink::new();
        link.begin(Some(&AccessPoint::new("Lab", "pw"))).unwrap();
        assert_eq!(link.status(), LinkStatus::Connected);
        assert_eq!(link.current_ssid().as_deref(), Some("Lab"));
    }

    #[test]
    fn test_host_link_candidate_list() {
        let mut link = HostLink::new();
        assert!(matches!(link.begin(None), Err(LinkError::NoCandidates)));

        link.register_candidate("First", "pw");
        link.register_candidate("Second", "pw");
        link.begin(None).unwrap();
        assert_eq!(link.current_ssid().as_deref(), Some("First"));

        link.clear_candidates();
        link.disconnect().unwrap();
        assert!(matches!(link.begin(None), Err(LinkError::NoCandidates)));
    }

    #[test]
    fn test_host_link_disconnect() {
        let mut link = HostLink::new();
        link.set_hostname("dev-box").unwrap();
        link.begin(Some(&AccessPoint::new("Lab", ""))).unwrap();
        link.disconnect().unwrap();
        assert_eq!(link.status(), LinkStatus::Idle);
        assert!(link.local_addr().is_none());
        assert_eq!(link.hostname(), "dev-box");
    }

    #[test]
    fn test_system_time_is_plausible() {
        let mut time = SystemTimeSync;
        time.begin(&["pool.ntp.org".to_string()]).unwrap();
        assert!(time.unix_time() >= DEFAULT_SYNC_THRESHOLD_SECS);
    }
}
