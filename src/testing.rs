//! Scripted collaborators for driving the controller off-device.
//!
//! Every double records what was asked of it so tests can assert on call
//! counts and arguments. Only built for unit tests or with the `testing`
//! feature, so none of it ends up in firmware builds.
//!
//! ```
//! use wifi_manager_esp32::network::{Clock, LinkDriver, LinkStatus};
//! use wifi_manager_esp32::testing::{ManualClock, ScriptedLink};
//!
//! let clock = ManualClock::new();
//! let handle = clock.clone();
//! handle.advance(250);
//! assert_eq!(clock.now_ms(), 250);
//!
//! let mut link = ScriptedLink::new();
//! link.set_connected(true);
//! assert_eq!(link.status(), LinkStatus::Connected);
//! ```

use crate::config::AccessPoint;
use crate::network::{Clock, LinkDriver, LinkError, LinkStatus, TimeSync};
use crate::reset::Restart;
use std::cell::Cell;
use std::net::{IpAddr, Ipv4Addr};
use std::rc::Rc;
use std::time::Duration;

/// Panic message raised by [`ScriptedRestart::restart`].
pub const RESTART_PANIC: &str = "scripted device restart";

/// Link driver whose connection state is set by the test.
#[derive(Debug, Default)]
pub struct ScriptedLink {
    hostname: Option<String>,
    candidates: Vec<(String, String)>,
    /// `Some(ssid)` for an explicit begin, `None` for a candidate begin.
    begins: Vec<Option<String>>,
    active: Option<String>,
    connected: bool,
    fail_begin: bool,
    status_queries: usize,
    disconnects: usize,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set what `status` reports from now on.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Make every `begin` fail with [`LinkError::NoCandidates`].
    pub fn set_fail_begin(&mut self, fail: bool) {
        self.fail_begin = fail;
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn candidates(&self) -> &[(String, String)] {
        &self.candidates
    }

    pub fn begins(&self) -> &[Option<String>] {
        &self.begins
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects
    }
}

impl LinkDriver for ScriptedLink {
    fn set_hostname(&mut self, hostname: &str) -> Result<(), LinkError> {
        self.hostname = Some(hostname.to_string());
        Ok(())
    }

    fn register_candidate(&mut self, ssid: &str, psk: &str) {
        self.candidates.push((ssid.to_string(), psk.to_string()));
    }

    fn clear_candidates(&mut self) {
        self.candidates.clear();
    }

    fn begin(&mut self, target: Option<&AccessPoint>) -> Result<(), LinkError> {
        self.begins.push(target.map(|ap| ap.ssid().to_string()));
        if self.fail_begin {
            return Err(LinkError::NoCandidates);
        }
        self.active = match target {
            Some(ap) => Some(ap.ssid().to_string()),
            None => self.candidates.first().map(|(ssid, _)| ssid.clone()),
        };
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        self.status_queries += 1;
        if self.connected {
            LinkStatus::Connected
        } else if self.active.is_some() {
            LinkStatus::Connecting
        } else {
            LinkStatus::Idle
        }
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        self.disconnects += 1;
        self.active = None;
        Ok(())
    }

    fn current_ssid(&self) -> Option<String> {
        self.active.clone()
    }

    fn local_addr(&self) -> Option<IpAddr> {
        self.connected
            .then_some(IpAddr::V4(Ipv4Addr::new(192, 168, 4, 20)))
    }

    fn rssi(&self) -> Option<i32> {
        self.connected.then_some(-58)
    }
}

/// Time source with a settable wall clock.
#[derive(Debug, Default)]
pub struct ScriptedTimeSync {
    unix_time: u64,
    begins: Vec<Vec<String>>,
}

impl ScriptedTimeSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unix_time(&mut self, secs: u64) {
        self.unix_time = secs;
    }

    /// Server lists passed to each `begin`.
    pub fn begins(&self) -> &[Vec<String>] {
        &self.begins
    }
}

impl TimeSync for ScriptedTimeSync {
    fn begin(&mut self, servers: &[String]) -> Result<(), LinkError> {
        self.begins.push(servers.to_vec());
        Ok(())
    }

    fn unix_time(&self) -> u64 {
        self.unix_time
    }
}

/// Manually advanced clock. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.set(now_ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }
}

/// Restart double. Records delays and panics instead of restarting.
///
/// Catch the panic with `std::panic::catch_unwind` or mark the test
/// `#[should_panic(expected = "device restart")]`.
#[derive(Debug, Default)]
pub struct ScriptedRestart {
    delays: Vec<Duration>,
    restarts: usize,
}

impl ScriptedRestart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }
}

impl Restart for ScriptedRestart {
    fn delay(&mut self, duration: Duration) {
        self.delays.push(duration);
    }

    fn restart(&mut self) -> ! {
        self.restarts += 1;
        panic!("{}", RESTART_PANIC);
    }
}
