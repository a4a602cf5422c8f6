//! WiFi connection controller.
//!
//! [`WifiManager`] owns the credential store and the platform collaborators
//! and drives the [`Session`] state machine. It is single-threaded and
//! tick-driven: call [`WifiManager::tick`] from the main loop as often as
//! convenient. Only a forced reset blocks.
//!
//! # Example
//!
//! ```no_run
//! use wifi_manager_esp32::config::{Credentials, ManagerConfig};
//! use wifi_manager_esp32::manager::WifiManager;
//! use wifi_manager_esp32::network::{HostLink, MonotonicClock, SystemTimeSync};
//! use wifi_manager_esp32::provision::EntryError;
//! use wifi_manager_esp32::reset::HostRestart;
//! use wifi_manager_esp32::storage::MemoryBlobStore;
//!
//! let mut manager = WifiManager::new(
//!     ManagerConfig::default(),
//!     MemoryBlobStore::new(),
//!     HostLink::new(),
//!     SystemTimeSync,
//!     MonotonicClock::new(),
//!     HostRestart::default(),
//! );
//!
//! let mut entry = || -> Result<Credentials, EntryError> {
//!     let mut creds = Credentials::new("doc-node");
//!     creds.add_access_point("HomeNet", "secret")?;
//!     Ok(creds)
//! };
//! manager.initialize(&mut entry).unwrap();
//! loop {
//!     manager.tick();
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! ```

mod state;

pub use state::{Action, LinkState, LinkView, ResetReason, Session, Transition};

use crate::config::{Credentials, ManagerConfig, ServiceConfig};
use crate::network::{Clock, LinkDriver, TimeSync};
use crate::provision::{CredentialEntry, EntryError};
use crate::reset::{self, Restart};
use crate::storage::{register_candidates, BlobStore, CredentialStore, StorageError};
use chrono::DateTime;
use log::{error, info, warn};
use std::fmt;
use std::net::IpAddr;
use zeroize::Zeroize;

/// Answers view queries from the live link driver and time source.
struct DriverView<'a, L, T> {
    link: &'a mut L,
    time: &'a T,
}

impl<L: LinkDriver, T: TimeSync> LinkView for DriverView<'_, L, T> {
    fn link_connected(&mut self) -> bool {
        self.link.status().is_connected()
    }

    fn unix_time(&mut self) -> u64 {
        self.time.unix_time()
    }
}

/// Connection controller.
pub struct WifiManager<B, L, T, C, R>
where
    B: BlobStore,
    L: LinkDriver,
    T: TimeSync,
    C: Clock,
    R: Restart,
{
    config: ManagerConfig,
    store: CredentialStore<B>,
    link: L,
    time: T,
    clock: C,
    restart: R,
    credentials: Credentials,
    session: Session,
}

impl<B, L, T, C, R> WifiManager<B, L, T, C, R>
where
    B: BlobStore,
    L: LinkDriver,
    T: TimeSync,
    C: Clock,
    R: Restart,
{
    /// Create a controller in [`LinkState::Connect`] with empty credentials.
    ///
    /// The credential record is kept at `config.record_offset` of `blob`.
    pub fn new(config: ManagerConfig, blob: B, link: L, time: T, clock: C, restart: R) -> Self {
        let store = CredentialStore::new(blob, config.record_offset);
        Self {
            config,
            store,
            link,
            time,
            clock,
            restart,
            credentials: Credentials::default(),
            session: Session::new(),
        }
    }

    /// Open storage and load the stored credentials.
    ///
    /// If no valid record is stored, new credentials are collected from
    /// `entry`, saved, and registered with the link driver. With
    /// `restart_after_provisioning` set, the device then restarts and this
    /// call does not return.
    pub fn initialize<E: CredentialEntry>(&mut self, entry: &mut E) -> Result<(), ManagerError> {
        self.store.open()?;

        if let Some(creds) = self.store.load(&mut self.link) {
            self.credentials = creds;
            return Ok(());
        }

        warn!("{} WiFi credentials not found", self.clock.now_ms());
        self.provision(entry)
    }

    /// Replace the stored credentials with new ones from `entry`.
    ///
    /// Candidates from the previous record are dropped. A running session
    /// is torn down and starts over in [`LinkState::Connect`].
    pub fn provision<E: CredentialEntry>(&mut self, entry: &mut E) -> Result<(), ManagerError> {
        self.credentials.zeroize();

        let creds = entry.collect()?;
        info!("Writing credentials to storage");
        self.store.save(&creds)?;

        self.link.clear_candidates();
        register_candidates(&creds, &mut self.link);
        self.credentials = creds;

        if self.session != Session::new() {
            let now = self.clock.now_ms();
            info!(
                "{} {} -> {} (new credentials)",
                now,
                self.session.state(),
                LinkState::Connect
            );
            if let Err(e) = self.link.disconnect() {
                warn!("{} Disconnect failed: {}", now, e);
            }
            self.session = Session::new();
        }

        if self.config.restart_after_provisioning {
            self.force_reset(self.config.provisioning_countdown_secs);
        }
        Ok(())
    }

    /// Advance the controller by one step.
    ///
    /// Returns `true` while the link is established and the clock is
    /// synchronized. May not return if a reset is triggered.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now_ms();
        let transition = {
            let mut view = DriverView {
                link: &mut self.link,
                time: &self.time,
            };
            self.session.step(&self.config, now, &mut view)
        };

        if transition.changed() {
            info!("{} {} -> {}", now, transition.from, transition.to);
        }
        if let Some(action) = transition.action {
            self.apply(now, action);
        }

        self.session.is_established()
    }

    fn apply(&mut self, now: u64, action: Action) {
        match action {
            Action::BeginConnection { attempt } => self.begin_connection(now, attempt),
            Action::StartTimeSync => {
                info!(
                    "{} WiFi connected: {} {} {}",
                    now,
                    self.local_addr()
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    self.credentials.hostname(),
                    self.rssi()
                        .map(|dbm| format!("{} dBm", dbm))
                        .unwrap_or_else(|| "- dBm".to_string()),
                );
                if let Err(e) = self.time.begin(&self.config.ntp_servers) {
                    warn!("{} Failed to start time sync: {}", now, e);
                }
            }
            Action::Established { unix_time } => {
                info!("{} Time synchronized: {} UTC", now, format_utc(unix_time));
            }
            Action::Disconnect => {
                warn!("{} WiFi connection lost", now);
                if let Err(e) = self.link.disconnect() {
                    warn!("{} Disconnect failed: {}", now, e);
                }
            }
            Action::Reset(reason) => {
                error!("{} {}", now, reason);
                self.force_reset(self.config.reset_countdown_secs);
            }
        }
    }

    fn begin_connection(&mut self, now: u64, attempt: u32) {
        let target = match self.credentials.access_points() {
            [only] => Some(only),
            _ => None,
        };
        let label = match target {
            Some(ap) => ap.ssid().to_string(),
            None => self.candidate_ssids().join(", "),
        };
        info!(
            "{} Connecting to: {} (attempt {}/{})",
            now, label, attempt, self.config.max_retries
        );

        if let Err(e) = self.link.set_hostname(self.credentials.hostname()) {
            warn!("{} Failed to set hostname: {}", now, e);
        }
        if let Err(e) = self.link.begin(target) {
            warn!("{} Failed to start connection: {}", now, e);
        }
    }

    /// Log a countdown and restart the device.
    pub fn force_reset(&mut self, countdown_secs: u32) -> ! {
        reset::force_reset(&mut self.restart, &self.clock, countdown_secs)
    }

    pub fn hostname(&self) -> &str {
        self.credentials.hostname()
    }

    /// SSID of the network joined, or the first configured one.
    pub fn ssid(&self) -> Option<String> {
        self.link.current_ssid().or_else(|| {
            self.credentials
                .access_points()
                .first()
                .map(|ap| ap.ssid().to_string())
        })
    }

    pub fn candidate_ssids(&self) -> Vec<&str> {
        self.credentials
            .access_points()
            .iter()
            .map(|ap| ap.ssid())
            .collect()
    }

    pub fn service(&self) -> Option<&ServiceConfig> {
        self.credentials.service()
    }

    pub fn local_addr(&self) -> Option<IpAddr> {
        self.link.local_addr()
    }

    /// Signal strength in dBm.
    pub fn rssi(&self) -> Option<i32> {
        self.link.rssi()
    }

    pub fn state(&self) -> LinkState {
        self.session.state()
    }

    pub fn retry_count(&self) -> u32 {
        self.session.retry_count()
    }

    pub fn is_established(&self) -> bool {
        self.session.is_established()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn store(&self) -> &CredentialStore<B> {
        &self.store
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn time_sync(&self) -> &T {
        &self.time
    }

    pub fn time_sync_mut(&mut self) -> &mut T {
        &mut self.time
    }

    pub fn restarter(&self) -> &R {
        &self.restart
    }
}

/// Format Unix seconds as `YYYY-MM-DD HH:MM:SS`.
pub fn format_utc(unix_secs: u64) -> String {
    i64::try_from(unix_secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("{} s", unix_secs))
}

/// Controller errors.
#[derive(Debug)]
pub enum ManagerError {
    /// Opening storage or saving new credentials failed.
    Storage(StorageError),
    /// Credential entry failed.
    Entry(EntryError),
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {}", e),
            Self::Entry(e) => write!(f, "credential entry error: {}", e),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Entry(e) => Some(e),
        }
    }
}

impl From<StorageError> for ManagerError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<EntryError> for ManagerError {
    fn from(e: EntryError) -> Self {
        Self::Entry(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SYNC_THRESHOLD_SECS;
    use crate::storage::MemoryBlobStore;
    use crate::testing::{ManualClock, ScriptedLink, ScriptedRestart, ScriptedTimeSync};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::time::Duration;

    type TestManager =
        WifiManager<MemoryBlobStore, ScriptedLink, ScriptedTimeSync, ManualClock, ScriptedRestart>;

    fn one_network() -> Credentials {
        let mut creds = Credentials::new("greenhouse");
        creds.add_access_point("Garden", "tomato-vine").unwrap();
        creds
    }

    fn two_networks() -> Credentials {
        let mut creds = Credentials::new("greenhouse");
        creds.add_access_point("Garden", "tomato-vine").unwrap();
        creds.add_access_point("Shed", "rake-handle").unwrap();
        creds
    }

    fn manager_with(
        config: ManagerConfig,
        blob: MemoryBlobStore,
    ) -> (TestManager, ManualClock) {
        let clock = ManualClock::new();
        let manager = WifiManager::new(
            config,
            blob,
            ScriptedLink::new(),
            ScriptedTimeSync::new(),
            clock.clone(),
            ScriptedRestart::new(),
        );
        (manager, clock)
    }

    fn provisioned(creds: Credentials) -> (TestManager, ManualClock) {
        let (mut manager, clock) =
            manager_with(ManagerConfig::default(), MemoryBlobStore::with_contents(&creds.to_bytes()));
        let mut entry = || -> Result<Credentials, EntryError> { panic!("entry not expected") };
        manager.initialize(&mut entry).unwrap();
        (manager, clock)
    }

    /// Drive a provisioned manager to MONITOR.
    fn establish(manager: &mut TestManager, clock: &ManualClock) {
        assert!(!manager.tick()); // CONNECT -> CONNECT_WAIT
        clock.advance(3_000);
        assert!(!manager.tick()); // -> CONNECT_CHECK
        manager.link_mut().set_connected(true);
        assert!(!manager.tick()); // -> TIME_SYNC_WAIT
        manager
            .time_sync_mut()
            .set_unix_time(DEFAULT_SYNC_THRESHOLD_SECS + 86_400);
        clock.advance(10);
        assert!(manager.tick()); // -> MONITOR
        assert_eq!(manager.state(), LinkState::Monitor);
    }

    /// One failed attempt: CONNECT through RETRY_WAIT back to CONNECT.
    fn fail_attempt(manager: &mut TestManager, clock: &ManualClock) {
        manager.tick();
        clock.advance(3_000);
        manager.tick();
        manager.tick();
        assert_eq!(manager.state(), LinkState::RetryWait);
        clock.advance(12_000);
        manager.tick();
        assert_eq!(manager.state(), LinkState::Connect);
    }

    // ==================== Initialization Tests ====================

    #[test]
    fn test_fresh_device_runs_entry_and_saves() {
        let (mut manager, _clock) = manager_with(ManagerConfig::default(), MemoryBlobStore::new());
        let mut calls = 0;
        let mut entry = || -> Result<Credentials, EntryError> {
            calls += 1;
            Ok(one_network())
        };
        manager.initialize(&mut entry).unwrap();

        assert_eq!(calls, 1);
        assert_eq!(manager.store().blob().commit_count(), 1);
        assert_eq!(manager.hostname(), "greenhouse");
        assert_eq!(
            manager.link().candidates(),
            &[("Garden".to_string(), "tomato-vine".to_string())]
        );
        assert_eq!(manager.store().blob().committed()[..4], [0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_stored_record_skips_entry() {
        let (manager, _clock) = provisioned(two_networks());
        assert_eq!(manager.credentials(), &two_networks());
        assert_eq!(manager.candidate_ssids(), vec!["Garden", "Shed"]);
        assert_eq!(manager.link().candidates().len(), 2);
        assert_eq!(manager.store().blob().commit_count(), 0);
    }

    #[test]
    fn test_corrupt_record_triggers_entry() {
        let mut bytes = one_network().to_bytes();
        bytes[0] ^= 0xFF;
        let (mut manager, _clock) =
            manager_with(ManagerConfig::default(), MemoryBlobStore::with_contents(&bytes));

        let mut calls = 0;
        let mut entry = || -> Result<Credentials, EntryError> {
            calls += 1;
            Ok(two_networks())
        };
        manager.initialize(&mut entry).unwrap();
        assert_eq!(calls, 1);
        assert_eq!(manager.credentials(), &two_networks());
    }

    #[test]
    fn test_save_failure_propagates() {
        let mut blob = MemoryBlobStore::new();
        blob.fail_next_commit();
        let (mut manager, _clock) = manager_with(ManagerConfig::default(), blob);

        let mut entry = || -> Result<Credentials, EntryError> { Ok(one_network()) };
        let result = manager.initialize(&mut entry);
        assert!(matches!(result, Err(ManagerError::Storage(_))));
        assert!(manager.link().candidates().is_empty());
        assert_eq!(manager.credentials(), &Credentials::default());
    }

    #[test]
    fn test_entry_failure_propagates() {
        let (mut manager, _clock) = manager_with(ManagerConfig::default(), MemoryBlobStore::new());
        let mut entry = || -> Result<Credentials, EntryError> { Err(EntryError::Closed) };
        let result = manager.initialize(&mut entry);
        assert!(matches!(result, Err(ManagerError::Entry(EntryError::Closed))));
        assert_eq!(manager.store().blob().commit_count(), 0);
    }

    #[test]
    fn test_restart_after_provisioning() {
        let config = ManagerConfig {
            restart_after_provisioning: true,
            ..Default::default()
        };
        let (mut manager, _clock) = manager_with(config, MemoryBlobStore::new());

        let mut entry = || -> Result<Credentials, EntryError> { Ok(one_network()) };
        let result = catch_unwind(AssertUnwindSafe(|| manager.initialize(&mut entry)));
        assert!(result.is_err());
        assert_eq!(manager.restarter().restarts(), 1);
        assert_eq!(manager.restarter().delays(), &[Duration::from_secs(1); 3]);
        assert_eq!(manager.store().blob().commit_count(), 1);
    }

    #[test]
    fn test_provision_replaces_credentials() {
        let (mut manager, _clock) = provisioned(one_network());
        let mut entry = || -> Result<Credentials, EntryError> { Ok(two_networks()) };
        manager.provision(&mut entry).unwrap();

        assert_eq!(manager.credentials(), &two_networks());
        let mut link = ScriptedLink::new();
        let mut reopened = CredentialStore::new(
            MemoryBlobStore::with_contents(manager.store().blob().committed()),
            0,
        );
        reopened.open().unwrap();
        assert_eq!(reopened.load(&mut link), Some(two_networks()));
    }

    #[test]
    fn test_provision_drops_previous_candidates() {
        let mut old = Credentials::new("greenhouse");
        old.add_access_point("OldNet", "old-psk").unwrap();
        let (mut manager, _clock) = provisioned(old);

        let mut entry = || -> Result<Credentials, EntryError> {
            let mut creds = Credentials::new("greenhouse");
            creds.add_access_point("NewA", "a").unwrap();
            creds.add_access_point("NewB", "b").unwrap();
            Ok(creds)
        };
        manager.provision(&mut entry).unwrap();

        assert_eq!(
            manager.link().candidates(),
            &[
                ("NewA".to_string(), "a".to_string()),
                ("NewB".to_string(), "b".to_string()),
            ]
        );
        assert_eq!(manager.candidate_ssids(), vec!["NewA", "NewB"]);
    }

    #[test]
    fn test_provision_restarts_active_session() {
        let (mut manager, clock) = provisioned(one_network());
        establish(&mut manager, &clock);

        let mut entry = || -> Result<Credentials, EntryError> { Ok(two_networks()) };
        manager.provision(&mut entry).unwrap();

        assert_eq!(manager.state(), LinkState::Connect);
        assert_eq!(manager.retry_count(), 0);
        assert_eq!(manager.link().disconnects(), 1);
        assert!(!manager.is_established());

        manager.link_mut().set_connected(false);
        assert!(!manager.tick());
        assert_eq!(manager.state(), LinkState::ConnectWait);
        assert_eq!(manager.link().begins(), &[Some("Garden".to_string()), None]);
    }

    #[test]
    fn test_provision_before_first_tick_keeps_session() {
        let (mut manager, _clock) = provisioned(one_network());
        let mut entry = || -> Result<Credentials, EntryError> { Ok(two_networks()) };
        manager.provision(&mut entry).unwrap();

        assert_eq!(manager.state(), LinkState::Connect);
        assert_eq!(manager.link().disconnects(), 0);
    }

    // ==================== Connection Lifecycle Tests ====================

    #[test]
    fn test_fresh_device_end_to_end() {
        let (mut manager, clock) = manager_with(ManagerConfig::default(), MemoryBlobStore::new());
        let mut calls = 0;
        let mut entry = || -> Result<Credentials, EntryError> {
            calls += 1;
            Ok(one_network())
        };
        manager.initialize(&mut entry).unwrap();
        assert_eq!(calls, 1);
        assert_eq!(manager.store().blob().commit_count(), 1);
        assert_eq!(manager.state(), LinkState::Connect);

        assert!(!manager.tick());
        assert_eq!(manager.state(), LinkState::ConnectWait);
        assert_eq!(manager.link().begins(), &[Some("Garden".to_string())]);

        clock.advance(2_999);
        assert!(!manager.tick());
        assert_eq!(manager.state(), LinkState::ConnectWait);

        clock.advance(1);
        assert!(!manager.tick());
        assert_eq!(manager.state(), LinkState::ConnectCheck);

        manager.link_mut().set_connected(true);
        assert!(!manager.tick());
        assert_eq!(manager.state(), LinkState::TimeSyncWait);
        assert_eq!(manager.retry_count(), 0);

        clock.advance(10);
        assert!(!manager.tick());
        assert_eq!(manager.state(), LinkState::TimeSyncWait);

        manager
            .time_sync_mut()
            .set_unix_time(DEFAULT_SYNC_THRESHOLD_SECS + 1);
        clock.advance(10);
        assert!(manager.tick());
        assert_eq!(manager.state(), LinkState::Monitor);

        clock.advance(10);
        assert!(manager.tick());
        assert_eq!(manager.store().blob().commit_count(), 1);
        assert_eq!(manager.restarter().restarts(), 0);
    }

    #[test]
    fn test_reaches_monitor() {
        let (mut manager, clock) = provisioned(one_network());
        establish(&mut manager, &clock);

        assert!(manager.is_established());
        assert_eq!(manager.retry_count(), 0);
        assert_eq!(manager.time_sync().begins(), &[vec!["pool.ntp.org".to_string()]]);
        assert!(manager.local_addr().is_some());
        assert_eq!(manager.rssi(), Some(-58));
        assert!(manager.tick());
    }

    #[test]
    fn test_hostname_set_before_begin() {
        let (mut manager, _clock) = provisioned(one_network());
        manager.tick();
        assert_eq!(manager.link().hostname(), Some("greenhouse"));
        assert_eq!(manager.link().begins().len(), 1);
    }

    #[test]
    fn test_single_network_begins_explicitly() {
        let (mut manager, _clock) = provisioned(one_network());
        manager.tick();
        assert_eq!(manager.link().begins(), &[Some("Garden".to_string())]);
        assert_eq!(manager.ssid().as_deref(), Some("Garden"));
    }

    #[test]
    fn test_multiple_networks_begin_from_candidates() {
        let (mut manager, _clock) = provisioned(two_networks());
        manager.tick();
        assert_eq!(manager.link().begins(), &[None]);
    }

    #[test]
    fn test_begin_failure_counts_as_attempt() {
        let (mut manager, clock) = provisioned(one_network());
        manager.link_mut().set_fail_begin(true);
        fail_attempt(&mut manager, &clock);
        assert_eq!(manager.retry_count(), 1);

        manager.link_mut().set_fail_begin(false);
        establish(&mut manager, &clock);
        assert_eq!(manager.link().begins().len(), 2);
    }

    #[test]
    fn test_not_established_until_time_synced() {
        let (mut manager, clock) = provisioned(one_network());
        manager.tick();
        clock.advance(3_000);
        manager.tick();
        manager.link_mut().set_connected(true);
        manager.tick();
        assert_eq!(manager.state(), LinkState::TimeSyncWait);

        for _ in 0..100 {
            clock.advance(10);
            assert!(!manager.tick());
        }
        assert_eq!(manager.state(), LinkState::TimeSyncWait);
    }

    #[test]
    fn test_monitor_polls_at_interval() {
        let (mut manager, clock) = provisioned(one_network());
        establish(&mut manager, &clock);
        let queries = manager.link().status_queries();

        for _ in 0..99 {
            clock.advance(10);
            assert!(manager.tick());
        }
        assert_eq!(manager.link().status_queries(), queries);

        clock.advance(10);
        manager.tick();
        assert_eq!(manager.link().status_queries(), queries + 1);
    }

    #[test]
    fn test_link_loss_disconnects_once() {
        let (mut manager, clock) = provisioned(one_network());
        establish(&mut manager, &clock);

        manager.link_mut().set_connected(false);
        clock.advance(1_000);
        assert!(!manager.tick());
        assert_eq!(manager.state(), LinkState::RetryWait);
        assert_eq!(manager.link().disconnects(), 1);

        for _ in 0..10 {
            clock.advance(1_000);
            manager.tick();
        }
        assert_eq!(manager.link().disconnects(), 1);
        assert!(!manager.is_established());
    }

    #[test]
    fn test_reconnects_after_link_loss() {
        let (mut manager, clock) = provisioned(one_network());
        establish(&mut manager, &clock);

        manager.link_mut().set_connected(false);
        clock.advance(1_000);
        manager.tick();
        clock.advance(15_000);
        manager.tick();
        assert_eq!(manager.state(), LinkState::Connect);

        establish(&mut manager, &clock);
        assert_eq!(manager.link().begins().len(), 2);
    }

    // ==================== Reset Tests ====================

    #[test]
    fn test_reset_after_retries_exhausted() {
        let (mut manager, clock) = provisioned(one_network());
        for _ in 0..10 {
            fail_attempt(&mut manager, &clock);
        }
        assert_eq!(manager.retry_count(), 10);
        assert_eq!(manager.link().begins().len(), 10);
        assert_eq!(manager.restarter().restarts(), 0);

        let result = catch_unwind(AssertUnwindSafe(|| manager.tick()));
        assert!(result.is_err());
        assert_eq!(manager.restarter().restarts(), 1);
        assert_eq!(manager.restarter().delays(), &[Duration::from_secs(1); 10]);
        assert_eq!(manager.link().begins().len(), 10);
    }

    #[test]
    fn test_success_clears_retry_count() {
        let (mut manager, clock) = provisioned(one_network());
        for _ in 0..9 {
            fail_attempt(&mut manager, &clock);
        }
        establish(&mut manager, &clock);
        assert_eq!(manager.retry_count(), 0);
        assert_eq!(manager.restarter().restarts(), 0);
    }

    #[test]
    fn test_reset_on_time_sync_timeout() {
        let (mut manager, clock) = provisioned(one_network());
        manager.tick();
        clock.advance(3_000);
        manager.tick();
        manager.link_mut().set_connected(true);
        manager.tick();

        clock.advance(59_999);
        manager.tick();
        assert_eq!(manager.restarter().restarts(), 0);

        clock.advance(1);
        let result = catch_unwind(AssertUnwindSafe(|| manager.tick()));
        assert!(result.is_err());
        assert_eq!(manager.restarter().restarts(), 1);
    }

    #[test]
    #[should_panic(expected = "device restart")]
    fn test_manual_force_reset() {
        let (mut manager, _clock) = provisioned(one_network());
        manager.force_reset(0);
    }

    // ==================== Time Formatting Tests ====================

    #[test]
    fn test_format_utc() {
        assert_eq!(format_utc(0), "1970-01-01 00:00:00");
        assert_eq!(format_utc(DEFAULT_SYNC_THRESHOLD_SECS), "2024-01-01 00:00:00");
        assert_eq!(format_utc(951_782_400 + 3_723), "2000-02-29 01:02:03");
        assert_eq!(format_utc(1_767_225_599), "2025-12-31 23:59:59");
    }
}
