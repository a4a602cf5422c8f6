//! Connection lifecycle state machine.
//!
//! [`Session::step`] evaluates the current state once and performs at most
//! one transition. It never touches hardware: link status and wall-clock
//! time are read through a [`LinkView`], and side effects are returned as an
//! [`Action`] for the caller to carry out. Time is injected as a monotonic
//! millisecond reading, so the machine can be driven deterministically.
//!
//! ```text
//!            ┌──────────────────────── retries > max ──▶ reset
//!            ▼
//!   ┌──▶ Connect ──▶ ConnectWait ──▶ ConnectCheck ──connected──▶ TimeSyncWait ──synced──▶ Monitor
//!   │                                  │                              │                    │
//!   │                              not connected                  deadline ──▶ reset       │
//!   │                                  ▼                                                   │
//!   └──────────────────────────── RetryWait ◀──────────────── link lost ───────────────────┘
//! ```

use crate::config::ManagerConfig;
use std::fmt;

/// Controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Start a connection attempt.
    Connect,
    /// Give the driver time to associate.
    ConnectWait,
    /// Decide whether the attempt succeeded.
    ConnectCheck,
    /// Enforce the minimum interval between attempts.
    RetryWait,
    /// Wait for the clock to be synchronized.
    TimeSyncWait,
    /// Connected and synchronized; poll link health.
    Monitor,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "CONNECT",
            Self::ConnectWait => "CONNECT_WAIT",
            Self::ConnectCheck => "CONNECT_CHECK",
            Self::RetryWait => "RETRY_WAIT",
            Self::TimeSyncWait => "TIME_SYNC_WAIT",
            Self::Monitor => "MONITOR",
        };
        f.write_str(name)
    }
}

/// Why the device has to be reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Connection attempts exceeded the configured maximum.
    RetriesExhausted { attempts: u32 },
    /// The clock did not synchronize before the deadline.
    TimeSyncTimeout { waited_ms: u64 },
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetriesExhausted { attempts } => {
                write!(f, "too many retries ({} attempts)", attempts)
            }
            Self::TimeSyncTimeout { waited_ms } => {
                write!(f, "time sync timeout after {} ms", waited_ms)
            }
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the requested action has to be carried out"]
pub enum Action {
    /// Set the hostname and start a connection attempt.
    BeginConnection { attempt: u32 },
    /// The link is up; start time synchronization.
    StartTimeSync,
    /// The clock reads a plausible time; the link is fully established.
    Established { unix_time: u64 },
    /// The link was lost; tear it down.
    Disconnect,
    /// Unrecoverable in place; reset the device.
    Reset(ResetReason),
}

/// Read-only view of the outside world used while stepping.
///
/// Each method is called only when the current state needs the answer, so
/// implementations can count queries.
pub trait LinkView {
    /// Whether the link is currently connected.
    fn link_connected(&mut self) -> bool;

    /// Wall-clock time in seconds since the Unix epoch.
    fn unix_time(&mut self) -> u64;
}

/// Outcome of one [`Session::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LinkState,
    pub to: LinkState,
    pub action: Option<Action>,
}

impl Transition {
    /// True if the state changed.
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// State of one connect / maintain cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    state: LinkState,
    retry_count: u32,
    /// Start of the most recent connection attempt or link loss.
    last_attempt_ms: u64,
    /// Start of the current wait (association, sync poll or monitor poll).
    wait_start_ms: u64,
    sync_start_ms: u64,
    established: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a session in [`LinkState::Connect`].
    pub fn new() -> Self {
        Self {
            state: LinkState::Connect,
            retry_count: 0,
            last_attempt_ms: 0,
            wait_start_ms: 0,
            sync_start_ms: 0,
            established: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Connection attempts since the last successful one.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// True when the link is up and the clock is synchronized.
    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Evaluate the current state at time `now_ms`.
    pub fn step<P: LinkView>(
        &mut self,
        config: &ManagerConfig,
        now_ms: u64,
        view: &mut P,
    ) -> Transition {
        let from = self.state;
        let action = match self.state {
            LinkState::Connect => self.on_connect(config, now_ms),
            LinkState::ConnectWait => {
                if elapsed(now_ms, self.wait_start_ms) >= config.connect_wait_ms {
                    self.state = LinkState::ConnectCheck;
                }
                None
            }
            LinkState::ConnectCheck => {
                if view.link_connected() {
                    self.retry_count = 0;
                    self.sync_start_ms = now_ms;
                    self.wait_start_ms = now_ms;
                    self.state = LinkState::TimeSyncWait;
                    Some(Action::StartTimeSync)
                } else {
                    self.state = LinkState::RetryWait;
                    None
                }
            }
            LinkState::RetryWait => {
                if elapsed(now_ms, self.last_attempt_ms) >= config.min_retry_wait_ms {
                    self.state = LinkState::Connect;
                }
                None
            }
            LinkState::TimeSyncWait => self.on_time_sync_wait(config, now_ms, view),
            LinkState::Monitor => self.on_monitor(config, now_ms, view),
        };

        Transition {
            from,
            to: self.state,
            action,
        }
    }

    fn on_connect(&mut self, config: &ManagerConfig, now_ms: u64) -> Option<Action> {
        self.retry_count += 1;
        if self.retry_count > config.max_retries {
            return Some(Action::Reset(ResetReason::RetriesExhausted {
                attempts: self.retry_count,
            }));
        }
        self.last_attempt_ms = now_ms;
        self.wait_start_ms = now_ms;
        self.state = LinkState::ConnectWait;
        Some(Action::BeginConnection {
            attempt: self.retry_count,
        })
    }

    fn on_time_sync_wait<P: LinkView>(
        &mut self,
        config: &ManagerConfig,
        now_ms: u64,
        view: &mut P,
    ) -> Option<Action> {
        let waited_ms = elapsed(now_ms, self.sync_start_ms);
        if waited_ms >= config.max_sync_wait_ms {
            return Some(Action::Reset(ResetReason::TimeSyncTimeout { waited_ms }));
        }
        if elapsed(now_ms, self.wait_start_ms) < config.sync_poll_ms {
            return None;
        }

        self.wait_start_ms = now_ms;
        let unix_time = view.unix_time();
        if unix_time >= config.sync_threshold_secs {
            self.established = true;
            self.state = LinkState::Monitor;
            Some(Action::Established { unix_time })
        } else {
            None
        }
    }

    fn on_monitor<P: LinkView>(
        &mut self,
        config: &ManagerConfig,
        now_ms: u64,
        view: &mut P,
    ) -> Option<Action> {
        if elapsed(now_ms, self.wait_start_ms) < config.monitor_interval_ms {
            return None;
        }
        if view.link_connected() {
            self.wait_start_ms = now_ms;
            None
        } else {
            self.established = false;
            self.last_attempt_ms = now_ms;
            self.state = LinkState::RetryWait;
            Some(Action::Disconnect)
        }
    }
}

fn elapsed(now_ms: u64, since_ms: u64) -> u64 {
    now_ms.saturating_sub(since_ms)
}
