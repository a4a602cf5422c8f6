//! Forced device reset.
//!
//! [`force_reset`] is the pre-reset grace period: it logs a visible
//! countdown, blocks for its duration and then restarts the device. It is
//! the only blocking call in the connection core and it never returns.

use crate::network::Clock;
use log::warn;
use std::time::Duration;

/// Platform restart primitive.
pub trait Restart {
    /// Block the caller for `duration`.
    fn delay(&mut self, duration: Duration);

    /// Irreversibly restart the device.
    fn restart(&mut self) -> !;
}

/// Log a countdown of `countdown_secs` seconds, then restart.
///
/// Each line carries the uptime read from `clock`.
pub fn force_reset<R: Restart, C: Clock>(restart: &mut R, clock: &C, countdown_secs: u32) -> ! {
    for remaining in (1..=countdown_secs).rev() {
        warn!("{} Reboot in {}", clock.now_ms(), remaining);
        restart.delay(Duration::from_secs(1));
    }
    warn!("{} Rebooting now", clock.now_ms());
    restart.restart()
}

/// ESP32 restart through `esp_restart`.
#[cfg(feature = "esp32")]
#[derive(Debug, Default)]
pub struct EspRestart;

#[cfg(feature = "esp32")]
impl Restart for EspRestart {
    fn delay(&mut self, duration: Duration) {
        esp_idf_hal::delay::FreeRtos::delay_ms(duration.as_millis() as u32);
    }

    fn restart(&mut self) -> ! {
        unsafe { esp_idf_sys::esp_restart() };
        #[allow(unreachable_code)]
        loop {
            std::thread::park();
        }
    }
}

/// Host "restart": exits the process with a status the supervisor can act on.
#[derive(Debug)]
pub struct HostRestart {
    exit_code: i32,
}

impl HostRestart {
    /// Exit code used when the device would restart.
    pub const DEFAULT_EXIT_CODE: i32 = 3;

    pub fn new(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

impl Default for HostRestart {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EXIT_CODE)
    }
}

impl Restart for HostRestart {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn restart(&mut self) -> ! {
        std::process::exit(self.exit_code)
    }
}
