//! Host-based WiFi manager for development and testing.
//!
//! Runs the connection controller on the host machine. Credentials are kept
//! in `~/.wifi-manager-esp32/credentials.bin` and prompted for on the
//! terminal when missing. The OS owns the actual network connection, so the
//! link is reported up as soon as a connection is requested.
//!
//! Settings can be overridden with `WIFI_MANAGER_*` environment variables,
//! e.g. `WIFI_MANAGER_MAX_RETRIES=3`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin host-manager
//! ```

use log::{error, info};
use std::io::{stdin, stdout};
use std::time::Duration;
use wifi_manager_esp32::{
    FileBlobStore, HostLink, HostRestart, ManagerConfig, MonotonicClock, SerialPrompt,
    SystemTimeSync, WifiManager,
};

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== WiFi manager (host) starting ===");

    let config = match ManagerConfig::default().with_overrides(|key| std::env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let blob = match FileBlobStore::at_default_path() {
        Ok(blob) => blob,
        Err(e) => {
            error!("Cannot locate credential file: {}", e);
            std::process::exit(1);
        }
    };
    info!("Credential file: {:?}", blob.path());

    let mut manager = WifiManager::new(
        config,
        blob,
        HostLink::new(),
        SystemTimeSync,
        MonotonicClock::new(),
        HostRestart::default(),
    );

    let mut prompt = SerialPrompt::new(stdin().lock(), stdout());
    if let Err(e) = manager.initialize(&mut prompt) {
        error!("Initialization failed: {}", e);
        std::process::exit(1);
    }

    info!("Entering main loop (Ctrl+C to exit)...");
    let mut was_established = false;
    loop {
        let established = manager.tick();
        if established && !was_established {
            info!(
                "Online as '{}' via {}",
                manager.hostname(),
                manager.ssid().unwrap_or_else(|| "-".to_string())
            );
        }
        was_established = established;
        std::thread::sleep(Duration::from_millis(10));
    }
}
