//! WiFi manager ESP32 firmware binary.
//!
//! Loads credentials from NVS (prompting on the serial console when none are
//! stored), then ticks the connection controller forever.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use log::{error, info};
    use std::io::{stdin, stdout, BufReader};
    use std::time::Duration;
    use wifi_manager_esp32::{
        EspLink, EspRestart, EspTimeSync, ManagerConfig, MonotonicClock, NvsBlobStore,
        SerialPrompt, WifiManager,
    };

    esp_idf_svc::log::EspLogger::initialize_default();

    info!("=== WiFi manager starting ===");

    let clock = MonotonicClock::new();
    let mut restart = EspRestart;
    let config = ManagerConfig::default();

    let peripherals = match Peripherals::take() {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to take peripherals: {:?}", e);
            wifi_manager_esp32::force_reset(&mut restart, &clock, config.reset_countdown_secs);
        }
    };
    let sysloop = match EspSystemEventLoop::take() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to take system event loop: {:?}", e);
            wifi_manager_esp32::force_reset(&mut restart, &clock, config.reset_countdown_secs);
        }
    };
    let blob = match NvsBlobStore::take_default() {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to take NVS partition: {}", e);
            wifi_manager_esp32::force_reset(&mut restart, &clock, config.reset_countdown_secs);
        }
    };
    let link = match EspLink::new(peripherals.modem, sysloop) {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to create WiFi driver: {}", e);
            wifi_manager_esp32::force_reset(&mut restart, &clock, config.reset_countdown_secs);
        }
    };

    let mut manager = WifiManager::new(
        config,
        blob,
        link,
        EspTimeSync::new(),
        clock,
        restart,
    );

    let mut prompt = SerialPrompt::new(BufReader::new(stdin()), stdout());
    if let Err(e) = manager.initialize(&mut prompt) {
        error!("Initialization failed: {}", e);
        let countdown = manager.config().reset_countdown_secs;
        manager.force_reset(countdown);
    }

    info!("Entering main loop...");
    loop {
        manager.tick();
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-manager' to run the controller on the host.");
}
