//! WiFi configuration utility for ESP32.
//!
//! Writes a credential record to NVS without going through the serial
//! prompt, e.g. when provisioning devices on a bench.
//!
//! Usage:
//!   WIFI_SSID="MyNetwork" WIFI_PASSWORD="secret" WIFI_HOSTNAME="node-1" cargo configure-wifi
//!
//! For open networks (no password):
//!   WIFI_SSID="OpenNetwork" WIFI_PASSWORD="" cargo configure-wifi
//!
//! Up to four networks can be given as a comma-separated WIFI_SSID list with
//! a matching WIFI_PASSWORD list.

/// WiFi SSID(s) - set via WIFI_SSID environment variable at compile time.
#[cfg(feature = "esp32")]
const WIFI_SSID: Option<&str> = option_env!("WIFI_SSID");

/// WiFi password(s) - set via WIFI_PASSWORD environment variable at compile time.
/// Empty string for open networks.
#[cfg(feature = "esp32")]
const WIFI_PASSWORD: Option<&str> = option_env!("WIFI_PASSWORD");

/// Device hostname - set via WIFI_HOSTNAME environment variable at compile time.
#[cfg(feature = "esp32")]
const WIFI_HOSTNAME: Option<&str> = option_env!("WIFI_HOSTNAME");

#[cfg(feature = "esp32")]
const DEFAULT_HOSTNAME: &str = "esp32-wifi";

/// Print error message and halt. On ESP32, we pause briefly then return
/// so the process terminates cleanly (espflash monitor will show the output).
#[cfg(feature = "esp32")]
fn halt_with_error(msg: &str) -> ! {
    eprintln!("\n{}", msg);
    eprintln!("\n=== Configuration failed ===\n");
    std::thread::sleep(std::time::Duration::from_secs(2));
    std::process::exit(1);
}

#[cfg(feature = "esp32")]
fn main() {
    use wifi_manager_esp32::config::Credentials;
    use wifi_manager_esp32::storage::{CredentialStore, NvsBlobStore};

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    println!("\n=== WiFi Configuration Utility ===\n");

    let ssids = match WIFI_SSID {
        Some(s) if !s.is_empty() => s,
        _ => {
            halt_with_error(
                "Error: WIFI_SSID environment variable not set at compile time.\n\n\
                 Usage:\n  \
                 WIFI_SSID=\"MyNetwork\" WIFI_PASSWORD=\"secret\" cargo configure-wifi\n\n\
                 For open networks:\n  \
                 WIFI_SSID=\"OpenNetwork\" WIFI_PASSWORD=\"\" cargo configure-wifi",
            );
        }
    };
    let passwords: Vec<&str> = WIFI_PASSWORD.unwrap_or("").split(',').collect();
    let hostname = WIFI_HOSTNAME
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_HOSTNAME);

    let mut creds = Credentials::new(hostname);
    for (i, ssid) in ssids.split(',').map(str::trim).enumerate() {
        let password = passwords.get(i).copied().unwrap_or("");
        println!(
            "SSID: {}  Password: {} ({} chars)",
            ssid,
            if password.is_empty() { "(none)" } else { "****" },
            password.len()
        );
        if let Err(e) = creds.add_access_point(ssid, password) {
            halt_with_error(&format!("Error: {}", e));
        }
    }
    println!("Hostname: {}", creds.hostname());

    let blob = match NvsBlobStore::take_default() {
        Ok(blob) => blob,
        Err(e) => halt_with_error(&format!("Error initializing NVS: {}", e)),
    };
    let mut store = CredentialStore::new(blob, 0);
    if let Err(e) = store.open() {
        halt_with_error(&format!("Error opening NVS: {}", e));
    }
    if let Err(e) = store.save(&creds) {
        halt_with_error(&format!("Error saving to NVS: {}", e));
    }

    println!("\n=== WiFi configuration saved to NVS ===");
    println!("Credentials persist across reboots.");
    println!("\n=== Done - you can disconnect the device ===\n");

    std::thread::sleep(std::time::Duration::from_secs(2));
}

#[cfg(not(feature = "esp32"))]
fn main() {
    eprintln!("This binary must be built for ESP32.");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  WIFI_SSID=\"MyNetwork\" WIFI_PASSWORD=\"secret\" cargo configure-wifi");
    std::process::exit(1);
}
