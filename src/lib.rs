//! WiFi connectivity manager for ESP32 devices.
//!
//! The library keeps a device on WiFi: it loads credentials from persistent
//! storage (or collects them interactively), joins a network, waits for the
//! wall clock to be synchronized, monitors the link and reconnects, and
//! restarts the device when recovery fails.
//!
//! Everything except the `esp32` drivers is platform-independent and tested
//! on the host.

pub mod config;
pub mod manager;
pub mod network;
pub mod provision;
pub mod reset;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used items
pub use config::{AccessPoint, CredentialError, Credentials, ManagerConfig, ServiceConfig};
pub use manager::{LinkState, ManagerError, WifiManager};
pub use network::{Clock, HostLink, LinkDriver, LinkStatus, MonotonicClock, SystemTimeSync, TimeSync};
pub use provision::{CredentialEntry, EntryError, SerialPrompt};
pub use reset::{force_reset, HostRestart, Restart};
pub use storage::{BlobStore, CredentialStore, FileBlobStore, MemoryBlobStore, StorageError};

#[cfg(feature = "esp32")]
pub use network::{EspLink, EspTimeSync};
#[cfg(feature = "esp32")]
pub use reset::EspRestart;
#[cfg(feature = "esp32")]
pub use storage::NvsBlobStore;
