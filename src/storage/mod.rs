//! Persistent credential storage.
//!
//! The credential record lives at a fixed offset of a byte-blob store so it
//! survives reboots. The store itself is behind the [`BlobStore`] trait:
//!
//! - [`MemoryBlobStore`] - in-memory, used by tests and simulations
//! - [`FileBlobStore`] - a file on the host
//! - [`NvsBlobStore`] - ESP32 Non-Volatile Storage (`esp32` feature)
//!
//! # Usage
//!
//! ```
//! use wifi_manager_esp32::config::Credentials;
//! use wifi_manager_esp32::network::HostLink;
//! use wifi_manager_esp32::storage::{CredentialStore, MemoryBlobStore};
//!
//! let mut store = CredentialStore::new(MemoryBlobStore::new(), 0);
//! store.open().unwrap();
//!
//! let mut creds = Credentials::new("pico-lab");
//! creds.add_access_point("MyNetwork", "MyPassword").unwrap();
//! store.save(&creds).unwrap();
//!
//! let mut link = HostLink::new();
//! assert_eq!(store.load(&mut link), Some(creds));
//! ```

use crate::config::{Credentials, RECORD_LEN};
use crate::network::LinkDriver;
use log::{debug, error, info, warn};

mod file;
mod memory;
#[cfg(feature = "esp32")]
mod nvs;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;
#[cfg(feature = "esp32")]
pub use nvs::NvsBlobStore;

/// Size requested from the blob store. Leaves room after the record.
pub const STORAGE_SIZE: usize = 1024;

/// Byte-addressed persistent storage.
///
/// Writes are staged until [`BlobStore::commit`]. A commit replaces the
/// previous contents as a whole: a reader never observes half of a write.
pub trait BlobStore {
    /// Prepare the store for use, sized for at least `size_hint` bytes.
    fn open(&mut self, size_hint: usize) -> Result<(), StorageError>;

    /// Read committed bytes at `offset` into `buf`.
    ///
    /// Returns the number of bytes read. Zero means nothing is stored there.
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Stage `bytes` for writing at `offset`.
    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StorageError>;

    /// Make all staged writes durable.
    fn commit(&mut self) -> Result<(), StorageError>;
}

/// Loads and saves the credential record.
pub struct CredentialStore<B: BlobStore> {
    blob: B,
    offset: usize,
}

impl<B: BlobStore> CredentialStore<B> {
    /// Create a credential store keeping its record at `offset`.
    pub fn new(blob: B, offset: usize) -> Self {
        Self { blob, offset }
    }

    /// Open the underlying blob store.
    ///
    /// Fails with [`StorageError::OutOfBounds`] if the record does not fit
    /// inside [`STORAGE_SIZE`] bytes at the configured offset.
    pub fn open(&mut self) -> Result<(), StorageError> {
        let fits = self
            .offset
            .checked_add(RECORD_LEN)
            .is_some_and(|end| end <= STORAGE_SIZE);
        if !fits {
            return Err(StorageError::OutOfBounds {
                offset: self.offset,
                len: RECORD_LEN,
                size: STORAGE_SIZE,
            });
        }
        self.blob.open(STORAGE_SIZE)
    }

    /// Load the stored record and register its networks with `link`.
    ///
    /// Returns `None` if nothing is stored or the record is invalid; this is
    /// a normal outcome and the link driver is left untouched.
    pub fn load<L: LinkDriver>(&mut self, link: &mut L) -> Option<Credentials> {
        let creds = self.read_record()?;
        register_candidates(&creds, link);
        info!(
            "Loaded credentials for '{}' ({} network(s))",
            creds.hostname(),
            creds.access_points().len()
        );
        Some(creds)
    }

    /// Save `creds`, replacing any stored record.
    ///
    /// Reads the record back after committing to catch silent write
    /// failures.
    pub fn save(&mut self, creds: &Credentials) -> Result<(), StorageError> {
        let bytes = creds.to_bytes();
        self.blob.write(self.offset, &bytes)?;
        self.blob.commit()?;

        let mut verify = vec![0u8; RECORD_LEN];
        let read = self.blob.read(self.offset, &mut verify).map_err(|e| {
            error!("Failed to read back credentials after save: {}", e);
            e
        })?;
        if read != RECORD_LEN || verify != bytes {
            error!("Credential verification failed - data mismatch after save");
            return Err(StorageError::VerifyFailed);
        }

        info!("Credentials saved and verified");
        Ok(())
    }

    /// Overwrite the stored record with zeros.
    ///
    /// After this, [`CredentialStore::load`] returns `None`.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.blob.write(self.offset, &[0u8; RECORD_LEN])?;
        self.blob.commit()?;
        warn!("Stored credentials cleared");
        Ok(())
    }

    /// Access the underlying blob store.
    pub fn blob(&self) -> &B {
        &self.blob
    }

    /// Mutable access to the underlying blob store.
    pub fn blob_mut(&mut self) -> &mut B {
        &mut self.blob
    }

    fn read_record(&mut self) -> Option<Credentials> {
        let mut buf = vec![0u8; RECORD_LEN];
        let read = match self.blob.read(self.offset, &mut buf) {
            Ok(0) => {
                debug!("No credential record stored");
                return None;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to read credentials: {}", e);
                return None;
            }
        };

        match Credentials::from_bytes(&buf[..read]) {
            Ok(creds) => Some(creds),
            Err(e) => {
                debug!("Stored credentials not valid: {}", e);
                None
            }
        }
    }
}

/// Register every access point of `creds` as a link candidate.
pub fn register_candidates<L: LinkDriver>(creds: &Credentials, link: &mut L) {
    for ap in creds.access_points() {
        link.register_candidate(ap.ssid(), ap.psk());
    }
}

/// Storage errors.
#[derive(Debug)]
pub enum StorageError {
    /// The store has not been opened.
    NotOpen,
    /// An access falls outside the store.
    OutOfBounds { offset: usize, len: usize, size: usize },
    /// Data read back after a commit differs from what was written.
    VerifyFailed,
    /// The medium refused the commit.
    CommitFailed(String),
    /// Generic I/O error.
    Io(std::io::Error),
    /// ESP-IDF error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOpen => write!(f, "storage not opened"),
            Self::OutOfBounds { offset, len, size } => write!(
                f,
                "access of {} bytes at offset {} exceeds storage size {}",
                len, offset, size
            ),
            Self::VerifyFailed => write!(f, "read-back verification failed"),
            Self::CommitFailed(reason) => write!(f, "commit failed: {}", reason),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for StorageError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}
