//! NVS-backed blob store.
//!
//! Each record offset maps to its own NVS key in the `wifi_mgr` namespace.
//! `set_raw` replaces a key's value atomically, so a committed record is
//! either fully old or fully new.
//!
//! # Security
//!
//! NVS contents are not encrypted unless NVS encryption is enabled in the
//! partition table.

use super::{BlobStore, StorageError};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use log::debug;

/// NVS namespace for the credential store.
const NVS_NAMESPACE: &str = "wifi_mgr";

fn record_key(offset: usize) -> String {
    format!("rec_{:x}", offset)
}

/// [`BlobStore`] on ESP32 Non-Volatile Storage.
pub struct NvsBlobStore {
    partition: EspDefaultNvsPartition,
    nvs: Option<EspNvs<NvsDefault>>,
    size: usize,
    /// Writes waiting for commit, keyed by offset.
    staged: Vec<(usize, Vec<u8>)>,
}

impl NvsBlobStore {
    /// Create a store on `partition`. The namespace is opened by `open`.
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        Self {
            partition,
            nvs: None,
            size: 0,
            staged: Vec::new(),
        }
    }

    /// Take the default NVS partition and create a store on it.
    pub fn take_default() -> Result<Self, StorageError> {
        Ok(Self::new(EspDefaultNvsPartition::take()?))
    }
}

impl BlobStore for NvsBlobStore {
    fn open(&mut self, size_hint: usize) -> Result<(), StorageError> {
        self.nvs = Some(EspNvs::new(self.partition.clone(), NVS_NAMESPACE, true)?);
        self.size = size_hint;
        Ok(())
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError> {
        let nvs = self.nvs.as_ref().ok_or(StorageError::NotOpen)?;
        match nvs.get_raw(&record_key(offset), buf)? {
            Some(bytes) => Ok(bytes.len()),
            None => Ok(0),
        }
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StorageError> {
        if self.nvs.is_none() {
            return Err(StorageError::NotOpen);
        }
        if offset.checked_add(bytes.len()).map_or(true, |end| end > self.size) {
            return Err(StorageError::OutOfBounds {
                offset,
                len: bytes.len(),
                size: self.size,
            });
        }
        self.staged.retain(|(o, _)| *o != offset);
        self.staged.push((offset, bytes.to_vec()));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let nvs = self.nvs.as_mut().ok_or(StorageError::NotOpen)?;
        for (offset, bytes) in self.staged.drain(..) {
            nvs.set_raw(&record_key(offset), &bytes)?;
            debug!("NVS record {} written ({} bytes)", record_key(offset), bytes.len());
        }
        Ok(())
    }
}
