//! File-backed blob store for host (development) builds.
//!
//! Uses `~/.wifi-manager-esp32/credentials.bin` by default. Commits write a
//! temporary file and rename it over the original, so the file holds either
//! the old or the new contents.

use super::{BlobStore, StorageError};
use log::debug;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const ERASED: u8 = 0xFF;

/// Get the default storage file path.
///
/// Returns `~/.wifi-manager-esp32/credentials.bin`
pub fn default_storage_path() -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".wifi-manager-esp32")
        .join("credentials.bin"))
}

/// File-backed [`BlobStore`].
#[derive(Debug)]
pub struct FileBlobStore {
    path: PathBuf,
    committed: Vec<u8>,
    staged: Vec<u8>,
    opened: bool,
}

impl FileBlobStore {
    /// Create a store backed by `path`. Nothing is touched until `open`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            committed: Vec::new(),
            staged: Vec::new(),
            opened: false,
        }
    }

    /// Create a store at the default path.
    pub fn at_default_path() -> io::Result<Self> {
        Ok(Self::new(default_storage_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn replace_file(&self, temp: &Path) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = fs::File::create(temp)?;
            file.write_all(&self.staged)?;
            file.sync_all()?;
        }
        fs::rename(temp, &self.path)
    }

    /// Drop staged writes, keeping the staged size.
    fn discard_staged(&mut self) {
        let len = self.staged.len();
        self.staged = self.committed.clone();
        if self.staged.len() < len {
            self.staged.resize(len, ERASED);
        }
    }
}

impl BlobStore for FileBlobStore {
    fn open(&mut self, size_hint: usize) -> Result<(), StorageError> {
        self.committed = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No storage file at {:?}", self.path);
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        self.staged = self.committed.clone();
        if self.staged.len() < size_hint {
            self.staged.resize(size_hint, ERASED);
        }
        self.opened = true;
        Ok(())
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError> {
        if !self.opened {
            return Err(StorageError::NotOpen);
        }
        if offset >= self.committed.len() {
            return Ok(0);
        }
        let len = buf.len().min(self.committed.len() - offset);
        buf[..len].copy_from_slice(&self.committed[offset..offset + len]);
        Ok(len)
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StorageError> {
        if !self.opened {
            return Err(StorageError::NotOpen);
        }
        let end = match offset.checked_add(bytes.len()) {
            Some(end) if end <= self.staged.len() => end,
            _ => {
                return Err(StorageError::OutOfBounds {
                    offset,
                    len: bytes.len(),
                    size: self.staged.len(),
                })
            }
        };
        self.staged[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if !self.opened {
            return Err(StorageError::NotOpen);
        }

        let temp = self.temp_path();
        if let Err(e) = self.replace_file(&temp) {
            let _ = fs::remove_file(&temp);
            self.discard_staged();
            return Err(e.into());
        }

        self.committed = self.staged.clone();
        debug!("Committed {} bytes to {:?}", self.committed.len(), self.path);
        Ok(())
    }
}
