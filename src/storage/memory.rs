//! In-memory blob store.
//!
//! Simulates a non-volatile medium for tests and host simulations. Supports:
//! - staged writes that only become visible on commit
//! - failure injection (refused commit, silently lost commit)
//! - corruption injection for integrity tests

use super::{BlobStore, StorageError};

/// Value of never-written bytes, matching erased flash.
const ERASED: u8 = 0xFF;

/// In-memory [`BlobStore`].
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    /// Bytes visible to readers.
    committed: Vec<u8>,
    /// Bytes written since the last commit.
    staged: Vec<u8>,
    opened: bool,
    fail_next_commit: bool,
    drop_next_commit: bool,
    commits: usize,
}

impl MemoryBlobStore {
    /// Create an empty store. Nothing is stored until the first commit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose committed contents are `bytes`.
    pub fn with_contents(bytes: &[u8]) -> Self {
        Self {
            committed: bytes.to_vec(),
            ..Default::default()
        }
    }

    /// Committed contents.
    pub fn committed(&self) -> &[u8] {
        &self.committed
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Make the next commit fail with [`StorageError::CommitFailed`].
    pub fn fail_next_commit(&mut self) {
        self.fail_next_commit = true;
    }

    /// Make the next commit report success without persisting anything.
    pub fn drop_next_commit(&mut self) {
        self.drop_next_commit = true;
    }

    /// Overwrite one committed byte.
    pub fn corrupt(&mut self, offset: usize, value: u8) {
        if let Some(b) = self.committed.get_mut(offset) {
            *b = value;
        }
        if let Some(b) = self.staged.get_mut(offset) {
            *b = value;
        }
    }

    fn discard_staged(&mut self) {
        let len = self.staged.len();
        self.staged = self.committed.clone();
        if self.staged.len() < len {
            self.staged.resize(len, ERASED);
        }
    }
}

impl BlobStore for MemoryBlobStore {
    fn open(&mut self, size_hint: usize) -> Result<(), StorageError> {
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
        if self.fail_next_commit {
            self.fail_next_commit = false;
            self.discard_staged();
            return Err(StorageError::CommitFailed("injected failure".to_string()));
        }
        if self.drop_next_commit {
            self.drop_next_commit = false;
            self.discard_staged();
            return Ok(());
        }
        self.committed = self.staged.clone();
        self.commits += 1;
        Ok(())
    }
}
