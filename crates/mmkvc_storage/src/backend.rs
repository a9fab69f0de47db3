//! Storage backend trait definition.

use crate::error::StorageResult;

/// Kind of advisory lock requested from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Many readers may hold the lock at once.
    Shared,
    /// A single writer holds the lock.
    Exclusive,
}

/// A low-level storage backend for the mmkvc engine.
///
/// Backends are fixed-capacity byte stores that the engine grows and shrinks
/// explicitly. They do not understand headers, records or encryption.
///
/// # Invariants
///
/// - `size` is the allocated length; bytes past the last write read as zero
/// - `write_at` never extends the store, it fails past `size`
/// - `resize` zero-fills newly allocated bytes
/// - `sync` makes all previously written data durable
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read would extend beyond the current size
    /// or an I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Overwrites `data.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write would extend beyond the current size
    /// or an I/O error occurs.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Returns the allocated size of the storage in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Grows or shrinks the storage to exactly `new_size` bytes.
    fn resize(&mut self, new_size: u64) -> StorageResult<()>;

    /// Pushes buffered writes to the operating system without waiting for
    /// the disk.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs all data and metadata to durable storage.
    fn sync(&mut self) -> StorageResult<()>;

    /// Re-reads the allocated size from the underlying medium.
    ///
    /// Another process may have resized a shared file since it was opened.
    fn refresh_size(&self) -> StorageResult<u64> {
        self.size()
    }

    /// Takes an advisory lock shared with other processes.
    ///
    /// Backends that are private to one process accept and ignore it.
    fn lock(&self, _kind: LockKind) -> StorageResult<()> {
        Ok(())
    }

    /// Releases a lock taken with [`lock`](Self::lock).
    fn unlock(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Rounds `len` up to the next multiple of `granule` (at least one granule).
#[must_use]
pub fn align_up(len: u64, granule: u64) -> u64 {
    debug_assert!(granule > 0);
    let pages = len.div_ceil(granule).max(1);
    pages * granule
}
