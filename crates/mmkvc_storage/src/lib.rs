//! # mmkvc Storage
//!
//! Storage backend trait and implementations for the mmkvc engine.
//!
//! Backends are **opaque, fixed-capacity byte stores**: the engine decides
//! how large the store is (always a multiple of its page size), writes at
//! explicit offsets inside it, and owns every byte of format interpretation.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs, with
//!   advisory locks for multi-process access
//!
//! ## Example
//!
//! ```rust
//! use mmkvc_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.resize(4096).unwrap();
//! backend.write_at(16, b"hello world").unwrap();
//! let data = backend.read_at(16, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{align_up, LockKind, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
