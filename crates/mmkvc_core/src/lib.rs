//! # mmkvc Core
//!
//! The key-value engine the mmkvc C ABI delegates to.
//!
//! This crate provides:
//! - A process-wide instance dictionary (`initialize`, [`Store::default_store`],
//!   [`Store::with_id`])
//! - Typed get/set for ten value kinds over a kind-erased value codec
//! - A CRC-protected append log with compaction, page-granular growth and
//!   optional AES-256-GCM sealing
//! - Global log level, log handler and error handler registration
//! - Per-write key expiry ([`StoreConfig::auto_expire`],
//!   [`Store::enable_auto_key_expire`], [`Store::disable_auto_key_expire`])
//!
//! Expiry durations are engine-only API. The C ABI opens every instance with
//! expiry tracking on and a duration of [`EXPIRE_NEVER`], and exports no call
//! to change it.
//!
//! ```rust,no_run
//! use mmkvc_core::{initialize, LogLevel, Mode, Store};
//! use std::path::Path;
//!
//! initialize(Path::new("/tmp/mmkvc"), LogLevel::Info, None)?;
//! let store = Store::default_store(Mode::SingleProcess, None)?;
//! store.set_i32("count", 7);
//! assert_eq!(store.get_i32("count", -1), 7);
//! # Ok::<(), mmkvc_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod log;

mod append_log;
mod codec;
mod config;
mod crypto;
mod error;
mod record;
mod registry;
mod store;

pub use codec::Scalar;
pub use config::{Mode, StoreConfig, SyncFlag, DEFAULT_MMAP_ID, EXPIRE_NEVER};
pub use crypto::{CryptoManager, EncryptionKey};
pub use error::{CoreError, CoreResult};
pub use log::{
    log_level, register_error_handler, register_log_handler, set_log_level,
    unregister_error_handler, unregister_log_handler, ErrorHandler, ErrorKind, LogHandler,
    LogLevel, RecoverStrategy,
};
pub use registry::{backup_one_to_directory, initialize, root_dir};
pub use store::Store;

/// Engine version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Allocation granule of every instance file; files are always a multiple
/// of this size.
pub const DEFAULT_MMAP_SIZE: u64 = 4096;
