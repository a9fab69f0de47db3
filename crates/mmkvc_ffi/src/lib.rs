//! # mmkvc FFI
//!
//! Flat C ABI over the mmkvc key-value engine, for callers in a managed
//! runtime.
//!
//! This crate provides:
//! - `mmkv_initialize` and the process-wide log callback
//! - Opaque instance handles (`mmkv_default_mmkv`, `mmkv_mmkv_with_id`,
//!   `mmkv_close`)
//! - One get/set pair per value kind
//! - Maintenance, backup and version queries
//!
//! ## Ownership
//!
//! Every string, byte buffer and string list returned by an `mmkv_*` call is
//! a fresh `malloc` allocation owned by the caller from the moment the call
//! returns. Release it with `free`, `mmkv_free`, or for lists
//! `mmkv_free_string_list`. Nothing returned ever points into engine memory.
//!
//! ## Failures
//!
//! No error crosses the boundary. A failed call returns its kind's sentinel:
//! the caller's default, `false`, or null.
//!
//! ## Symbol names
//!
//! Every export is snake_case with an `mmkv_` prefix, and no other names are
//! exported. Bindings written against the camelCase MMKV C surface must look
//! up the names below instead:
//!
//! | MMKV symbol | Export |
//! |-------------|--------|
//! | `mmkv_defaultMMKV`, `mmkv_mmkvWithID` | `mmkv_default_mmkv`, `mmkv_mmkv_with_id` |
//! | `getInt` / `setInt`, `getUInt` / `setUInt` | `mmkv_get_int32` / `mmkv_set_int32`, `mmkv_get_uint32` / `mmkv_set_uint32` |
//! | `getLong` / `setLong`, `getULong` / `setULong` | `mmkv_get_int64` / `mmkv_set_int64`, `mmkv_get_uint64` / `mmkv_set_uint64` |
//! | `getFloat`, `getDouble`, `getBoolean` (and setters) | `mmkv_get_float`, `mmkv_get_double`, `mmkv_get_bool` (and setters) |
//! | `getString`, `getByteArray`, `getStringSet` (and setters) | `mmkv_get_string`, `mmkv_get_bytes`, `mmkv_get_string_set` (and setters) |
//! | `mmkv_containsKey`, `mmkv_removeValueForKey`, `mmkv_removeValuesForKeys`, `mmkv_allKeys`, `mmkv_mmapID` | `mmkv_contains_key`, `mmkv_remove_value_for_key`, `mmkv_remove_values_for_keys`, `mmkv_all_keys`, `mmkv_mmap_id` |
//! | `mmkv_actualSize`, `mmkv_count`, `mmkv_totalSize` | `mmkv_actual_size`, `mmkv_count`, `mmkv_total_size` |
//! | `mmkv_clearMemoryCache`, `mmkv_clearAll`, `mmkv_close`, `mmkv_sync`, `mmkv_trim` | `mmkv_clear_memory_cache`, `mmkv_clear_all`, `mmkv_close`, `mmkv_sync`, `mmkv_trim` |
//! | `mmkv_checkReSetCryptKey`, `mmkv_backupOneToDirectory` | `mmkv_check_reset_crypt_key`, `mmkv_backup_one_to_directory` |
//! | `mmkv_pageSize`, `mmkv_setLogLevel`, `mmkv_version`, `mmkv_unregisterHandler` | `mmkv_page_size`, `mmkv_set_log_level`, `mmkv_version`, `mmkv_unregister_handler` |
//! | `free` | `mmkv_free` (or libc `free`); lists use `mmkv_free_string_list` |
//!
//! Signatures follow the Rust declarations here: lengths are `usize`,
//! `mmkv_get_bytes` writes its length through `*mut usize`, and
//! `mmkv_get_string` returns null rather than failing when both the key and
//! the default are absent.

#![warn(missing_docs)]

mod alloc;
mod error;
mod handle;
mod logger;
mod marshal;
mod path;
mod runtime;
mod types;
mod values;

pub use alloc::{mmkv_free, mmkv_free_string_list};
pub use error::{FfiError, FfiResult};
pub use handle::*;
pub use runtime::*;
pub use types::{MmkvHandle, MmkvLogFn, MmkvLogger, MmkvStringList};
pub use values::*;
