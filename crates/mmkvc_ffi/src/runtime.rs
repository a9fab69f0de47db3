//! Process-wide exports: initialization, logging and backup.

use crate::error::guard;
use crate::logger;
use crate::marshal::borrow_str;
use crate::path::{decode_optional_path, decode_path};
use crate::types::MmkvLogger;
use mmkvc_core::LogLevel;
use std::ffi::{c_char, c_int};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Initializes the engine under `root` with a log level and log callback.
///
/// `level` is 0 (debug) to 4 (none). A null `logger` silences forwarding
/// without touching open handles. Returns false when `root` cannot be
/// converted to a native path or the engine fails to initialize; the
/// previous callback then stays installed.
///
/// Call once at startup: the callback slot is not synchronized against log
/// events already in flight on other threads.
///
/// # Safety
///
/// `root` must be null or NUL-terminated; `logger` must stay callable until
/// it is replaced.
#[no_mangle]
pub unsafe extern "C" fn mmkv_initialize(
    root: *const c_char,
    level: c_int,
    logger: MmkvLogger,
) -> bool {
    guard("mmkv_initialize", false, || {
        let root = decode_path(root, "root")?;
        mmkvc_core::initialize(&root, LogLevel::from_raw(level), Some(logger::forward_log))?;
        logger::install(logger);
        Ok(true)
    })
}

/// Copies the file of instance `id` into `dst_dir`.
///
/// `src_root` null means the default root.
///
/// # Safety
///
/// Every argument must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mmkv_backup_one_to_directory(
    id: *const c_char,
    dst_dir: *const c_char,
    src_root: *const c_char,
) -> bool {
    guard("mmkv_backup_one_to_directory", false, || {
        let id = borrow_str(id, "id")?;
        let dst_dir = decode_path(dst_dir, "destination directory")?;
        let src_root = decode_optional_path(src_root, "source root")?;
        mmkvc_core::backup_one_to_directory(id, &dst_dir, src_root.as_deref())?;
        Ok(true)
    })
}

/// Allocation granule of instance files.
#[no_mangle]
pub extern "C" fn mmkv_page_size() -> i64 {
    mmkvc_core::DEFAULT_MMAP_SIZE as i64
}

/// Sets the engine log level, 0 (debug) to 4 (none).
#[no_mangle]
pub extern "C" fn mmkv_set_log_level(level: c_int) {
    mmkvc_core::set_log_level(LogLevel::from_raw(level));
}

/// Engine version. The string is static and must not be freed.
#[no_mangle]
pub extern "C" fn mmkv_version() -> *const c_char {
    VERSION.as_ptr().cast()
}

/// Detaches both the log handler and the error handler from the engine.
#[no_mangle]
pub extern "C" fn mmkv_unregister_handler() {
    mmkvc_core::unregister_log_handler();
    mmkvc_core::unregister_error_handler();
}
