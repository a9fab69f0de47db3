//! The process-wide log callback.
//!
//! One slot holds the callback given to `mmkv_initialize`. The engine only
//! ever sees [`forward_log`], a fixed thunk that reads the slot per event and
//! drops the event when it is empty.
//!
//! The slot is swapped without a lock. An event that loaded the old callback
//! just before a swap still calls it, so `mmkv_initialize` should run once at
//! startup before other threads log.

use crate::types::{MmkvLogFn, MmkvLogger};
use mmkvc_core::LogLevel;
use std::ffi::CString;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

static SLOT: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

/// Replaces the callback; `None` silences forwarding.
pub(crate) fn install(logger: MmkvLogger) {
    let raw = logger.map_or(ptr::null_mut(), |f| f as *mut ());
    SLOT.store(raw, Ordering::Release);
}

fn current() -> MmkvLogger {
    let raw = SLOT.load(Ordering::Acquire);
    if raw.is_null() {
        return None;
    }
    // SAFETY: `install` is the only writer and stores valid callbacks only.
    Some(unsafe { mem::transmute::<*mut (), MmkvLogFn>(raw) })
}

fn to_c_string(text: &str) -> CString {
    CString::new(text).unwrap_or_else(|err| {
        let mut bytes = err.into_vec();
        bytes.retain(|&b| b != 0);
        CString::new(bytes).unwrap_or_default()
    })
}

/// Engine log handler forwarding level, file and message to the callback.
pub(crate) fn forward_log(level: LogLevel, file: &str, _line: u32, _function: &str, message: &str) {
    let Some(callback) = current() else {
        return;
    };

    let file = to_c_string(file);
    let message = to_c_string(message);
    // SAFETY: both strings outlive the call; the callback contract is the
    // caller's.
    unsafe { callback(level.as_raw(), file.as_ptr(), message.as_ptr()) };
}
