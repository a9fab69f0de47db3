//! Type definitions for FFI.

use std::ffi::{c_char, c_int};

/// An opaque instance handle.
///
/// Points at the engine instance itself, so opening the same id twice yields
/// the same address. Never dereference or modify directly.
#[repr(C)]
pub struct MmkvHandle {
    _private: [u8; 0],
}

/// An owned list of owned strings.
///
/// `items` is null exactly when `size` is 0. Release with
/// `mmkv_free_string_list`, or free every item, then `items`, then the list
/// with `mmkv_free`.
#[repr(C)]
#[derive(Debug)]
pub struct MmkvStringList {
    /// Array of `size` NUL-terminated strings.
    pub items: *mut *mut c_char,
    /// Number of strings.
    pub size: usize,
}

/// Log callback: level, source file, formatted message.
///
/// Both strings are only valid for the duration of the call.
pub type MmkvLogFn =
    unsafe extern "C" fn(level: c_int, file: *const c_char, message: *const c_char);

/// Nullable log callback as passed to `mmkv_initialize`.
pub type MmkvLogger = Option<MmkvLogFn>;
