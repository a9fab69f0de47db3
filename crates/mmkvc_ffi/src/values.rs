//! Typed get/set exports, one pair per value kind.

use crate::error::guard;
use crate::handle::store_ref;
use crate::marshal::{
    borrow_bytes, borrow_str, borrow_str_array, copy_out_bytes, copy_out_list, copy_out_string,
};
use crate::types::{MmkvHandle, MmkvStringList};
use std::ffi::{c_char, CStr};
use std::ptr;

macro_rules! scalar_exports {
    ($($ty:ty => $get:ident, $set:ident;)*) => {
        $(
            #[doc = concat!("Reads a `", stringify!($ty), "`, or `default_value` when the key is absent.")]
            ///
            /// # Safety
            ///
            /// `handle` must be null or an open handle; `key` null or
            /// NUL-terminated.
            #[no_mangle]
            pub unsafe extern "C" fn $get(
                handle: *mut MmkvHandle,
                key: *const c_char,
                default_value: $ty,
            ) -> $ty {
                guard(stringify!($get), default_value, || {
                    Ok(store_ref(handle)?.get(borrow_str(key, "key")?, default_value))
                })
            }

            #[doc = concat!("Stores a `", stringify!($ty), "`. Returns whether the write was accepted.")]
            ///
            /// # Safety
            ///
            /// `handle` must be null or an open handle; `key` null or
            /// NUL-terminated.
            #[no_mangle]
            pub unsafe extern "C" fn $set(
                handle: *mut MmkvHandle,
                key: *const c_char,
                value: $ty,
            ) -> bool {
                guard(stringify!($set), false, || {
                    Ok(store_ref(handle)?.set(borrow_str(key, "key")?, value))
                })
            }
        )*
    };
}

scalar_exports! {
    i32 => mmkv_get_int32, mmkv_set_int32;
    u32 => mmkv_get_uint32, mmkv_set_uint32;
    i64 => mmkv_get_int64, mmkv_set_int64;
    u64 => mmkv_get_uint64, mmkv_set_uint64;
    f32 => mmkv_get_float, mmkv_set_float;
    f64 => mmkv_get_double, mmkv_set_double;
    bool => mmkv_get_bool, mmkv_set_bool;
}

/// Reads a string as an owned copy.
///
/// An absent key returns an owned copy of `default_value`, or null when
/// `default_value` is null.
///
/// # Safety
///
/// `handle` must be null or an open handle; `key` and `default_value` null
/// or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mmkv_get_string(
    handle: *mut MmkvHandle,
    key: *const c_char,
    default_value: *const c_char,
) -> *mut c_char {
    guard("mmkv_get_string", ptr::null_mut(), || {
        let store = store_ref(handle)?;
        match store.get_string(borrow_str(key, "key")?) {
            Some(value) => copy_out_string(value.as_bytes()),
            None if default_value.is_null() => Ok(ptr::null_mut()),
            None => copy_out_string(CStr::from_ptr(default_value).to_bytes()),
        }
    })
}

/// Stores a string.
///
/// # Safety
///
/// `handle` must be null or an open handle; `key` and `value` null or
/// NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mmkv_set_string(
    handle: *mut MmkvHandle,
    key: *const c_char,
    value: *const c_char,
) -> bool {
    guard("mmkv_set_string", false, || {
        let store = store_ref(handle)?;
        Ok(store.set_string(borrow_str(key, "key")?, borrow_str(value, "value")?))
    })
}

/// Reads a byte buffer as an owned copy and writes its length to `out_len`.
///
/// An absent key returns null with length 0. A present empty value returns
/// a non-null block with length 0.
///
/// # Safety
///
/// `handle` must be null or an open handle; `key` null or NUL-terminated;
/// `out_len` null or writable.
#[no_mangle]
pub unsafe extern "C" fn mmkv_get_bytes(
    handle: *mut MmkvHandle,
    key: *const c_char,
    out_len: *mut usize,
) -> *mut u8 {
    if !out_len.is_null() {
        *out_len = 0;
    }

    guard("mmkv_get_bytes", ptr::null_mut(), || {
        let store = store_ref(handle)?;
        let Some(value) = store.get_bytes(borrow_str(key, "key")?) else {
            return Ok(ptr::null_mut());
        };

        let block = copy_out_bytes(&value)?;
        if !out_len.is_null() {
            *out_len = value.len();
        }
        Ok(block)
    })
}

/// Stores a copy of `len` bytes at `value`; the buffer is not retained.
///
/// # Safety
///
/// `handle` must be null or an open handle; `key` null or NUL-terminated;
/// `value` must point to `len` readable bytes (or be null when `len` is 0).
#[no_mangle]
pub unsafe extern "C" fn mmkv_set_bytes(
    handle: *mut MmkvHandle,
    key: *const c_char,
    value: *const u8,
    len: usize,
) -> bool {
    guard("mmkv_set_bytes", false, || {
        let store = store_ref(handle)?;
        Ok(store.set_bytes(borrow_str(key, "key")?, borrow_bytes(value, len)?))
    })
}

/// Reads a string list as an owned list.
///
/// Returns null when the key is absent, and a list with size 0 and null
/// items when the stored list is empty.
///
/// # Safety
///
/// `handle` must be null or an open handle; `key` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mmkv_get_string_set(
    handle: *mut MmkvHandle,
    key: *const c_char,
) -> *mut MmkvStringList {
    guard("mmkv_get_string_set", ptr::null_mut(), || {
        let store = store_ref(handle)?;
        match store.get_string_list(borrow_str(key, "key")?) {
            Some(items) => copy_out_list(&items),
            None => Ok(ptr::null_mut()),
        }
    })
}

/// Stores the non-null entries of `value` in order.
///
/// A null `value` removes the key instead.
///
/// # Safety
///
/// `handle` must be null or an open handle; `key` null or NUL-terminated;
/// `value` null or pointing to `size` entries, each null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mmkv_set_string_set(
    handle: *mut MmkvHandle,
    key: *const c_char,
    value: *const *const c_char,
    size: usize,
) -> bool {
    guard("mmkv_set_string_set", false, || {
        let store = store_ref(handle)?;
        let key = borrow_str(key, "key")?;
        if value.is_null() {
            return Ok(store.remove_value_for_key(key));
        }
        Ok(store.set_string_list(key, &borrow_str_array(value, size, "value")?))
    })
}
