//! Instance lifecycle and maintenance exports.
//!
//! A handle is `Arc::into_raw` of the engine instance. Every open call hands
//! out one strong reference; `mmkv_close` closes the instance and gives that
//! reference back. Nothing else adjusts the count.

use crate::error::{guard, FfiError, FfiResult};
use crate::marshal::{
    borrow_present_str, borrow_str, borrow_str_array, copy_out_list, copy_out_string,
};
use crate::path::decode_optional_path;
use crate::types::{MmkvHandle, MmkvStringList};
use mmkvc_core::{Mode, Store, SyncFlag, EXPIRE_NEVER};
use std::ffi::{c_char, c_int};
use std::ptr;
use std::sync::Arc;

fn into_handle(store: Arc<Store>) -> *mut MmkvHandle {
    if !store.enable_auto_key_expire(EXPIRE_NEVER) {
        tracing::warn!(id = store.mmap_id(), "could not reset key expiry on open");
    }
    tracing::debug!(id = store.mmap_id(), "handing out instance handle");
    Arc::into_raw(store).cast_mut().cast()
}

/// Borrows the instance behind a handle.
///
/// # Safety
///
/// `handle` must be null or a handle from an open call that was not closed.
pub(crate) unsafe fn store_ref<'a>(handle: *const MmkvHandle) -> FfiResult<&'a Store> {
    handle
        .cast::<Store>()
        .as_ref()
        .ok_or(FfiError::NullArgument("handle"))
}

/// Opens the default instance under the root given to `mmkv_initialize`.
///
/// `mode` is 1 for single-process and 2 for multi-process access. A null or
/// empty `crypt_key` means no encryption. Returns null on failure.
///
/// # Safety
///
/// `crypt_key` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mmkv_default_mmkv(
    mode: c_int,
    crypt_key: *const c_char,
) -> *mut MmkvHandle {
    guard("mmkv_default_mmkv", ptr::null_mut(), || {
        let crypt_key = borrow_present_str(crypt_key, "crypt key")?;
        let store = Store::default_store(Mode::from_raw(mode), crypt_key)?;
        Ok(into_handle(store))
    })
}

/// Opens the instance `id`.
///
/// # Arguments
///
/// * `id` - Instance identifier, also the file name
/// * `mode` - 1 for single-process, 2 for multi-process access
/// * `crypt_key` - Present when non-null and non-empty
/// * `root_path` - Present when non-null; absent means the default root
///
/// # Returns
///
/// The handle, or null when the path cannot be converted or the engine
/// fails to open the instance.
///
/// # Safety
///
/// Every string argument must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mmkv_mmkv_with_id(
    id: *const c_char,
    mode: c_int,
    crypt_key: *const c_char,
    root_path: *const c_char,
) -> *mut MmkvHandle {
    guard("mmkv_mmkv_with_id", ptr::null_mut(), || {
        let id = borrow_str(id, "id")?;
        let crypt_key = borrow_present_str(crypt_key, "crypt key")?;
        let root = decode_optional_path(root_path, "root path")?;
        let store = Store::with_id(id, Mode::from_raw(mode), crypt_key, root.as_deref())?;
        Ok(into_handle(store))
    })
}

/// Closes the instance and invalidates `handle`.
///
/// # Safety
///
/// `handle` must be null or an open handle; it must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn mmkv_close(handle: *mut MmkvHandle) {
    guard("mmkv_close", (), || {
        if handle.is_null() {
            return Err(FfiError::NullArgument("handle"));
        }
        let store = Arc::from_raw(handle.cast_const().cast::<Store>());
        store.close();
        Ok(())
    });
}

/// Returns the instance identifier as an owned string.
///
/// # Safety
///
/// `handle` must be null or an open handle.
#[no_mangle]
pub unsafe extern "C" fn mmkv_mmap_id(handle: *mut MmkvHandle) -> *mut c_char {
    guard("mmkv_mmap_id", ptr::null_mut(), || {
        copy_out_string(store_ref(handle)?.mmap_id().as_bytes())
    })
}

/// Returns true when `key` holds a value.
///
/// # Safety
///
/// `handle` must be null or an open handle; `key` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mmkv_contains_key(handle: *mut MmkvHandle, key: *const c_char) -> bool {
    guard("mmkv_contains_key", false, || {
        Ok(store_ref(handle)?.contains_key(borrow_str(key, "key")?))
    })
}

/// Removes one key.
///
/// # Safety
///
/// `handle` must be null or an open handle; `key` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mmkv_remove_value_for_key(handle: *mut MmkvHandle, key: *const c_char) {
    guard("mmkv_remove_value_for_key", (), || {
        store_ref(handle)?.remove_value_for_key(borrow_str(key, "key")?);
        Ok(())
    });
}

/// Removes `size` keys; null entries are skipped.
///
/// # Safety
///
/// `keys` must point to `size` entries, each null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mmkv_remove_values_for_keys(
    handle: *mut MmkvHandle,
    keys: *const *const c_char,
    size: usize,
) {
    guard("mmkv_remove_values_for_keys", (), || {
        let store = store_ref(handle)?;
        let keys = borrow_str_array(keys, size, "keys")?;
        store.remove_values_for_keys(&keys);
        Ok(())
    });
}

/// Returns every key as an owned list; an empty instance gives a list with
/// size 0 and null items.
///
/// # Safety
///
/// `handle` must be null or an open handle.
#[no_mangle]
pub unsafe extern "C" fn mmkv_all_keys(handle: *mut MmkvHandle) -> *mut MmkvStringList {
    guard("mmkv_all_keys", ptr::null_mut(), || {
        copy_out_list(&store_ref(handle)?.all_keys())
    })
}

fn to_c_long(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Bytes of log in use.
///
/// # Safety
///
/// `handle` must be null or an open handle.
#[no_mangle]
pub unsafe extern "C" fn mmkv_actual_size(handle: *mut MmkvHandle) -> i64 {
    guard("mmkv_actual_size", 0, || {
        Ok(to_c_long(store_ref(handle)?.actual_size()))
    })
}

/// Number of keys.
///
/// # Safety
///
/// `handle` must be null or an open handle.
#[no_mangle]
pub unsafe extern "C" fn mmkv_count(handle: *mut MmkvHandle) -> i64 {
    guard("mmkv_count", 0, || {
        Ok(to_c_long(store_ref(handle)?.count() as u64))
    })
}

/// Size of the backing file.
///
/// # Safety
///
/// `handle` must be null or an open handle.
#[no_mangle]
pub unsafe extern "C" fn mmkv_total_size(handle: *mut MmkvHandle) -> i64 {
    guard("mmkv_total_size", 0, || {
        Ok(to_c_long(store_ref(handle)?.total_size()))
    })
}

/// Drops the in-memory map; it is reloaded on next access.
///
/// # Safety
///
/// `handle` must be null or an open handle.
#[no_mangle]
pub unsafe extern "C" fn mmkv_clear_memory_cache(handle: *mut MmkvHandle) {
    guard("mmkv_clear_memory_cache", (), || {
        store_ref(handle)?.clear_memory_cache();
        Ok(())
    });
}

/// Removes every key.
///
/// # Safety
///
/// `handle` must be null or an open handle.
#[no_mangle]
pub unsafe extern "C" fn mmkv_clear_all(handle: *mut MmkvHandle) {
    guard("mmkv_clear_all", (), || {
        store_ref(handle)?.clear_all();
        Ok(())
    });
}

/// Flushes the instance: `sync` true waits until the file is durable, false
/// only hands buffered writes to the OS.
///
/// # Safety
///
/// `handle` must be null or an open handle.
#[no_mangle]
pub unsafe extern "C" fn mmkv_sync(handle: *mut MmkvHandle, sync: bool) {
    guard("mmkv_sync", (), || {
        store_ref(handle)?.sync(SyncFlag::from(sync));
        Ok(())
    });
}

/// Compacts the log and shrinks the file.
///
/// # Safety
///
/// `handle` must be null or an open handle.
#[no_mangle]
pub unsafe extern "C" fn mmkv_trim(handle: *mut MmkvHandle) {
    guard("mmkv_trim", (), || {
        store_ref(handle)?.trim();
        Ok(())
    });
}

/// Re-encrypts the instance under `crypt_key`; null or empty removes
/// encryption.
///
/// # Safety
///
/// `handle` must be null or an open handle; `crypt_key` null or
/// NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mmkv_check_reset_crypt_key(
    handle: *mut MmkvHandle,
    crypt_key: *const c_char,
) -> bool {
    guard("mmkv_check_reset_crypt_key", false, || {
        let store = store_ref(handle)?;
        Ok(store.check_reset_crypt_key(borrow_present_str(crypt_key, "crypt key")?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{mmkv_free, mmkv_free_string_list};
    use std::ffi::{CStr, CString};
    use tempfile::TempDir;

    fn open(dir: &TempDir, id: &str) -> *mut MmkvHandle {
        let id = CString::new(id).unwrap();
        let root = CString::new(dir.path().to_str().unwrap()).unwrap();
        let handle = unsafe { mmkv_mmkv_with_id(id.as_ptr(), 1, ptr::null(), root.as_ptr()) };
        assert!(!handle.is_null());
        handle
    }

    #[test]
    fn same_id_same_address() {
        let dir = TempDir::new().unwrap();
        let a = open(&dir, "same");
        let b = open(&dir, "same");
        assert_eq!(a, b);
        unsafe {
            mmkv_close(a);
            mmkv_close(b);
        }
    }

    #[test]
    fn missing_id_or_bad_root_gives_null() {
        let dir = TempDir::new().unwrap();
        let root = CString::new(dir.path().to_str().unwrap()).unwrap();
        let empty = CString::new("").unwrap();
        let id = CString::new("x").unwrap();
        unsafe {
            assert!(mmkv_mmkv_with_id(ptr::null(), 1, ptr::null(), root.as_ptr()).is_null());
            assert!(mmkv_mmkv_with_id(empty.as_ptr(), 1, ptr::null(), root.as_ptr()).is_null());
            assert!(mmkv_mmkv_with_id(id.as_ptr(), 1, ptr::null(), empty.as_ptr()).is_null());
        }
    }

    #[test]
    fn mmap_id_is_owned_copy() {
        let dir = TempDir::new().unwrap();
        let handle = open(&dir, "named");
        unsafe {
            let id = mmkv_mmap_id(handle);
            assert_eq!(CStr::from_ptr(id).to_str().unwrap(), "named");
            mmkv_free(id.cast());
            mmkv_close(handle);
        }
    }

    #[test]
    fn all_keys_after_three_inserts() {
        let dir = TempDir::new().unwrap();
        let handle = open(&dir, "keys");
        unsafe {
            let empty = mmkv_all_keys(handle);
            assert_eq!((*empty).size, 0);
            assert!((*empty).items.is_null());
            mmkv_free_string_list(empty);

            for key in ["a", "b", "c"] {
                let key = CString::new(key).unwrap();
                assert!(crate::values::mmkv_set_int32(handle, key.as_ptr(), 1));
            }

            let list = mmkv_all_keys(handle);
            assert_eq!((*list).size, 3);
            let mut keys: Vec<String> = (0..3)
                .map(|i| {
                    CStr::from_ptr(*(*list).items.add(i))
                        .to_string_lossy()
                        .into_owned()
                })
                .collect();
            keys.sort();
            assert_eq!(keys, ["a", "b", "c"]);

            // Items are independently owned.
            let MmkvStringList { items, size } = list.read();
            for i in 0..size {
                mmkv_free((*items.add(i)).cast());
            }
            mmkv_free(items.cast());
            mmkv_free(list.cast());

            assert_eq!(mmkv_count(handle), 3);
            mmkv_close(handle);
        }
    }

    #[test]
    fn batch_remove_skips_null_entries() {
        let dir = TempDir::new().unwrap();
        let handle = open(&dir, "batch");
        let a = CString::new("a").unwrap();
        let b = CString::new("b").unwrap();
        unsafe {
            crate::values::mmkv_set_bool(handle, a.as_ptr(), true);
            crate::values::mmkv_set_bool(handle, b.as_ptr(), true);

            let keys = [a.as_ptr(), ptr::null()];
            mmkv_remove_values_for_keys(handle, keys.as_ptr(), keys.len());
            assert!(!mmkv_contains_key(handle, a.as_ptr()));
            assert!(mmkv_contains_key(handle, b.as_ptr()));

            mmkv_remove_value_for_key(handle, b.as_ptr());
            assert_eq!(mmkv_count(handle), 0);
            mmkv_close(handle);
        }
    }

    #[test]
    fn maintenance_calls() {
        let dir = TempDir::new().unwrap();
        let handle = open(&dir, "maint");
        let key = CString::new("k").unwrap();
        let secret = CString::new("secret").unwrap();
        unsafe {
            assert!(crate::values::mmkv_set_int64(handle, key.as_ptr(), 9));
            assert!(mmkv_actual_size(handle) > 0);
            assert_eq!(mmkv_total_size(handle), 4096);

            mmkv_sync(handle, true);
            mmkv_sync(handle, false);
            mmkv_clear_memory_cache(handle);
            assert_eq!(crate::values::mmkv_get_int64(handle, key.as_ptr(), 0), 9);

            assert!(mmkv_check_reset_crypt_key(handle, secret.as_ptr()));
            assert!(mmkv_check_reset_crypt_key(handle, ptr::null()));
            assert_eq!(crate::values::mmkv_get_int64(handle, key.as_ptr(), 0), 9);

            mmkv_trim(handle);
            mmkv_clear_all(handle);
            assert_eq!(mmkv_count(handle), 0);
            mmkv_close(handle);
        }
    }

    #[test]
    fn null_handle_gives_sentinels() {
        let key = CString::new("k").unwrap();
        unsafe {
            let null = ptr::null_mut();
            assert!(!mmkv_contains_key(null, key.as_ptr()));
            assert!(mmkv_all_keys(null).is_null());
            assert!(mmkv_mmap_id(null).is_null());
            assert_eq!(mmkv_count(null), 0);
            mmkv_close(null);
            mmkv_trim(null);
        }
    }
}
