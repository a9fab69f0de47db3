//! Copying values across the boundary.
//!
//! Outputs are always fresh [`ForeignBlock`]s; nothing returned points into
//! engine or caller memory. Inputs are borrowed for the duration of one
//! call only.

use crate::alloc::ForeignBlock;
use crate::error::{FfiError, FfiResult};
use crate::types::MmkvStringList;
use std::ffi::{c_char, CStr};
use std::ptr;
use std::slice;

/// Copies `bytes` into a new NUL-terminated string.
pub(crate) fn c_string_block(bytes: &[u8]) -> FfiResult<ForeignBlock<c_char>> {
    let block = ForeignBlock::<c_char>::malloc(bytes.len() + 1)?;
    let dst = block.as_mut_ptr().cast::<u8>();
    // SAFETY: the block holds `len + 1` bytes and does not overlap `bytes`.
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        *dst.add(bytes.len()) = 0;
    }
    Ok(block)
}

/// Returns an owned NUL-terminated copy of `bytes`.
pub(crate) fn copy_out_string(bytes: &[u8]) -> FfiResult<*mut c_char> {
    c_string_block(bytes).map(ForeignBlock::into_raw)
}

/// Returns an owned copy of `bytes`; an empty value still gets a one-byte
/// block so that present-but-empty stays distinct from absent.
pub(crate) fn copy_out_bytes(bytes: &[u8]) -> FfiResult<*mut u8> {
    let block = ForeignBlock::<u8>::malloc(bytes.len())?;
    // SAFETY: the block holds at least `len` bytes.
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), block.as_mut_ptr(), bytes.len()) };
    Ok(block.into_raw())
}

/// Returns an owned string list.
///
/// The item array is one exactly sized `calloc`. If any allocation fails,
/// everything allocated so far is freed and nothing is returned.
pub(crate) fn copy_out_list<S: AsRef<str>>(items: &[S]) -> FfiResult<*mut MmkvStringList> {
    let list = ForeignBlock::<MmkvStringList>::malloc(1)?;
    if items.is_empty() {
        // SAFETY: the block has room for one list.
        unsafe {
            list.as_mut_ptr().write(MmkvStringList {
                items: ptr::null_mut(),
                size: 0,
            });
        }
        return Ok(list.into_raw());
    }

    let array = ForeignBlock::<*mut c_char>::calloc(items.len())?;
    let strings = items
        .iter()
        .map(|item| c_string_block(item.as_ref().as_bytes()))
        .collect::<FfiResult<Vec<_>>>()?;

    let slots = array.as_mut_ptr();
    for (i, string) in strings.into_iter().enumerate() {
        // SAFETY: the array has `items.len()` slots.
        unsafe { slots.add(i).write(string.into_raw()) };
    }

    // SAFETY: the block has room for one list.
    unsafe {
        list.as_mut_ptr().write(MmkvStringList {
            items: array.into_raw(),
            size: items.len(),
        });
    }
    Ok(list.into_raw())
}

/// Borrows a required UTF-8 string argument.
///
/// # Safety
///
/// `ptr` must be null or a NUL-terminated string valid for `'a`.
pub(crate) unsafe fn borrow_str<'a>(ptr: *const c_char, what: &'static str) -> FfiResult<&'a str> {
    if ptr.is_null() {
        return Err(FfiError::NullArgument(what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| FfiError::InvalidUtf8(what))
}

/// Borrows an optional argument that counts as present only when non-null
/// and non-empty.
///
/// # Safety
///
/// As for [`borrow_str`].
pub(crate) unsafe fn borrow_present_str<'a>(
    ptr: *const c_char,
    what: &'static str,
) -> FfiResult<Option<&'a str>> {
    if ptr.is_null() {
        return Ok(None);
    }
    borrow_str(ptr, what).map(|s| (!s.is_empty()).then_some(s))
}

/// Borrows an array of strings, skipping null entries.
///
/// # Safety
///
/// `array` must point to `len` entries, each null or a NUL-terminated string
/// valid for `'a`.
pub(crate) unsafe fn borrow_str_array<'a>(
    array: *const *const c_char,
    len: usize,
    what: &'static str,
) -> FfiResult<Vec<&'a str>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    if array.is_null() {
        return Err(FfiError::NullArgument(what));
    }

    slice::from_raw_parts(array, len)
        .iter()
        .filter(|entry| !entry.is_null())
        .map(|&entry| borrow_str(entry, what))
        .collect()
}

/// Borrows a caller buffer for the duration of one call.
///
/// # Safety
///
/// `data` must be null or point to `len` readable bytes valid for `'a`.
pub(crate) unsafe fn borrow_bytes<'a>(data: *const u8, len: usize) -> FfiResult<&'a [u8]> {
    if len == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        return Err(FfiError::NullArgument("value"));
    }
    Ok(slice::from_raw_parts(data, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{accounting, mmkv_free, mmkv_free_string_list};
    use proptest::prelude::*;
    use std::ffi::CString;

    unsafe fn read_list(list: *const MmkvStringList) -> Vec<String> {
        let list = &*list;
        (0..list.size)
            .map(|i| {
                CStr::from_ptr(*list.items.add(i))
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn string_copy_is_terminated() {
        let raw = copy_out_string(b"hello").unwrap();
        unsafe {
            assert_eq!(CStr::from_ptr(raw).to_bytes(), b"hello");
            mmkv_free(raw.cast());
        }
    }

    #[test]
    fn empty_bytes_are_not_null() {
        let raw = copy_out_bytes(&[]).unwrap();
        assert!(!raw.is_null());
        unsafe { mmkv_free(raw.cast()) };
    }

    #[test]
    fn empty_list_has_null_items() {
        let list = copy_out_list::<&str>(&[]).unwrap();
        unsafe {
            assert_eq!((*list).size, 0);
            assert!((*list).items.is_null());
            mmkv_free_string_list(list);
        }
    }

    #[test]
    fn list_failure_unwinds_siblings() {
        let before = accounting::live();
        // list, array, first string succeed; the second string fails.
        accounting::fail_after(Some(3));
        let result = copy_out_list(&["a", "b", "c"]);
        accounting::fail_after(None);

        assert!(matches!(result, Err(FfiError::AllocationFailed(_))));
        assert_eq!(accounting::live(), before);
    }

    #[test]
    fn str_array_skips_null_entries() {
        let a = CString::new("a").unwrap();
        let c = CString::new("c").unwrap();
        let array = [a.as_ptr(), ptr::null(), c.as_ptr()];
        let borrowed = unsafe { borrow_str_array(array.as_ptr(), 3, "items") }.unwrap();
        assert_eq!(borrowed, vec!["a", "c"]);
    }

    #[test]
    fn null_array_with_len_is_rejected() {
        let result = unsafe { borrow_str_array(ptr::null(), 2, "items") };
        assert!(matches!(result, Err(FfiError::NullArgument("items"))));
        assert!(unsafe { borrow_str_array(ptr::null(), 0, "items") }
            .unwrap()
            .is_empty());
    }

    #[test]
    fn presence_rule() {
        let empty = CString::new("").unwrap();
        let key = CString::new("k").unwrap();
        unsafe {
            assert_eq!(borrow_present_str(ptr::null(), "key").unwrap(), None);
            assert_eq!(borrow_present_str(empty.as_ptr(), "key").unwrap(), None);
            assert_eq!(borrow_present_str(key.as_ptr(), "key").unwrap(), Some("k"));
        }
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let bad = CString::new(vec![0xff, 0xfe]).unwrap();
        let result = unsafe { borrow_str(bad.as_ptr(), "key") };
        assert!(matches!(result, Err(FfiError::InvalidUtf8("key"))));
    }

    proptest! {
        #[test]
        fn list_copy_preserves_items(items in prop::collection::vec("\\PC{0,12}", 0..8)) {
            let before = accounting::live();
            let list = copy_out_list(&items).unwrap();
            let read = unsafe { read_list(list) };
            unsafe { mmkv_free_string_list(list) };

            prop_assert_eq!(read, items);
            prop_assert_eq!(accounting::live(), before);
        }
    }
}
