//! The general-purpose allocator every owned return value comes from.
//!
//! Owned outputs are allocated with the C library's `malloc`/`calloc`, so a
//! caller may release them with `free` or with [`mmkv_free`]. While being
//! built they live in a [`ForeignBlock`], which frees itself unless it is
//! handed over with [`ForeignBlock::into_raw`].

use crate::error::{FfiError, FfiResult};
use crate::types::MmkvStringList;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;


fn raw_malloc(size: usize) -> *mut c_void {
    #[cfg(test)]
    if accounting::should_fail() {
        return std::ptr::null_mut();
    }

    // SAFETY: malloc has no preconditions.
    let ptr = unsafe { libc::malloc(size) };
    #[cfg(test)]
    if !ptr.is_null() {
        accounting::allocated();
    }
    ptr
}

fn raw_calloc(count: usize, size: usize) -> *mut c_void {
    #[cfg(test)]
    if accounting::should_fail() {
        return std::ptr::null_mut();
    }

    // SAFETY: calloc has no preconditions and checks the product itself.
    let ptr = unsafe { libc::calloc(count, size) };
    #[cfg(test)]
    if !ptr.is_null() {
        accounting::allocated();
    }
    ptr
}

/// Frees a block from [`raw_malloc`]/[`raw_calloc`]; null is ignored.
///
/// # Safety
///
/// `ptr` must be null or a live block from this allocator.
unsafe fn raw_free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    #[cfg(test)]
    accounting::released();
    libc::free(ptr);
}

/// A `malloc`ed block of `T` owned by Rust until handed to the caller.
pub(crate) struct ForeignBlock<T> {
    ptr: NonNull<T>,
    _owns: PhantomData<T>,
}

impl<T> ForeignBlock<T> {
    fn from_raw(raw: *mut c_void, bytes: usize) -> FfiResult<Self> {
        NonNull::new(raw.cast::<T>())
            .map(|ptr| Self {
                ptr,
                _owns: PhantomData,
            })
            .ok_or(FfiError::AllocationFailed(bytes))
    }

    /// Allocates uninitialized room for `count` values (at least one byte).
    pub(crate) fn malloc(count: usize) -> FfiResult<Self> {
        let bytes = count
            .checked_mul(mem::size_of::<T>())
            .ok_or(FfiError::AllocationFailed(usize::MAX))?
            .max(1);
        Self::from_raw(raw_malloc(bytes), bytes)
    }

    /// Allocates `count` zeroed values.
    pub(crate) fn calloc(count: usize) -> FfiResult<Self> {
        let bytes = count.saturating_mul(mem::size_of::<T>());
        Self::from_raw(raw_calloc(count, mem::size_of::<T>()), bytes)
    }

    pub(crate) fn as_mut_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Hands the block over; the receiver must free it.
    pub(crate) fn into_raw(self) -> *mut T {
        let ptr = self.ptr.as_ptr();
        mem::forget(self);
        ptr
    }
}

impl<T> Drop for ForeignBlock<T> {
    fn drop(&mut self) {
        // SAFETY: the block came from this allocator and was not handed over.
        unsafe { raw_free(self.ptr.as_ptr().cast()) };
    }
}

/// Releases any block returned by this library.
///
/// Equivalent to the C library's `free`; null is ignored.
///
/// # Safety
///
/// `ptr` must be null or a pointer returned by an `mmkv_*` call that was not
/// freed yet.
#[no_mangle]
pub unsafe extern "C" fn mmkv_free(ptr: *mut c_void) {
    raw_free(ptr);
}

/// Releases a string list: every item, the item array and the list itself.
///
/// # Safety
///
/// `list` must be null or a list returned by `mmkv_get_string_set` or
/// `mmkv_all_keys` that was not freed yet.
#[no_mangle]
pub unsafe extern "C" fn mmkv_free_string_list(list: *mut MmkvStringList) {
    if list.is_null() {
        return;
    }

    let MmkvStringList { items, size } = list.read();
    if !items.is_null() {
        for i in 0..size {
            raw_free((*items.add(i)).cast());
        }
        raw_free(items.cast());
    }
    raw_free(list.cast());
}
