//! Conversion of narrow path arguments into native paths.
//!
//! Paths always cross the boundary as NUL-terminated narrow strings. Where
//! the filesystem API is byte-based they are used as-is; where it is wide
//! they are decoded as UTF-8 and re-encoded as UTF-16, and a byte sequence
//! that does not decode is an error rather than a mangled path.

use crate::error::{FfiError, FfiResult};
use std::ffi::{c_char, CStr};
use std::path::PathBuf;

/// Turns a boundary path into the path the engine opens.
pub(crate) trait PathCodec {
    /// Decodes one path argument.
    fn decode(&self, raw: &CStr) -> FfiResult<PathBuf>;
}

/// Byte-for-byte paths.
#[cfg_attr(windows, allow(dead_code))]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct NarrowPathCodec;

impl PathCodec for NarrowPathCodec {
    #[cfg(unix)]
    fn decode(&self, raw: &CStr) -> FfiResult<PathBuf> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        Ok(PathBuf::from(OsStr::from_bytes(raw.to_bytes())))
    }

    #[cfg(not(unix))]
    fn decode(&self, raw: &CStr) -> FfiResult<PathBuf> {
        raw.to_str()
            .map(PathBuf::from)
            .map_err(|_| FfiError::PathEncoding(raw.to_string_lossy().into_owned()))
    }
}

/// UTF-16 paths.
#[cfg_attr(not(windows), allow(dead_code))]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WidePathCodec;

impl WidePathCodec {
    /// Re-encodes a narrow path as UTF-16 code units.
    pub(crate) fn to_wide(raw: &CStr) -> FfiResult<Vec<u16>> {
        let narrow = raw
            .to_str()
            .map_err(|_| FfiError::PathEncoding(raw.to_string_lossy().into_owned()))?;
        Ok(narrow.encode_utf16().collect())
    }
}

impl PathCodec for WidePathCodec {
    fn decode(&self, raw: &CStr) -> FfiResult<PathBuf> {
        wide_to_path(&Self::to_wide(raw)?)
    }
}

#[cfg(windows)]
fn wide_to_path(wide: &[u16]) -> FfiResult<PathBuf> {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;

    Ok(PathBuf::from(OsString::from_wide(wide)))
}

#[cfg(not(windows))]
#[allow(dead_code)]
fn wide_to_path(wide: &[u16]) -> FfiResult<PathBuf> {
    String::from_utf16(wide)
        .map(PathBuf::from)
        .map_err(|err| FfiError::PathEncoding(err.to_string()))
}

#[cfg(windows)]
pub(crate) type PlatformPathCodec = WidePathCodec;

#[cfg(not(windows))]
pub(crate) type PlatformPathCodec = NarrowPathCodec;

/// Decodes a required path argument with the platform codec.
///
/// # Safety
///
/// `ptr` must be null or a NUL-terminated string.
pub(crate) unsafe fn decode_path(ptr: *const c_char, what: &'static str) -> FfiResult<PathBuf> {
    if ptr.is_null() {
        return Err(FfiError::NullArgument(what));
    }
    PlatformPathCodec::default().decode(CStr::from_ptr(ptr))
}

/// Decodes an optional path argument; null means absent.
///
/// # Safety
///
/// As for [`decode_path`].
pub(crate) unsafe fn decode_optional_path(
    ptr: *const c_char,
    what: &'static str,
) -> FfiResult<Option<PathBuf>> {
    if ptr.is_null() {
        return Ok(None);
    }
    decode_path(ptr, what).map(Some)
}
