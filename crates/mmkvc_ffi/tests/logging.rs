//! Log forwarding through `mmkv_initialize`.
//!
//! Runs as its own process: the callback slot and the default root are
//! process-wide.

use mmkvc_ffi::{mmkv_close, mmkv_initialize, mmkv_mmkv_with_id, mmkv_set_int32};
use std::ffi::{c_char, c_int, CStr, CString};
use std::ptr;
use std::sync::Mutex;
use tempfile::TempDir;

static EVENTS: Mutex<Vec<(c_int, String, String)>> = Mutex::new(Vec::new());

unsafe extern "C" fn capture(level: c_int, file: *const c_char, message: *const c_char) {
    let file = CStr::from_ptr(file).to_string_lossy().into_owned();
    let message = CStr::from_ptr(message).to_string_lossy().into_owned();
    EVENTS.lock().unwrap().push((level, file, message));
}

fn events_mentioning(needle: &str) -> Vec<(c_int, String, String)> {
    EVENTS
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, _, message)| message.contains(needle))
        .cloned()
        .collect()
}

#[test]
fn callback_receives_events_until_replaced_with_null() {
    let dir = TempDir::new().unwrap();
    let root = CString::new(dir.path().to_str().unwrap()).unwrap();

    assert!(unsafe { mmkv_initialize(root.as_ptr(), 1, Some(capture)) });

    // Opening loads the instance, which logs once at INFO.
    let loud = CString::new("loud-instance").unwrap();
    let handle = unsafe { mmkv_mmkv_with_id(loud.as_ptr(), 1, ptr::null(), ptr::null()) };
    assert!(!handle.is_null());

    let seen = events_mentioning("loaded [loud-instance]");
    assert_eq!(seen.len(), 1, "{seen:?}");
    let (level, file, _) = &seen[0];
    assert_eq!(*level, 1);
    assert!(file.ends_with(".rs"), "{file}");

    // A failed initialize leaves the installed callback in place.
    let not_a_dir = dir.path().join("plain-file");
    std::fs::write(&not_a_dir, b"x").unwrap();
    let bad_root = CString::new(not_a_dir.to_str().unwrap()).unwrap();
    assert!(!unsafe { mmkv_initialize(bad_root.as_ptr(), 1, None) });

    let still = CString::new("still-loud").unwrap();
    let still_handle = unsafe { mmkv_mmkv_with_id(still.as_ptr(), 1, ptr::null(), ptr::null()) };
    assert!(!still_handle.is_null());
    assert_eq!(events_mentioning("loaded [still-loud]").len(), 1);
    unsafe { mmkv_close(still_handle) };

    // A null logger silences forwarding; open handles keep working.
    assert!(unsafe { mmkv_initialize(root.as_ptr(), 1, None) });
    let quiet = CString::new("quiet-instance").unwrap();
    let other = unsafe { mmkv_mmkv_with_id(quiet.as_ptr(), 1, ptr::null(), ptr::null()) };
    assert!(!other.is_null());
    assert!(events_mentioning("quiet-instance").is_empty());

    let key = CString::new("k").unwrap();
    assert!(unsafe { mmkv_set_int32(handle, key.as_ptr(), 1) });

    unsafe {
        mmkv_close(handle);
        mmkv_close(other);
    }
    assert!(events_mentioning("closed [loud-instance]").is_empty());
}
