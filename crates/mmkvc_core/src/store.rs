//! A single key-value instance.
//!
//! The decoded map is loaded lazily from the append log on first access and
//! kept in memory; every mutation updates the map and then appends one
//! record. When a record does not fit the file, the log is compacted from
//! the map and grown if needed.

use crate::append_log::{AppendLog, Scan, FLAG_ENCRYPTED};
use crate::codec::{decode_string, decode_string_list, encode_scalar, encode_string_list, Scalar};
use crate::config::{Mode, StoreConfig, SyncFlag, DEFAULT_MMAP_ID};
use crate::crypto::{CryptoManager, EncryptionKey};
use crate::error::{CoreError, CoreResult};
use crate::log::{
    defer_handler, log_debug, log_error, log_info, log_warn, on_error, ErrorKind,
    RecoverStrategy,
};
use crate::record::Record;
use crate::{registry, DEFAULT_MMAP_SIZE};
use mmkvc_storage::{FileBackend, LockKind, StorageBackend};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

fn check_key(key: &str) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::invalid_argument("empty key"));
    }
    Ok(())
}

struct Entry {
    value: Vec<u8>,
    /// Absolute Unix seconds; 0 = never.
    expire_at: u64,
}

impl Entry {
    fn is_expired(&self, now: u64) -> bool {
        self.expire_at != 0 && self.expire_at <= now
    }
}

struct Cipher {
    passphrase: Zeroizing<String>,
    manager: CryptoManager,
}

impl Cipher {
    fn derive(passphrase: &str) -> CoreResult<Self> {
        let key = EncryptionKey::derive_from_passphrase(passphrase)?;
        Ok(Self {
            passphrase: Zeroizing::new(passphrase.to_owned()),
            manager: CryptoManager::new(key),
        })
    }
}

struct State {
    /// None once the instance is closed.
    log: Option<AppendLog>,
    entries: BTreeMap<String, Entry>,
    loaded: bool,
    cipher: Option<Cipher>,
    auto_expire: Option<u32>,
}

impl State {
    fn flags(&self) -> u8 {
        if self.cipher.is_some() {
            FLAG_ENCRYPTED
        } else {
            0
        }
    }

    fn manager(&self) -> Option<&CryptoManager> {
        self.cipher.as_ref().map(|c| &c.manager)
    }

    fn log_mut(&mut self, id: &str) -> CoreResult<&mut AppendLog> {
        self.log.as_mut().ok_or_else(|| CoreError::closed(id))
    }

    fn invalidate(&mut self) {
        self.entries.clear();
        self.loaded = false;
    }

    fn new_expire_at(&self) -> u64 {
        match self.auto_expire {
            Some(seconds) if seconds > 0 => now_secs() + u64::from(seconds),
            _ => 0,
        }
    }

    /// Replays the log into the map unless it is already loaded.
    fn load(&mut self, id: &str) -> CoreResult<()> {
        if self.loaded {
            return Ok(());
        }

        let flags = self.flags();
        let log = self.log.as_mut().ok_or_else(|| CoreError::closed(id))?;
        let cipher = self.cipher.as_ref().map(|c| &c.manager);

        let mismatch = (log.flags() ^ flags) & FLAG_ENCRYPTED != 0;
        let mut scan = if mismatch && log.actual_size() > 0 {
            Scan {
                records: Vec::new(),
                failure: Some((ErrorKind::CrcCheckFail, 0)),
            }
        } else {
            log.scan(cipher)?
        };

        if let Some((kind, valid_len)) = scan.failure {
            let strategy = on_error(id, kind);
            log_warn!("[{id}] {kind:?} at record offset {valid_len}, strategy {strategy:?}");
            if strategy == RecoverStrategy::Recover && valid_len > 0 {
                log.truncate_to(valid_len)?;
            } else {
                scan.records.clear();
                log.reset(flags)?;
            }
        } else if mismatch {
            log.rewrite(&[], flags)?;
        }

        let now = now_secs();
        self.entries.clear();
        for record in scan.records {
            match record {
                Record::Put {
                    key,
                    expire_at,
                    value,
                } => {
                    let entry = Entry { value, expire_at };
                    if entry.is_expired(now) {
                        self.entries.remove(&key);
                    } else {
                        self.entries.insert(key, entry);
                    }
                }
                Record::Remove { key } => {
                    self.entries.remove(&key);
                }
            }
        }

        self.loaded = true;
        log_info!("loaded [{id}] with {} keys", self.entries.len());
        Ok(())
    }

    /// Rewrites the log from the map, dropping expired entries.
    fn write_back(&mut self, id: &str) -> CoreResult<()> {
        let flags = self.flags();
        let cipher = self.cipher.as_ref().map(|c| &c.manager);
        let now = now_secs();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        let mut body = Vec::new();
        for (key, entry) in &self.entries {
            let record = Record::Put {
                key: key.clone(),
                expire_at: entry.expire_at,
                value: entry.value.clone(),
            };
            body.extend_from_slice(&record.encode_frame(cipher)?);
        }

        let log = self.log.as_mut().ok_or_else(|| CoreError::closed(id))?;
        log.rewrite(&body, flags)?;
        log_debug!("[{id}] wrote back {} keys, {} bytes", self.entries.len(), body.len());
        Ok(())
    }

    fn try_persist(&mut self, id: &str, frame: &[u8]) -> CoreResult<()> {
        if self.log_mut(id)?.fits(frame.len())? {
            self.log_mut(id)?.append(frame)
        } else {
            self.write_back(id)
        }
    }

    /// Persists a frame whose effect is already in the map. On failure the
    /// map is dropped so the next access reloads what is on disk.
    fn persist(&mut self, id: &str, frame: &[u8]) -> CoreResult<()> {
        let result = self.try_persist(id, frame);
        if result.is_err() {
            self.invalidate();
        }
        result
    }
}

/// A named key-value instance backed by one file.
///
/// Instances are shared: opening the same id under the same root returns the
/// same `Arc<Store>`. After [`close`](Self::close) every read returns its
/// default and every write returns `false`.
pub struct Store {
    id: String,
    path: PathBuf,
    mode: Mode,
    state: Mutex<State>,
}

macro_rules! scalar_accessors {
    ($($ty:ty => $get:ident, $set:ident;)*) => {
        $(
            #[doc = concat!("Reads a `", stringify!($ty), "`, or `default` when absent or of another kind.")]
            pub fn $get(&self, key: &str, default: $ty) -> $ty {
                self.get(key, default)
            }

            #[doc = concat!("Stores a `", stringify!($ty), "`.")]
            pub fn $set(&self, key: &str, value: $ty) -> bool {
                self.set(key, value)
            }
        )*
    };
}

impl Store {
    /// Opens (or returns the already open) instance described by `config`.
    pub fn open(config: StoreConfig) -> CoreResult<Arc<Self>> {
        registry::open_instance(config)
    }

    /// Opens the default instance under the process-default root.
    pub fn default_store(mode: Mode, crypt_key: Option<&str>) -> CoreResult<Arc<Self>> {
        Self::open(StoreConfig::new(DEFAULT_MMAP_ID).mode(mode).crypt_key(crypt_key))
    }

    /// Opens the instance `id`, under `root` or the process-default root.
    pub fn with_id(
        id: &str,
        mode: Mode,
        crypt_key: Option<&str>,
        root: Option<&Path>,
    ) -> CoreResult<Arc<Self>> {
        Self::open(
            StoreConfig::new(id)
                .mode(mode)
                .crypt_key(crypt_key)
                .root_dir(root.map(Path::to_path_buf)),
        )
    }

    pub(crate) fn create(
        id: String,
        path: PathBuf,
        mode: Mode,
        crypt_key: Option<&str>,
        auto_expire: Option<u32>,
    ) -> CoreResult<Self> {
        let cipher = crypt_key.map(Cipher::derive).transpose()?;
        let flags = if cipher.is_some() { FLAG_ENCRYPTED } else { 0 };

        let backend = FileBackend::open_with_create_dirs(&path)?;
        let multi = mode == Mode::MultiProcess;
        if multi {
            backend.lock(LockKind::Exclusive)?;
        }

        let log = AppendLog::open(Box::new(backend), DEFAULT_MMAP_SIZE, flags)?;
        let mut state = State {
            log: Some(log),
            entries: BTreeMap::new(),
            loaded: false,
            cipher,
            auto_expire,
        };

        let loaded = state.load(&id);
        if multi {
            if let Some(log) = state.log.as_ref() {
                log.unlock()?;
            }
        }
        loaded?;

        Ok(Self {
            id,
            path,
            mode,
            state: Mutex::new(state),
        })
    }

    /// Runs `op` on the state, under the inter-process lock in multi-process
    /// mode. A foreign write since the last operation drops the map first.
    ///
    /// Records logged by `op` reach the log handler after the state lock is
    /// released.
    fn with_state<T>(
        &self,
        kind: LockKind,
        op: impl FnOnce(&mut State) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let _deferral = defer_handler();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if self.mode != Mode::MultiProcess {
            return op(state);
        }

        let log = state.log_mut(&self.id)?;
        log.lock(kind)?;
        let result = match log.refresh() {
            Ok(changed) => {
                if changed {
                    log_debug!("[{}] changed by another process, reloading", self.id);
                    state.invalidate();
                }
                op(state)
            }
            Err(err) => Err(err),
        };

        if let Some(log) = state.log.as_ref() {
            if let Err(err) = log.unlock() {
                log_warn!("[{}] failed to release file lock: {err}", self.id);
            }
        }
        result
    }

    fn report<T>(&self, op: &str, result: CoreResult<T>, fallback: T) -> T {
        match result {
            Ok(value) => value,
            Err(err @ CoreError::Closed { .. }) => {
                log_debug!("{op}: {err}");
                fallback
            }
            Err(err) => {
                log_error!("[{}] {op} failed: {err}", self.id);
                fallback
            }
        }
    }

    fn get_raw(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        check_key(key)?;
        self.with_state(LockKind::Shared, |state| {
            state.load(&self.id)?;
            let now = now_secs();
            Ok(state
                .entries
                .get(key)
                .filter(|entry| !entry.is_expired(now))
                .map(|entry| entry.value.clone()))
        })
    }

    fn set_raw(&self, key: &str, value: Vec<u8>) -> CoreResult<()> {
        check_key(key)?;
        self.with_state(LockKind::Exclusive, |state| {
            state.load(&self.id)?;
            let expire_at = state.new_expire_at();
            let frame = Record::Put {
                key: key.to_owned(),
                expire_at,
                value: value.clone(),
            }
            .encode_frame(state.manager())?;
            state
                .entries
                .insert(key.to_owned(), Entry { value, expire_at });
            state.persist(&self.id, &frame)
        })
    }

    /// Reads a scalar, or `default` when absent or of another kind.
    pub fn get<T: Scalar>(&self, key: &str, default: T) -> T {
        let result = self
            .get_raw(key)
            .map(|raw| raw.and_then(|bytes| T::decode(&bytes)).unwrap_or(default));
        self.report("get", result, default)
    }

    /// Stores a scalar.
    pub fn set<T: Scalar>(&self, key: &str, value: T) -> bool {
        let result = self.set_raw(key, encode_scalar(value));
        self.report("set", result.map(|()| true), false)
    }

    scalar_accessors! {
        bool => get_bool, set_bool;
        i32 => get_i32, set_i32;
        u32 => get_u32, set_u32;
        i64 => get_i64, set_i64;
        u64 => get_u64, set_u64;
        f32 => get_f32, set_f32;
        f64 => get_f64, set_f64;
    }

    /// Reads a string; `None` when absent or not UTF-8.
    pub fn get_string(&self, key: &str) -> Option<String> {
        let result = self
            .get_raw(key)
            .map(|raw| raw.and_then(|bytes| decode_string(&bytes)));
        self.report("get_string", result, None)
    }

    /// Stores a string.
    pub fn set_string(&self, key: &str, value: &str) -> bool {
        let result = self.set_raw(key, value.as_bytes().to_vec());
        self.report("set_string", result.map(|()| true), false)
    }

    /// Reads a byte buffer; `None` when absent.
    pub fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let result = self.get_raw(key);
        self.report("get_bytes", result, None)
    }

    /// Stores a byte buffer.
    pub fn set_bytes(&self, key: &str, value: &[u8]) -> bool {
        let result = self.set_raw(key, value.to_vec());
        self.report("set_bytes", result.map(|()| true), false)
    }

    /// Reads a string list; `None` when absent or of another kind.
    pub fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        let result = self
            .get_raw(key)
            .map(|raw| raw.and_then(|bytes| decode_string_list(&bytes)));
        self.report("get_string_list", result, None)
    }

    /// Stores a string list.
    pub fn set_string_list<S: AsRef<str>>(&self, key: &str, value: &[S]) -> bool {
        let result = self.set_raw(key, encode_string_list(value));
        self.report("set_string_list", result.map(|()| true), false)
    }

    /// Returns true when `key` holds an unexpired value.
    pub fn contains_key(&self, key: &str) -> bool {
        let result = self.get_raw(key).map(|raw| raw.is_some());
        self.report("contains_key", result, false)
    }

    /// Removes one key. Returns false when the removal could not be
    /// persisted.
    pub fn remove_value_for_key(&self, key: &str) -> bool {
        self.remove_values_for_keys(&[key])
    }

    /// Removes several keys; missing keys are ignored.
    pub fn remove_values_for_keys<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        let result = self.with_state(LockKind::Exclusive, |state| {
            state.load(&self.id)?;
            for key in keys {
                let key = key.as_ref();
                if state.entries.remove(key).is_none() {
                    continue;
                }
                let frame = Record::Remove {
                    key: key.to_owned(),
                }
                .encode_frame(state.manager())?;
                state.persist(&self.id, &frame)?;
            }
            Ok(())
        });
        self.report("remove", result.map(|()| true), false)
    }

    /// Returns every unexpired key in ascending order.
    pub fn all_keys(&self) -> Vec<String> {
        let result = self.with_state(LockKind::Shared, |state| {
            state.load(&self.id)?;
            let now = now_secs();
            Ok(state
                .entries
                .iter()
                .filter(|(_, entry)| !entry.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect())
        });
        self.report("all_keys", result, Vec::new())
    }

    /// Number of unexpired keys.
    pub fn count(&self) -> usize {
        let result = self.with_state(LockKind::Shared, |state| {
            state.load(&self.id)?;
            let now = now_secs();
            Ok(state
                .entries
                .values()
                .filter(|entry| !entry.is_expired(now))
                .count())
        });
        self.report("count", result, 0)
    }

    /// Bytes of log in use, excluding the header.
    pub fn actual_size(&self) -> u64 {
        let result = self.with_state(LockKind::Shared, |state| {
            Ok(state.log_mut(&self.id)?.actual_size())
        });
        self.report("actual_size", result, 0)
    }

    /// Size of the backing file.
    pub fn total_size(&self) -> u64 {
        let result = self.with_state(LockKind::Shared, |state| {
            state.log_mut(&self.id)?.total_size()
        });
        self.report("total_size", result, 0)
    }

    /// Drops the decoded map; it is reloaded from disk on next access.
    pub fn clear_memory_cache(&self) {
        let _deferral = defer_handler();
        let mut state = self.state.lock();
        if state.log.is_some() {
            state.invalidate();
            log_debug!("[{}] memory cache cleared", self.id);
        }
    }

    /// Removes every key and shrinks the file to one page.
    pub fn clear_all(&self) {
        let result = self.with_state(LockKind::Exclusive, |state| {
            let flags = state.flags();
            state.log_mut(&self.id)?.reset(flags)?;
            state.entries.clear();
            state.loaded = true;
            Ok(())
        });
        if result.is_ok() {
            log_info!("cleared [{}]", self.id);
        }
        self.report("clear_all", result, ());
    }

    /// Pushes written data towards disk.
    pub fn sync(&self, flag: SyncFlag) {
        let result = self.with_state(LockKind::Shared, |state| {
            let log = state.log_mut(&self.id)?;
            match flag {
                SyncFlag::Sync => log.sync(),
                SyncFlag::Async => log.flush(),
            }
        });
        self.report("sync", result, ());
    }

    /// Compacts the log and shrinks the file to the smallest page multiple
    /// that holds it.
    pub fn trim(&self) {
        let result = self.with_state(LockKind::Exclusive, |state| {
            state.load(&self.id)?;
            let before = state.log_mut(&self.id)?.total_size()?;
            state.write_back(&self.id)?;
            let log = state.log_mut(&self.id)?;
            log.shrink_to_fit()?;
            Ok((before, log.total_size()?))
        });
        if let Ok((before, after)) = &result {
            log_info!("trimmed [{}] from {before} to {after} bytes", self.id);
        }
        self.report("trim", result.map(|_| ()), ());
    }

    /// Changes the crypt key, re-encrypting the whole log.
    ///
    /// `None` or an empty key removes encryption. Returns true when the
    /// instance ends up under the requested key.
    pub fn check_reset_crypt_key(&self, crypt_key: Option<&str>) -> bool {
        let crypt_key = crypt_key.filter(|k| !k.is_empty());
        let result = self.with_state(LockKind::Exclusive, |state| {
            let current = state.cipher.as_ref().map(|c| c.passphrase.as_str());
            if current == crypt_key {
                return Ok(());
            }

            state.load(&self.id)?;
            state.cipher = crypt_key.map(Cipher::derive).transpose()?;
            let written = state.write_back(&self.id);
            if written.is_err() {
                state.invalidate();
            }
            written
        });
        if result.is_ok() {
            log_info!(
                "[{}] crypt key {}",
                self.id,
                if crypt_key.is_some() { "set" } else { "removed" }
            );
        }
        self.report("check_reset_crypt_key", result.map(|()| true), false)
    }

    /// Gives new writes a lifetime of `seconds` (0 = never expire).
    pub fn enable_auto_key_expire(&self, seconds: u32) -> bool {
        let result = self.with_state(LockKind::Exclusive, |state| {
            state.log_mut(&self.id)?;
            state.auto_expire = Some(seconds);
            Ok(true)
        });
        self.report("enable_auto_key_expire", result, false)
    }

    /// Stops expiring keys; keys that have not expired yet become permanent.
    ///
    /// Engine-only, like a non-zero [`enable_auto_key_expire`](Self::enable_auto_key_expire).
    pub fn disable_auto_key_expire(&self) -> bool {
        let result = self.with_state(LockKind::Exclusive, |state| {
            state.load(&self.id)?;
            state.auto_expire = None;
            let now = now_secs();
            state.entries.retain(|_, entry| !entry.is_expired(now));
            if state.entries.values().any(|entry| entry.expire_at != 0) {
                for entry in state.entries.values_mut() {
                    entry.expire_at = 0;
                }
                state.write_back(&self.id)?;
            }
            Ok(true)
        });
        self.report("disable_auto_key_expire", result, false)
    }

    /// Identifier of this instance.
    #[must_use]
    pub fn mmap_id(&self) -> &str {
        &self.id
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Access mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns true after [`close`](Self::close).
    pub fn is_closed(&self) -> bool {
        self.state.lock().log.is_none()
    }

    /// Syncs and releases the file. Later calls see an empty, read-only
    /// instance; reopening the id yields a fresh one.
    pub fn close(&self) {
        let _deferral = defer_handler();
        let closed = {
            let mut state = self.state.lock();
            match state.log.take() {
                Some(mut log) => {
                    if let Err(err) = log.sync() {
                        log_error!("[{}] sync on close failed: {err}", self.id);
                    }
                    state.invalidate();
                    true
                }
                None => false,
            }
        };

        if closed {
            registry::forget(&self.path, self);
            log_info!("closed [{}]", self.id);
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{register_error_handler, unregister_error_handler};
    use std::fs;
    use tempfile::TempDir;

    fn open(dir: &TempDir, id: &str) -> Arc<Store> {
        Store::with_id(id, Mode::SingleProcess, None, Some(dir.path())).unwrap()
    }

    fn reopen(dir: &TempDir, store: Arc<Store>) -> Arc<Store> {
        let id = store.mmap_id().to_owned();
        store.close();
        open(dir, &id)
    }

    #[test]
    fn scalars_roundtrip_and_persist() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "scalars");

        assert!(store.set_i32("i32", -7));
        assert!(store.set_u32("u32", u32::MAX));
        assert!(store.set_i64("i64", i64::MIN));
        assert!(store.set_u64("u64", u64::MAX));
        assert!(store.set_f32("f32", 1.5));
        assert!(store.set_f64("f64", -0.25));
        assert!(store.set_bool("bool", true));

        let store = reopen(&dir, store);
        assert_eq!(store.get_i32("i32", 0), -7);
        assert_eq!(store.get_u32("u32", 0), u32::MAX);
        assert_eq!(store.get_i64("i64", 0), i64::MIN);
        assert_eq!(store.get_u64("u64", 0), u64::MAX);
        assert_eq!(store.get_f32("f32", 0.0), 1.5);
        assert_eq!(store.get_f64("f64", 0.0), -0.25);
        assert!(store.get_bool("bool", false));
    }

    #[test]
    fn absent_and_mismatched_kinds_read_default() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "kinds");

        assert_eq!(store.get_i32("missing", 42), 42);
        assert!(store.set_f64("double", 2.0));
        assert_eq!(store.get_i32("double", 9), 9);
        assert!(store.get_string_list("double").is_none());
    }

    #[test]
    fn strings_bytes_and_lists() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "blobs");

        assert!(store.set_string("s", "hello"));
        assert!(store.set_bytes("b", &[0, 1, 2]));
        assert!(store.set_bytes("empty", &[]));
        assert!(store.set_string_list("l", &["a", "", "c"]));

        let store = reopen(&dir, store);
        assert_eq!(store.get_string("s").as_deref(), Some("hello"));
        assert_eq!(store.get_bytes("b"), Some(vec![0, 1, 2]));
        assert_eq!(store.get_bytes("empty"), Some(Vec::new()));
        assert_eq!(
            store.get_string_list("l"),
            Some(vec!["a".to_owned(), String::new(), "c".to_owned()])
        );
        assert!(store.get_bytes("nope").is_none());
    }

    #[test]
    fn empty_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "empty-key");
        assert!(!store.set_i32("", 1));
        assert_eq!(store.get_i32("", 5), 5);
        assert!(!store.contains_key(""));
    }

    #[test]
    fn remove_and_keys() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "remove");
        for key in ["a", "b", "c", "d"] {
            assert!(store.set_i32(key, 1));
        }

        assert!(store.remove_value_for_key("a"));
        assert!(store.remove_values_for_keys(&["b", "zzz"]));
        assert!(!store.contains_key("a"));
        assert_eq!(store.all_keys(), vec!["c".to_owned(), "d".to_owned()]);

        let store = reopen(&dir, store);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn same_id_shares_instance() {
        let dir = TempDir::new().unwrap();
        let a = open(&dir, "shared");
        let b = open(&dir, "shared");
        assert!(Arc::ptr_eq(&a, &b));

        a.set_i32("k", 3);
        assert_eq!(b.get_i32("k", 0), 3);
    }

    #[test]
    fn closed_instance_is_inert() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "closed");
        store.set_i32("k", 1);
        store.close();

        assert!(store.is_closed());
        assert_eq!(store.get_i32("k", -1), -1);
        assert!(!store.set_i32("k", 2));
        assert_eq!(store.count(), 0);
        assert!(store.all_keys().is_empty());
        store.close();

        let fresh = open(&dir, "closed");
        assert!(!Arc::ptr_eq(&store, &fresh));
        assert_eq!(fresh.get_i32("k", -1), 1);
    }

    #[test]
    fn growth_compaction_and_trim() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "grow");
        let value = vec![7u8; 1000];

        for i in 0..20 {
            assert!(store.set_bytes(&format!("k{i}"), &value));
        }
        let grown = store.total_size();
        assert!(grown > DEFAULT_MMAP_SIZE);
        assert_eq!(grown % DEFAULT_MMAP_SIZE, 0);

        // Overwriting the same key forces compaction instead of growth.
        for _ in 0..50 {
            assert!(store.set_bytes("k0", &value));
        }
        assert_eq!(store.count(), 20);

        let rest: Vec<String> = (1..20).map(|i| format!("k{i}")).collect();
        assert!(store.remove_values_for_keys(&rest));
        store.trim();
        assert_eq!(store.total_size(), DEFAULT_MMAP_SIZE);
        assert_eq!(store.get_bytes("k0"), Some(value));
    }

    #[test]
    fn clear_all_and_memory_cache() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "clear");
        store.set_string("a", "1");

        store.clear_memory_cache();
        assert_eq!(store.get_string("a").as_deref(), Some("1"));

        store.clear_all();
        assert_eq!(store.count(), 0);
        assert_eq!(store.actual_size(), 0);
        assert_eq!(store.total_size(), DEFAULT_MMAP_SIZE);
    }

    #[test]
    fn encryption_and_key_rotation() {
        let dir = TempDir::new().unwrap();
        let store = Store::with_id("secret", Mode::SingleProcess, Some("k1"), Some(dir.path()))
            .unwrap();
        store.set_string("token", "plain-text-marker");
        store.sync(SyncFlag::Sync);

        let raw = fs::read(store.path()).unwrap();
        assert!(!raw
            .windows(b"plain-text-marker".len())
            .any(|w| w == b"plain-text-marker"));

        assert!(store.check_reset_crypt_key(Some("k2")));
        store.close();

        let store = Store::with_id("secret", Mode::SingleProcess, Some("k2"), Some(dir.path()))
            .unwrap();
        assert_eq!(store.get_string("token").as_deref(), Some("plain-text-marker"));

        assert!(store.check_reset_crypt_key(None));
        store.close();
        let store = open(&dir, "secret");
        assert_eq!(store.get_string("token").as_deref(), Some("plain-text-marker"));
    }

    #[test]
    fn expiry() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "expiry");

        assert!(store.enable_auto_key_expire(crate::EXPIRE_NEVER));
        store.set_i32("forever", 1);
        assert_eq!(store.get_i32("forever", 0), 1);

        {
            let mut state = store.state.lock();
            state.entries.insert(
                "stale".into(),
                Entry {
                    value: encode_scalar(5i32),
                    expire_at: 1,
                },
            );
        }
        assert!(!store.contains_key("stale"));
        assert_eq!(store.count(), 1);

        assert!(store.enable_auto_key_expire(3600));
        store.set_i32("hour", 2);
        assert!(store.disable_auto_key_expire());
        let store = reopen(&dir, store);
        assert_eq!(store.get_i32("hour", 0), 2);
    }

    fn recover(_: &str, _: ErrorKind) -> RecoverStrategy {
        RecoverStrategy::Recover
    }

    #[test]
    fn corruption_follows_error_handler() {
        let dir = TempDir::new().unwrap();

        let corrupt_last_byte = |store: Arc<Store>| {
            let path = store.path().to_path_buf();
            let end = 24 + store.actual_size() as usize;
            store.close();
            let mut raw = fs::read(&path).unwrap();
            raw[end - 1] ^= 0xFF;
            fs::write(&path, raw).unwrap();
        };

        // Default strategy discards everything.
        let store = open(&dir, "discard");
        store.set_i32("a", 1);
        store.set_i32("b", 2);
        corrupt_last_byte(store);
        let store = open(&dir, "discard");
        assert_eq!(store.count(), 0);

        // Recover keeps the records before the bad one.
        register_error_handler(recover);
        let store = open(&dir, "recover");
        store.set_i32("a", 1);
        store.set_i32("b", 2);
        corrupt_last_byte(store);
        let store = open(&dir, "recover");
        unregister_error_handler();
        assert_eq!(store.get_i32("a", 0), 1);
        assert!(!store.contains_key("b"));
    }

    #[test]
    fn multi_process_sees_foreign_writes() {
        let dir = TempDir::new().unwrap();
        let store =
            Store::with_id("shared-file", Mode::MultiProcess, None, Some(dir.path())).unwrap();
        store.set_i32("a", 1);

        // A second, independent view of the same file.
        let other = Store::create(
            "shared-file".into(),
            store.path().to_path_buf(),
            Mode::MultiProcess,
            None,
            None,
        )
        .unwrap();
        other.set_i32("b", 2);

        assert_eq!(store.get_i32("b", 0), 2);
        assert_eq!(store.count(), 2);
    }
}
