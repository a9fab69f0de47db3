//! Instance configuration.

use std::fmt;
use std::path::PathBuf;

/// Identifier of the instance opened by [`Store::default_store`](crate::Store::default_store).
pub const DEFAULT_MMAP_ID: &str = "mmkv.default";

/// Expiry duration meaning "keys never expire" while auto-expiry is enabled.
pub const EXPIRE_NEVER: u32 = 0;

/// Access mode of an instance.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Only this process touches the file.
    #[default]
    SingleProcess = 1,
    /// Several processes share the file under an advisory lock.
    MultiProcess = 2,
}

impl Mode {
    /// Decodes the raw mode flags used at the C boundary.
    ///
    /// Any value with the multi-process bit set is multi-process; everything
    /// else, including unknown values, is single-process.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        if raw & (Self::MultiProcess as i32) != 0 {
            Self::MultiProcess
        } else {
            Self::SingleProcess
        }
    }

    /// Returns the raw flag value.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }
}

/// How hard [`Store::sync`](crate::Store::sync) pushes data towards disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFlag {
    /// Wait until data and metadata are durable.
    Sync,
    /// Hand buffered writes to the OS and return.
    Async,
}

impl From<bool> for SyncFlag {
    fn from(sync: bool) -> Self {
        if sync {
            Self::Sync
        } else {
            Self::Async
        }
    }
}

/// Configuration for opening an instance.
#[derive(Clone)]
pub struct StoreConfig {
    /// Instance identifier; also the file name under the root directory.
    pub id: String,

    /// Single- or multi-process access.
    pub mode: Mode,

    /// Passphrase the payload encryption key is derived from.
    pub crypt_key: Option<String>,

    /// Root directory override (None = process-default root).
    pub root_dir: Option<PathBuf>,

    /// Default expiry for new writes, in seconds (None = auto-expiry off).
    pub auto_expire: Option<u32>,
}

impl StoreConfig {
    /// Creates a configuration for the given identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mode: Mode::SingleProcess,
            crypt_key: None,
            root_dir: None,
            auto_expire: None,
        }
    }

    /// Sets the access mode.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the crypt key. An empty key means no encryption.
    #[must_use]
    pub fn crypt_key(mut self, key: Option<&str>) -> Self {
        self.crypt_key = key.filter(|k| !k.is_empty()).map(str::to_owned);
        self
    }

    /// Sets the root directory override.
    #[must_use]
    pub fn root_dir(mut self, root: Option<PathBuf>) -> Self {
        self.root_dir = root;
        self
    }

    /// Enables auto-expiry with the given default duration in seconds.
    ///
    /// Engine-only; instances opened through the C ABI never expire keys.
    #[must_use]
    pub fn auto_expire(mut self, seconds: Option<u32>) -> Self {
        self.auto_expire = seconds;
        self
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("crypt_key", &self.crypt_key.as_ref().map(|_| "[REDACTED]"))
            .field("root_dir", &self.root_dir)
            .field("auto_expire", &self.auto_expire)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_from_raw() {
        assert_eq!(Mode::from_raw(1), Mode::SingleProcess);
        assert_eq!(Mode::from_raw(2), Mode::MultiProcess);
        assert_eq!(Mode::from_raw(3), Mode::MultiProcess);
        assert_eq!(Mode::from_raw(0), Mode::SingleProcess);
        assert_eq!(Mode::from_raw(-1), Mode::MultiProcess);
        assert_eq!(Mode::MultiProcess.as_raw(), 2);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new("cache")
            .mode(Mode::MultiProcess)
            .crypt_key(Some("secret"))
            .root_dir(Some(PathBuf::from("/tmp/x")))
            .auto_expire(Some(60));

        assert_eq!(config.id, "cache");
        assert_eq!(config.mode, Mode::MultiProcess);
        assert_eq!(config.crypt_key.as_deref(), Some("secret"));
        assert_eq!(config.root_dir, Some(PathBuf::from("/tmp/x")));
        assert_eq!(config.auto_expire, Some(60));
    }

    #[test]
    fn empty_crypt_key_means_none() {
        let config = StoreConfig::new("a").crypt_key(Some(""));
        assert!(config.crypt_key.is_none());
    }

    #[test]
    fn debug_redacts_crypt_key() {
        let config = StoreConfig::new("a").crypt_key(Some("hunter2"));
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn sync_flag_from_bool() {
        assert_eq!(SyncFlag::from(true), SyncFlag::Sync);
        assert_eq!(SyncFlag::from(false), SyncFlag::Async);
    }
}
