//! Process-wide engine state: the default root and the instance dictionary.

use crate::config::{StoreConfig, SyncFlag};
use crate::error::{CoreError, CoreResult};
use crate::log::{self, defer_handler, log_info, LogHandler, LogLevel};
use crate::store::Store;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static ROOT_DIR: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Open instances keyed by file path.
static INSTANCES: Mutex<BTreeMap<PathBuf, Arc<Store>>> = Mutex::new(BTreeMap::new());

/// Initializes the engine.
///
/// Creates `root` if missing and makes it the process-default root, sets the
/// log level and installs (or, with `None`, removes) the log handler. Later
/// calls replace all three.
pub fn initialize(root: &Path, level: LogLevel, handler: Option<LogHandler>) -> CoreResult<()> {
    if root.as_os_str().is_empty() {
        return Err(CoreError::invalid_argument("empty root directory"));
    }
    fs::create_dir_all(root)?;

    *ROOT_DIR.write() = Some(root.to_path_buf());
    log::set_log_level(level);
    match handler {
        Some(handler) => log::register_log_handler(handler),
        None => log::unregister_log_handler(),
    }

    log_info!("initialized with root {}", root.display());
    Ok(())
}

/// Returns the process-default root, if [`initialize`] was called.
#[must_use]
pub fn root_dir() -> Option<PathBuf> {
    ROOT_DIR.read().clone()
}

fn check_id(id: &str) -> CoreResult<()> {
    if id.is_empty() {
        return Err(CoreError::invalid_argument("empty instance id"));
    }
    if id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(CoreError::invalid_argument(format!(
            "instance id {id:?} is not a file name"
        )));
    }
    Ok(())
}

fn resolve_root(root: Option<PathBuf>) -> CoreResult<PathBuf> {
    match root {
        Some(root) if root.as_os_str().is_empty() => {
            Err(CoreError::invalid_argument("empty root directory"))
        }
        Some(root) => Ok(root),
        None => root_dir().ok_or(CoreError::NotInitialized),
    }
}

pub(crate) fn open_instance(config: StoreConfig) -> CoreResult<Arc<Store>> {
    check_id(&config.id)?;
    let path = resolve_root(config.root_dir)?.join(&config.id);

    // Loading logs; the handler runs once the dictionary is unlocked.
    let _deferral = defer_handler();
    let mut instances = INSTANCES.lock();
    if let Some(store) = instances.get(&path) {
        return Ok(Arc::clone(store));
    }

    let store = Arc::new(Store::create(
        config.id,
        path.clone(),
        config.mode,
        config.crypt_key.as_deref(),
        config.auto_expire,
    )?);
    instances.insert(path, Arc::clone(&store));
    Ok(store)
}

/// Drops `store` from the dictionary if it is still the entry for `path`.
pub(crate) fn forget(path: &Path, store: &Store) {
    let mut instances = INSTANCES.lock();
    if instances
        .get(path)
        .is_some_and(|open| std::ptr::eq(Arc::as_ptr(open), store))
    {
        instances.remove(path);
    }
}

/// Copies the file of instance `id` into `dst_dir`.
///
/// The source is `src_root/id`, or `id` under the process-default root when
/// `src_root` is `None`. An open instance is synced first.
pub fn backup_one_to_directory(
    id: &str,
    dst_dir: &Path,
    src_root: Option<&Path>,
) -> CoreResult<()> {
    check_id(id)?;
    if dst_dir.as_os_str().is_empty() {
        return Err(CoreError::invalid_argument("empty backup directory"));
    }
    let src = resolve_root(src_root.map(Path::to_path_buf))?.join(id);

    let open = INSTANCES.lock().get(&src).cloned();
    if let Some(store) = open {
        store.sync(SyncFlag::Sync);
    }

    fs::create_dir_all(dst_dir)?;
    let copied = fs::copy(&src, dst_dir.join(id))?;
    log_info!("backed up [{id}] to {} ({copied} bytes)", dst_dir.display());
    Ok(())
}
