//! Engine logging: global level, log handler and error handler.
//!
//! Every engine log record is emitted as a `tracing` event and, when a
//! [`LogHandler`] is registered, handed to it with the source location.
//! Handlers are plain function pointers read under a short lock and called
//! after the lock is released, so a handler may re-register itself.
//!
//! Records emitted while an engine lock is held are queued on the emitting
//! thread by a [`Deferral`] and handed to the handler once the outermost
//! deferral is dropped. A handler may therefore call back into the engine,
//! including the instance that logged.

use parking_lot::RwLock;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI32, Ordering};

/// Severity of an engine log record.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug = 0,
    /// Lifecycle events (open, load, close).
    Info = 1,
    /// Recoverable problems.
    Warning = 2,
    /// Failed operations.
    Error = 3,
    /// Logging disabled.
    None = 4,
}

impl LogLevel {
    /// Decodes a raw level, clamping out-of-range values.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            i32::MIN..=0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Warning,
            3 => Self::Error,
            _ => Self::None,
        }
    }

    /// Returns the raw level value.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }
}

/// Receives engine log records: level, source file, line, function, message.
pub type LogHandler = fn(LogLevel, &str, u32, &str, &str);

/// Kind of on-disk inconsistency reported to the [`ErrorHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A record failed its checksum or could not be decoded.
    CrcCheckFail,
    /// The header's recorded length does not match the file.
    FileLength,
}

/// What the engine should do with an inconsistent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoverStrategy {
    /// Drop all data and start empty.
    #[default]
    Discard,
    /// Keep every record before the first bad one.
    Recover,
}

/// Decides how to handle an inconsistent instance, given its identifier.
pub type ErrorHandler = fn(&str, ErrorKind) -> RecoverStrategy;

static LOG_LEVEL: AtomicI32 = AtomicI32::new(LogLevel::Info as i32);
static LOG_HANDLER: RwLock<Option<LogHandler>> = RwLock::new(None);
static ERROR_HANDLER: RwLock<Option<ErrorHandler>> = RwLock::new(None);

/// Sets the minimum level of records that are emitted.
pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level.as_raw(), Ordering::Relaxed);
}

/// Returns the minimum level of records that are emitted.
#[must_use]
pub fn log_level() -> LogLevel {
    LogLevel::from_raw(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Registers the process-wide log handler, replacing any previous one.
pub fn register_log_handler(handler: LogHandler) {
    *LOG_HANDLER.write() = Some(handler);
}

/// Removes the process-wide log handler.
pub fn unregister_log_handler() {
    *LOG_HANDLER.write() = None;
}

/// Registers the process-wide error handler, replacing any previous one.
pub fn register_error_handler(handler: ErrorHandler) {
    *ERROR_HANDLER.write() = Some(handler);
}

/// Removes the process-wide error handler.
pub fn unregister_error_handler() {
    *ERROR_HANDLER.write() = None;
}

/// Asks the registered error handler what to do; `Discard` when none is set.
///
/// Unlike log records this runs while the instance is locked, so the error
/// handler must not call back into the instance it is asked about.
pub(crate) fn on_error(id: &str, kind: ErrorKind) -> RecoverStrategy {
    let handler = *ERROR_HANDLER.read();
    handler.map_or(RecoverStrategy::default(), |h| h(id, kind))
}

struct Pending {
    level: LogLevel,
    file: &'static str,
    line: u32,
    function: &'static str,
    message: String,
}

thread_local! {
    static DEFER_DEPTH: Cell<usize> = const { Cell::new(0) };
    static PENDING: RefCell<Vec<Pending>> = const { RefCell::new(Vec::new()) };
}

/// Holds back log handler calls on the current thread until dropped.
///
/// Take one before acquiring an engine lock and keep it alive past the lock
/// guard. Deferrals nest; only the outermost one flushes.
#[must_use]
pub(crate) struct Deferral {
    _thread_bound: PhantomData<*const ()>,
}

pub(crate) fn defer_handler() -> Deferral {
    DEFER_DEPTH.with(|depth| depth.set(depth.get() + 1));
    Deferral {
        _thread_bound: PhantomData,
    }
}

impl Drop for Deferral {
    fn drop(&mut self) {
        let outermost = DEFER_DEPTH.with(|depth| {
            let left = depth.get().saturating_sub(1);
            depth.set(left);
            left == 0
        });
        if !outermost {
            return;
        }

        let pending = PENDING.with(|queue| std::mem::take(&mut *queue.borrow_mut()));
        if pending.is_empty() {
            return;
        }
        let handler = *LOG_HANDLER.read();
        if let Some(handler) = handler {
            for record in pending {
                handler(
                    record.level,
                    record.file,
                    record.line,
                    record.function,
                    &record.message,
                );
            }
        }
    }
}

/// Emits one log record. Use the `log_*!` macros instead.
#[doc(hidden)]
pub fn emit(
    level: LogLevel,
    file: &'static str,
    line: u32,
    function: &'static str,
    args: fmt::Arguments<'_>,
) {
    if level == LogLevel::None || level < log_level() {
        return;
    }

    let message = fmt::format(args);
    match level {
        LogLevel::Debug => {
            tracing::debug!(source_file = file, source_line = line, "{message}");
        }
        LogLevel::Info => {
            tracing::info!(source_file = file, source_line = line, "{message}");
        }
        LogLevel::Warning => {
            tracing::warn!(source_file = file, source_line = line, "{message}");
        }
        LogLevel::Error | LogLevel::None => {
            tracing::error!(source_file = file, source_line = line, "{message}");
        }
    }

    if DEFER_DEPTH.with(Cell::get) > 0 {
        PENDING.with(|queue| {
            queue.borrow_mut().push(Pending {
                level,
                file,
                line,
                function,
                message,
            });
        });
        return;
    }

    let handler = *LOG_HANDLER.read();
    if let Some(handler) = handler {
        handler(level, file, line, function, &message);
    }
}

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        $crate::log::emit($level, file!(), line!(), module_path!(), format_args!($($arg)+))
    };
}

macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::log::log_at!($crate::log::LogLevel::Debug, $($arg)+) };
}

macro_rules! log_info {
    ($($arg:tt)+) => { $crate::log::log_at!($crate::log::LogLevel::Info, $($arg)+) };
}

macro_rules! log_warn {
    ($($arg:tt)+) => { $crate::log::log_at!($crate::log::LogLevel::Warning, $($arg)+) };
}

macro_rules! log_error {
    ($($arg:tt)+) => { $crate::log::log_at!($crate::log::LogLevel::Error, $($arg)+) };
}

pub(crate) use {log_at, log_debug, log_error, log_info, log_warn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_from_raw_clamps() {
        assert_eq!(LogLevel::from_raw(-3), LogLevel::Debug);
        assert_eq!(LogLevel::from_raw(0), LogLevel::Debug);
        assert_eq!(LogLevel::from_raw(1), LogLevel::Info);
        assert_eq!(LogLevel::from_raw(2), LogLevel::Warning);
        assert_eq!(LogLevel::from_raw(3), LogLevel::Error);
        assert_eq!(LogLevel::from_raw(4), LogLevel::None);
        assert_eq!(LogLevel::from_raw(99), LogLevel::None);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::None);
    }

    #[test]
    fn default_strategy_is_discard() {
        assert_eq!(RecoverStrategy::default(), RecoverStrategy::Discard);
    }

    static SEEN: parking_lot::Mutex<Vec<String>> = parking_lot::Mutex::new(Vec::new());

    fn record_deferral_messages(_: LogLevel, _: &str, _: u32, _: &str, message: &str) {
        if message.starts_with("deferral check") {
            SEEN.lock().push(message.to_owned());
        }
    }

    #[test]
    fn deferred_records_reach_handler_after_outermost_release() {
        register_log_handler(record_deferral_messages);
        {
            let _outer = defer_handler();
            log_warn!("deferral check one");
            {
                let _inner = defer_handler();
                log_warn!("deferral check two");
            }
            assert!(SEEN.lock().is_empty());
        }
        assert_eq!(*SEEN.lock(), ["deferral check one", "deferral check two"]);

        log_warn!("deferral check three");
        assert_eq!(SEEN.lock().len(), 3);
        unregister_log_handler();
    }
}
