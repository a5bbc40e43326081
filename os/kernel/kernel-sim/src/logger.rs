use crate::sim_trace;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::sync::OnceLock;
use std::thread;

/// Environment variable selecting the log level (`error` .. `trace`, `off`).
pub const LOG_LEVEL_VAR: &str = "KERNEL_LOG";

/// `log` backend writing `[LEVEL] (thread) target: message` lines to stderr.
pub struct SimLogger {
    max_level: LevelFilter,
}

impl SimLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Reads the level from [`LOG_LEVEL_VAR`], defaulting to `warn`.
    #[must_use]
    pub fn from_env() -> Self {
        let level = std::env::var(LOG_LEVEL_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(LevelFilter::Warn);
        Self::new(level)
    }

    /// Installs the logger. Only the first call in a process succeeds.
    #[allow(clippy::missing_errors_doc)]
    pub fn init(self) -> Result<(), SetLoggerError> {
        static LOGGER: OnceLock<SimLogger> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| self);
        log::set_logger(logger)?;
        log::set_max_level(logger.max_level);
        Ok(())
    }
}

/// Installs a [`SimLogger::from_env`] logger unless one is already set.
///
/// Tests call this first thing; repeated calls are harmless.
pub fn init_from_env() {
    let _ = SimLogger::from_env().init();
}

impl Log for SimLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let current = thread::current();
        sim_trace!(
            "[{}] ({}) {}: {}\n",
            record.level(),
            current.name().unwrap_or("?"),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}
