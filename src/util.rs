//! Utility functions for timing and debugging.

use std::time::Instant;

/// RAII timer that logs elapsed time on drop.
///
/// # Example
/// ```ignore
/// let _t = Timed::info("Correspondence");
/// // ... do work ...
/// // logs "Correspondence: 1.234s" when _t is dropped
/// ```
pub struct Timed {
    name: String,
    start: Instant,
    level: log::Level,
}

impl Timed {
    /// Timer that reports at INFO level.
    pub fn info(name: impl Into<String>) -> Self {
        Self::start(name.into(), log::Level::Info)
    }

    /// Timer that reports at DEBUG level.
    pub fn debug(name: impl Into<String>) -> Self {
        Self::start(name.into(), log::Level::Debug)
    }

    fn start(name: String, level: log::Level) -> Self {
        log::trace!("{}...", name);
        Self {
            name,
            start: Instant::now(),
            level,
        }
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        log::log!(self.level, "{}: {:.3?}", self.name, elapsed);
    }
}
