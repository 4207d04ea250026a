//! Tracks metadata for a compilation session.

use crate::log;

/// Metadata for a compilation session.
///
/// When the calling program first uses one of the API entry points
/// (e.g. `Compiler::new()`), there is no context yet where the library's
/// code may start to track things.  This struct provides that context.
/// It is created once per compilation, is cheap to clone, and is passed
/// down to every phase; there is no process-wide mutable state anywhere
/// in the crate.
#[derive(Clone)]
pub struct Session {
    log_enabled: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            log_enabled: log::log_enabled(),
        }
    }

    pub fn new_for_test_suite() -> Self {
        Self { log_enabled: false }
    }

    pub fn log_enabled(&self) -> bool {
        self.log_enabled
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
