// src/dev_utils.rs

use std::time::Instant;

/// A simple RAII timer for profiling blocking sections.
/// When it goes out of scope, the elapsed time is logged at debug level.
#[derive(Debug)]
pub struct BlockTimer {
    name: String,
    start: Instant,
}

impl BlockTimer {
    /// Creates a new timer and starts it immediately.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for BlockTimer {
    fn drop(&mut self) {
        log::debug!(
            "PROFILE [{}]: {} ms",
            self.name,
            self.start.elapsed().as_millis()
        );
    }
}
