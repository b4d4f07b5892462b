use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Local};

/// A paired reading: the monotonic instant drives the countdown, the wall
/// time is what gets written to history.
#[derive(Clone, Copy, Debug)]
pub struct TimeSample {
    pub monotonic: Instant,
    pub wall: DateTime<Local>,
}

pub trait TimeProvider: Send + Sync {
    fn now(&self) -> TimeSample;
}

/// Reads the OS clocks; monotonic readings never go backward even if the
/// platform clock misbehaves.
pub struct SystemTimeProvider {
    last_monotonic: Mutex<Option<Instant>>,
}

impl SystemTimeProvider {
    pub fn new() -> Self {
        Self {
            last_monotonic: Mutex::new(None),
        }
    }
}

impl Default for SystemTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> TimeSample {
        let proposed = Instant::now();
        let monotonic = match self.last_monotonic.lock() {
            Ok(mut guard) => {
                let clamped = guard.map_or(proposed, |last| last.max(proposed));
                *guard = Some(clamped);
                clamped
            }
            Err(_) => proposed,
        };
        TimeSample {
            monotonic,
            wall: Local::now(),
        }
    }
}
