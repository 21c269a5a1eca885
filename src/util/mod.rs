pub mod mem_watcher;

use std::time::{Duration, Instant};

use crate::util::mem_watcher::MemoryWatcher;

/// Wall-clock time and peak resident memory of one analysis phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub elapsed: Duration,
    pub peak_memory_kb: Option<u64>,
}

/// Runs `phase` under a timer and a memory watcher.
pub fn measured<T>(phase: impl FnOnce() -> T) -> (T, Measurement) {
    let mut watcher = MemoryWatcher::new();
    watcher.start();
    let start = Instant::now();
    let value = phase();
    let elapsed = start.elapsed();
    let peak_memory_kb = watcher.stop();
    (
        value,
        Measurement {
            elapsed,
            peak_memory_kb,
        },
    )
}
