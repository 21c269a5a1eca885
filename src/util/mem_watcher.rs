use std::fs;
use std::io::{Error, ErrorKind, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nom::IResult;
use nom::Parser;
use nom::bytes::complete::tag;
use nom::character::complete::digit1;
use nom::combinator::map_res;
use nom::multi::count;
use nom::sequence::terminated;

const SAMPLE_INTERVAL: Duration = Duration::from_millis(20);

/// `/proc/<pid>/statm`, all values in pages.
#[derive(Debug, Default, PartialEq, Eq, Hash)]
pub struct Statm {
    pub size: usize,

    pub resident: usize,

    pub share: usize,

    pub text: usize,

    pub data: usize,
}

/// Samples the resident set of this process in a background thread and
/// keeps the maximum.
pub struct MemoryWatcher {
    peak_resident: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Default for MemoryWatcher {
    fn default() -> Self {
        MemoryWatcher {
            peak_resident: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl MemoryWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        sample_into(&self.peak_resident);
        self.running.store(true, Ordering::SeqCst);
        let peak = Arc::clone(&self.peak_resident);
        let running = Arc::clone(&self.running);
        self.handle = Some(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                sample_into(&peak);
                thread::sleep(SAMPLE_INTERVAL);
            }
        }));
    }

    /// Stops sampling and returns the peak resident set in KiB, or `None`
    /// when procfs is unavailable.
    pub fn stop(&mut self) -> Option<u64> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("memory sampling thread panicked");
            }
        }
        sample_into(&self.peak_resident);

        let pages = self.peak_resident.load(Ordering::SeqCst);
        if pages == 0 {
            return None;
        }
        let peak = rss_in_kilobytes(pages);
        log::debug!("peak resident memory: {} MB", peak / 1024);
        Some(peak)
    }
}

impl Drop for MemoryWatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn sample_into(peak: &AtomicUsize) {
    if let Ok(statm) = statm_self() {
        peak.fetch_max(statm.resident, Ordering::SeqCst);
    }
}

fn page_size() -> u64 {
    // SAFETY: sysconf only reads a configuration value.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4096 }
}

pub fn rss_in_kilobytes(rss_pages: usize) -> u64 {
    rss_pages as u64 * page_size() / 1024
}

pub fn map_result<T>(result: IResult<&str, T>) -> Result<T> {
    match result {
        IResult::Ok((remaining, val)) => {
            if remaining.is_empty() {
                Result::Ok(val)
            } else {
                Result::Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("unable to parse whole input, remaining: {:?}", remaining),
                ))
            }
        }
        IResult::Err(err) => Result::Err(Error::new(
            ErrorKind::InvalidInput,
            format!("unable to parse input: {:?}", err),
        )),
    }
}

fn parse_usize(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>()).parse(input)
}

fn parse_statm(input: &str) -> IResult<&str, Statm> {
    (count(terminated(parse_usize, tag(" ")), 6), parse_usize)
        .parse(input)
        .map(|(next_input, (fields, _dirty))| {
            let statm = Statm {
                size: fields[0],
                resident: fields[1],
                share: fields[2],
                text: fields[3],
                data: fields[5],
            };
            (next_input, statm)
        })
}

pub fn parse_statm_str(content: &str) -> Result<Statm> {
    map_result(parse_statm(content.trim()))
}

pub fn statm_self() -> Result<Statm> {
    parse_statm_str(&fs::read_to_string("/proc/self/statm")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_statm_line() {
        let statm = parse_statm_str("2371 412 356 6 0 149 0\n").unwrap();
        assert_eq!(
            statm,
            Statm {
                size: 2371,
                resident: 412,
                share: 356,
                text: 6,
                data: 149,
            }
        );
    }

    #[test]
    fn rejects_truncated_statm() {
        assert!(parse_statm_str("2371 412 356").is_err());
        assert!(parse_statm_str("2371 412 356 6 0 149 0 extra").is_err());
    }

    #[test]
    fn watcher_reports_a_peak_on_linux() {
        let mut watcher = MemoryWatcher::new();
        watcher.start();
        let buffer = vec![1u8; 1 << 20];
        assert_eq!(buffer.len(), 1 << 20);
        let peak = watcher.stop();
        if cfg!(target_os = "linux") {
            assert!(peak.unwrap() > 0);
        }
    }
}
