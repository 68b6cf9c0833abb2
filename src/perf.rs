//! Timing scopes and the render debug log.
//!
//! Scopes report through `tracing` when timing is on. Events go to the
//! debug log file only while one is open.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

static TIMING: AtomicBool = AtomicBool::new(false);
static DEBUG_LOG: Mutex<Option<DebugLog>> = Mutex::new(None);

/// An open debug log file and the instant it was opened.
struct DebugLog {
    opened: Instant,
    writer: BufWriter<File>,
}

impl DebugLog {
    fn create(path: &Path) -> io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "codepane render debug log start")?;
        writer.flush()?;
        Ok(Self {
            opened: Instant::now(),
            writer,
        })
    }

    fn record(&mut self, name: &str, detail: &str) -> io::Result<()> {
        let at_ms = self.opened.elapsed().as_secs_f64() * 1000.0;
        writeln!(self.writer, "[{at_ms:>10.3} ms] {name}: {detail}")?;
        self.writer.flush()
    }
}

// A panic while holding the lock leaves the log usable.
fn debug_log() -> MutexGuard<'static, Option<DebugLog>> {
    DEBUG_LOG.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Times a region of code until dropped.
#[derive(Debug)]
pub struct Scope {
    name: &'static str,
    start: Instant,
}

impl Drop for Scope {
    fn drop(&mut self) {
        let timing = TIMING.load(Ordering::Relaxed);
        let mut log = debug_log();
        if !timing && log.is_none() {
            return;
        }
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        if timing {
            tracing::info!(target: "codepane::perf", scope = self.name, elapsed_ms);
        }
        if let Some(log) = log.as_mut() {
            let _ = log.record(self.name, &format!("{elapsed_ms:.3} ms"));
        }
    }
}

pub fn set_enabled(enabled: bool) {
    TIMING.store(enabled, Ordering::Relaxed);
}

pub fn scope(name: &'static str) -> Scope {
    Scope {
        name,
        start: Instant::now(),
    }
}

/// Start writing debug events to `path`, or stop when `None`.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn set_debug_log_path(path: Option<&Path>) -> io::Result<()> {
    let next = path.map(DebugLog::create).transpose()?;
    *debug_log() = next;
    Ok(())
}

/// Append an event to the debug log, if one is open.
pub fn log_event(name: &str, detail: impl AsRef<str>) {
    if let Some(log) = debug_log().as_mut() {
        let _ = log.record(name, detail.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_debug_log_records_events_and_scopes() {
        let temp_file = NamedTempFile::new().unwrap();
        set_debug_log_path(Some(temp_file.path())).unwrap();
        log_event("test.event", "hello world");
        drop(scope("test.scope"));
        set_debug_log_path(None).unwrap();
        log_event("test.after", "ignored");

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.starts_with("codepane render debug log start\n"));
        assert!(content.contains("test.event: hello world"));
        assert!(content.contains("test.scope: "));
        assert!(!content.contains("test.after"));
    }

    #[test]
    fn test_unwritable_log_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("render.log");
        assert!(set_debug_log_path(Some(&missing)).is_err());
        log_event("test.dropped", "nowhere to go");
        assert!(!missing.exists());
    }
}
