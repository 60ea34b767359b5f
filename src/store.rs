use anyhow::{Context, Result};
use fs2::FileExt;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::report::{header_line, QuoteStyle, ReportRow};

pub const LINE_ENDING: &str = "\r\n";

/// What a single [`ReportStore::persist`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Persisted {
    pub rotated: bool,
    pub header_written: bool,
    pub appended: bool,
}

/// Append-only destination for accepted reports.
///
/// The three steps are exposed separately so callers and tests can reason about each one;
/// `persist` runs them in the required order.
pub trait ReportStore: Send + Sync {
    /// Move an oversized log aside to the backup slot. Returns true if a rotation happened.
    fn rotate_if_oversized(&self) -> Result<bool>;
    /// Start a fresh log with its header if none exists. Returns true if a header was written.
    fn ensure_header(&self) -> Result<bool>;
    /// Append one row. Returns false (and writes nothing) if the log has gone missing.
    fn append(&self, row: &ReportRow) -> Result<bool>;

    fn persist(&self, row: &ReportRow) -> Result<Persisted> {
        persist_steps(self, row)
    }
}

/// Rotate, write the header if needed, then append. Shared by every store's `persist`.
fn persist_steps<S: ReportStore + ?Sized>(store: &S, row: &ReportRow) -> Result<Persisted> {
    let rotated = store.rotate_if_oversized()?;
    let header_written = store.ensure_header()?;
    let appended = store.append(row)?;
    Ok(Persisted {
        rotated,
        header_written,
        appended,
    })
}

/// CSV report log on the local filesystem with a single backup generation.
pub struct CsvFileStore {
    path: PathBuf,
    backup_path: PathBuf,
    rotate_bytes: u64,
    quote_style: QuoteStyle,
    // Serializes persist() within this process; other processes are handled by create_new
    // and the append lock.
    persist_lock: Mutex<()>,
}

impl CsvFileStore {
    pub fn new(
        path: impl Into<PathBuf>,
        backup_path: impl Into<PathBuf>,
        rotate_bytes: u64,
        quote_style: QuoteStyle,
    ) -> Self {
        Self {
            path: path.into(),
            backup_path: backup_path.into(),
            rotate_bytes,
            quote_style,
            persist_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }
}

impl ReportStore for CsvFileStore {
    fn rotate_if_oversized(&self) -> Result<bool> {
        let meta = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("stat {}", self.path.display()));
            }
        };
        if meta.len() <= self.rotate_bytes {
            return Ok(false);
        }

        match fs::rename(&self.path, &self.backup_path) {
            Ok(()) => {
                tracing::info!(
                    size = meta.len(),
                    backup = %self.backup_path.display(),
                    "rotated report log"
                );
                Ok(true)
            }
            // Another writer rotated it first.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| {
                format!(
                    "rename {} -> {}",
                    self.path.display(),
                    self.backup_path.display()
                )
            }),
        }
    }

    fn ensure_header(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("create {}", self.path.display()));
            }
        };

        let header = format!("{}{LINE_ENDING}", header_line(self.quote_style));
        file.lock_exclusive()
            .with_context(|| format!("lock {}", self.path.display()))?;
        let written = file.write_all(header.as_bytes());
        let _ = FileExt::unlock(&file);
        written.with_context(|| format!("write header to {}", self.path.display()))?;
        Ok(true)
    }

    fn append(&self, row: &ReportRow) -> Result<bool> {
        let mut file = match fs::OpenOptions::new().append(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "report log vanished before append");
                return Ok(false);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("open {}", self.path.display()));
            }
        };

        // One write per row so a locked append never interleaves with another writer.
        let line = format!("{}{LINE_ENDING}", row.to_line(self.quote_style));
        file.lock_exclusive()
            .with_context(|| format!("lock {}", self.path.display()))?;
        let written = file.write_all(line.as_bytes());
        let _ = FileExt::unlock(&file);
        written.with_context(|| format!("append to {}", self.path.display()))?;
        Ok(true)
    }

    fn persist(&self, row: &ReportRow) -> Result<Persisted> {
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        persist_steps(self, row)
    }
}

#[derive(Debug, Default)]
struct MemoryLog {
    current: Option<Vec<String>>,
    backup: Option<Vec<String>>,
}

/// In-process report log. Rotation is by row count rather than bytes.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    inner: Mutex<MemoryLog>,
    rotate_rows: Option<usize>,
    quote_style: QuoteStyle,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotate once the current log holds more than `rows` lines (header included).
    pub fn with_rotate_rows(rows: usize) -> Self {
        Self {
            rotate_rows: Some(rows),
            ..Self::default()
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryLog> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lines of the current log generation, header first; None if no log exists yet.
    pub fn lines(&self) -> Option<Vec<String>> {
        self.lock().current.clone()
    }

    pub fn backup_lines(&self) -> Option<Vec<String>> {
        self.lock().backup.clone()
    }
}

impl ReportStore for InMemoryReportStore {
    fn rotate_if_oversized(&self) -> Result<bool> {
        let Some(limit) = self.rotate_rows else {
            return Ok(false);
        };
        let mut log = self.lock();
        let oversized = log.current.as_ref().is_some_and(|l| l.len() > limit);
        if oversized {
            log.backup = log.current.take();
        }
        Ok(oversized)
    }

    fn ensure_header(&self) -> Result<bool> {
        let mut log = self.lock();
        if log.current.is_some() {
            return Ok(false);
        }
        log.current = Some(vec![header_line(self.quote_style)]);
        Ok(true)
    }

    fn append(&self, row: &ReportRow) -> Result<bool> {
        let mut log = self.lock();
        match log.current.as_mut() {
            Some(lines) => {
                lines.push(row.to_line(self.quote_style));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tag: &str) -> ReportRow {
        ReportRow {
            timestamp: "2024-01-01:00:00:00 UTC".to_string(),
            values: std::array::from_fn(|i| format!("{tag}{i}")),
        }
    }

    #[test]
    fn memory_store_rotates_by_rows() {
        let store = InMemoryReportStore::with_rotate_rows(2);
        store.persist(&row("a")).unwrap();
        store.persist(&row("b")).unwrap();
        let p = store.persist(&row("c")).unwrap();
        assert!(p.rotated && p.header_written && p.appended);
        assert_eq!(store.backup_lines().unwrap().len(), 3);
        assert_eq!(store.lines().unwrap().len(), 2);
    }

    #[test]
    fn memory_store_append_without_log_is_noop() {
        let store = InMemoryReportStore::new();
        assert!(!store.append(&row("a")).unwrap());
        assert!(store.lines().is_none());
    }
}
