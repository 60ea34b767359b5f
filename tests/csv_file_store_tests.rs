use csp_collector::{
    report::{header_line, QuoteStyle, ReportRow},
    store::{CsvFileStore, Persisted, ReportStore},
};
use std::{fs, path::Path, sync::Arc, thread};

fn row(tag: &str) -> ReportRow {
    ReportRow {
        timestamp: "2024-01-01:12:00:00 UTC".to_string(),
        values: std::array::from_fn(|i| if i == 0 { tag.to_string() } else { String::new() }),
    }
}

fn store_in(dir: &Path, rotate_bytes: u64) -> CsvFileStore {
    CsvFileStore::new(
        dir.join("csp-violations.csv"),
        dir.join("csp-violations-backup.log"),
        rotate_bytes,
        QuoteStyle::Legacy,
    )
}

fn data_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .split("\r\n")
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[test]
fn first_persist_creates_header_then_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path(), 1_000_000);

    let p = store.persist(&row("https://a.test/")).unwrap();
    assert_eq!(
        p,
        Persisted {
            rotated: false,
            header_written: true,
            appended: true
        }
    );

    let raw = fs::read_to_string(store.path()).unwrap();
    assert_eq!(
        raw,
        format!(
            "{}\r\n'2024-01-01:12:00:00 UTC','https://a.test/','','','','','','',''\r\n",
            header_line(QuoteStyle::Legacy)
        )
    );
}

#[test]
fn header_written_once_per_generation() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path(), 1_000_000);

    for i in 0..4 {
        store.persist(&row(&i.to_string())).unwrap();
    }
    assert!(!store.ensure_header().unwrap());

    let lines = data_lines(store.path());
    assert_eq!(lines.len(), 5);
    assert_eq!(lines.iter().filter(|l| l.contains("'timestamp'")).count(), 1);
}

#[test]
fn oversized_log_rotates_and_overwrites_backup() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path(), 10);

    fs::write(store.backup_path(), "stale backup\r\n").unwrap();

    // Header alone exceeds 10 bytes, so the second persist rotates.
    store.persist(&row("first")).unwrap();
    let before = fs::read_to_string(store.path()).unwrap();

    let p = store.persist(&row("second")).unwrap();
    assert!(p.rotated);
    assert!(p.header_written);
    assert!(p.appended);

    assert_eq!(fs::read_to_string(store.backup_path()).unwrap(), before);
    let lines = data_lines(store.path());
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], header_line(QuoteStyle::Legacy));
    assert!(lines[1].contains("'second'"));
}

#[test]
fn log_at_threshold_is_not_rotated() {
    let dir = tempfile::tempdir().unwrap();
    let header = format!("{}\r\n", header_line(QuoteStyle::Legacy));
    let store = store_in(dir.path(), header.len() as u64);

    fs::write(store.path(), &header).unwrap();
    assert!(!store.rotate_if_oversized().unwrap());
    assert!(!store.backup_path().exists());
}

#[test]
fn append_to_missing_log_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path(), 1_000_000);

    assert!(!store.append(&row("lost")).unwrap());
    assert!(!store.path().exists());
}

#[test]
fn existing_log_without_header_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path(), 1_000_000);
    fs::write(store.path(), "").unwrap();

    let p = store.persist(&row("x")).unwrap();
    assert!(!p.header_written);
    assert_eq!(data_lines(store.path()).len(), 1);
}

#[test]
fn unwritable_location_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir.path().join("missing-dir"), 1_000_000);
    assert!(store.persist(&row("x")).is_err());
}

#[test]
fn concurrent_writers_never_interleave_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(store_in(dir.path(), 1_000_000));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    store.persist(&row(&format!("t{t}-{i}"))).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let lines = data_lines(store.path());
    assert_eq!(lines.len(), 1 + 8 * 25);
    assert_eq!(lines.iter().filter(|l| l.contains("'timestamp'")).count(), 1);
    for line in &lines[1..] {
        assert_eq!(line.split(',').count(), 9, "{line}");
    }
}

#[test]
fn separate_store_handles_share_one_header() {
    // Two handles on the same files behave like two collector processes.
    let dir = tempfile::tempdir().unwrap();
    let a = store_in(dir.path(), 1_000_000);
    let b = store_in(dir.path(), 1_000_000);

    assert!(a.ensure_header().unwrap());
    assert!(!b.ensure_header().unwrap());
    a.append(&row("a")).unwrap();
    b.append(&row("b")).unwrap();

    assert_eq!(data_lines(a.path()).len(), 3);
}
