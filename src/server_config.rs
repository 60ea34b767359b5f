use crate::{config, report::QuoteStyle};
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 18796;
pub const DEFAULT_REPORT_PATH: &str = "/csp-report";
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;
pub const DEFAULT_LOG_FILE: &str = "csp-violations.csv";
pub const BACKUP_FILE_NAME: &str = "csp-violations-backup.log";
pub const DEFAULT_ROTATE_BYTES: u64 = 1_000_000;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub unix_socket: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub backup_file: Option<PathBuf>,
    pub rotate_bytes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub host: String,
    pub port: u16,
    pub unix_socket: Option<PathBuf>,
    pub report_path: String,
    pub max_body_bytes: usize,
    pub log_file: PathBuf,
    pub backup_file: PathBuf,
    pub rotate_bytes: u64,
    pub quote_style: QuoteStyle,
    pub max_field_chars: usize,
}

/// The backup sits next to the log it rotates.
pub fn backup_for(log_file: &Path) -> PathBuf {
    match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(BACKUP_FILE_NAME),
        _ => PathBuf::from(BACKUP_FILE_NAME),
    }
}

/// Route paths must be absolute for axum; tolerate a missing leading slash in config.
pub fn normalize_report_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_REPORT_PATH.to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

pub fn effective_settings(cli: &CliOverrides, cfg: Option<&config::Config>) -> EffectiveSettings {
    let cfg_server = cfg.and_then(|c| c.server.as_ref());
    let cfg_log = cfg.and_then(|c| c.log.as_ref());
    let cfg_report = cfg.and_then(|c| c.report.as_ref());

    let host = cli
        .host
        .clone()
        .or_else(|| cfg_server.and_then(|s| s.host.clone()))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = cli
        .port
        .or_else(|| cfg_server.and_then(|s| s.port))
        .unwrap_or(DEFAULT_PORT);

    let unix_socket: Option<PathBuf> = cli.unix_socket.clone().or_else(|| {
        cfg_server
            .and_then(|s| s.unix_socket.as_ref())
            .map(PathBuf::from)
    });

    let report_path = cfg_server
        .and_then(|s| s.report_path.as_deref())
        .map(normalize_report_path)
        .unwrap_or_else(|| DEFAULT_REPORT_PATH.to_string());

    let max_body_bytes = cfg_server
        .and_then(|s| s.max_body_bytes)
        .unwrap_or(DEFAULT_MAX_BODY_BYTES);

    let log_file = cli
        .log_file
        .clone()
        .or_else(|| cfg_log.and_then(|l| l.file.as_ref()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

    // An explicit log file without an explicit backup keeps the backup beside it.
    let backup_file = cli
        .backup_file
        .clone()
        .or_else(|| cfg_log.and_then(|l| l.backup_file.as_ref()).map(PathBuf::from))
        .unwrap_or_else(|| backup_for(&log_file));

    let rotate_bytes = cli
        .rotate_bytes
        .or_else(|| cfg_log.and_then(|l| l.rotate_bytes))
        .unwrap_or(DEFAULT_ROTATE_BYTES);

    let quote_style = cfg_log.and_then(|l| l.quote_style).unwrap_or_default();

    let max_field_chars = cfg_report
        .map(|r| r.max_field_chars)
        .unwrap_or(config::DEFAULT_MAX_FIELD_CHARS);

    EffectiveSettings {
        host,
        port,
        unix_socket,
        report_path,
        max_body_bytes,
        log_file,
        backup_file,
        rotate_bytes,
        quote_style,
        max_field_chars,
    }
}
