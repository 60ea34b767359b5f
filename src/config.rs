use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

use crate::report::QuoteStyle;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub log: Option<LogConfig>,
    pub report: Option<ReportConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Optional Unix domain socket path (Linux/macOS). If set, the server binds this socket
    /// instead of TCP host:port.
    pub unix_socket: Option<String>,
    /// Route the collector listens on (default: `/csp-report`).
    pub report_path: Option<String>,
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub file: Option<String>,
    /// Single-generation backup. Defaults to `csp-violations-backup.log` next to `file`.
    pub backup_file: Option<String>,
    pub rotate_bytes: Option<u64>,
    pub quote_style: Option<QuoteStyle>,
}

pub const DEFAULT_MAX_FIELD_CHARS: usize = 400;

fn default_max_field_chars() -> usize {
    DEFAULT_MAX_FIELD_CHARS
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Longest accepted field value, counted in characters after coercion to text.
    #[serde(default = "default_max_field_chars")]
    pub max_field_chars: usize,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cfg: Self = toml::from_str(&raw)?;
        Ok(cfg)
    }
}
