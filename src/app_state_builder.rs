use crate::{
    report::ReportLimits,
    server_config::EffectiveSettings,
    state,
    store::{CsvFileStore, ReportStore},
};
use anyhow::{Context, Result};
use std::{fs, sync::Arc};

/// Build the CSV store described by the effective settings.
///
/// The log directory must already exist or be creatable; the files themselves are created
/// lazily on the first accepted report.
pub fn build_report_store(eff: &EffectiveSettings) -> Result<Arc<dyn ReportStore>> {
    for p in [&eff.log_file, &eff.backup_file] {
        if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create report log directory {}", parent.display()))?;
        }
    }

    Ok(Arc::new(CsvFileStore::new(
        eff.log_file.clone(),
        eff.backup_file.clone(),
        eff.rotate_bytes,
        eff.quote_style,
    )))
}

/// Build the shared AppState.
///
/// This is a small helper to keep `main.rs` focused on config/CLI parsing and server wiring.
pub fn build_app_state(
    eff: &EffectiveSettings,
    store: Arc<dyn ReportStore>,
) -> Arc<state::AppState> {
    Arc::new(state::AppState {
        limits: ReportLimits {
            max_field_chars: eff.max_field_chars,
        },
        store,
        report_path: eff.report_path.clone(),
        max_body_bytes: eff.max_body_bytes,
    })
}
