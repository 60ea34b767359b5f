use crate::{report::ReportLimits, store::ReportStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub limits: ReportLimits,
    pub store: Arc<dyn ReportStore>,
    /// Route the collector is mounted on.
    pub report_path: String,
    pub max_body_bytes: usize,
}
