use crate::{routes, state};
use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get},
    Router,
};
use std::sync::Arc;

pub async fn health() -> &'static str {
    "ok"
}

/// Build the main Axum router.
///
/// - `/health` answers `ok`.
/// - The collector route accepts any method; only the body matters. Bodies above
///   `max_body_bytes` are not buffered and get the same empty 404 as any bad report.
pub fn build_router(state: Arc<state::AppState>) -> Router {
    let collector = Router::new()
        .route(&state.report_path, any(routes::collect_report))
        .layer(DefaultBodyLimit::max(state.max_body_bytes));

    Router::new()
        .route("/health", get(health))
        .merge(collector)
        .with_state(state)
}
