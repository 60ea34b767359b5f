use crate::{report, state::AppState};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Receive one CSP violation report.
///
/// The status is settled before anything touches the disk: 404 for anything that is not a
/// well-formed report, 204 otherwise. Neither response carries a body. A body that cannot be
/// read (over the size cap, broken transfer) is answered like any other malformed report.
pub async fn collect_report(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> StatusCode {
    let body = match body {
        Ok(b) => b,
        Err(rejection) => {
            tracing::debug!(status = %rejection.status(), "unreadable csp report body");
            return StatusCode::NOT_FOUND;
        }
    };

    let report = match report::parse_report(&body, &state.limits) {
        Ok(r) => r,
        Err(reason) => {
            tracing::debug!(%reason, len = body.len(), "rejected csp report");
            return StatusCode::NOT_FOUND;
        }
    };

    let row = report.into_row(Utc::now());
    let _ = spawn_persist(&state, row);
    StatusCode::NO_CONTENT
}

/// Write an accepted row on the blocking pool. Failures are logged and otherwise dropped.
pub fn spawn_persist(state: &AppState, row: report::ReportRow) -> JoinHandle<()> {
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || match store.persist(&row) {
        Ok(p) if !p.appended => {
            tracing::warn!("report log missing at append time; row dropped");
        }
        Ok(_) => {}
        Err(err) => {
            let err = format!("{err:#}");
            tracing::warn!(error = %err, "failed to persist csp report");
        }
    })
}
