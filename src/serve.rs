use anyhow::{Context, Result};
use axum::Router;
use std::{net::SocketAddr, path::Path};

pub async fn serve_tcp(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "listening on tcp");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Serve HTTP/1 and HTTP/2 on a Unix domain socket.
///
/// `axum::serve` only takes a `TcpListener`, so connections are driven by hyper-util directly.
/// A stale socket file at `sock_path` is replaced.
#[cfg(unix)]
pub async fn serve_unix(sock_path: &Path, app: Router) -> Result<()> {
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use hyper_util::server::conn::auto::Builder;
    use hyper_util::service::TowerToHyperService;
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = sock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create socket directory {}", parent.display()))?;
    }
    match std::fs::remove_file(sock_path) {
        Ok(()) => tracing::debug!(socket = %sock_path.display(), "removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("remove stale {}", sock_path.display()));
        }
    }

    let listener = tokio::net::UnixListener::bind(sock_path)
        .with_context(|| format!("bind unix:{}", sock_path.display()))?;
    // Owner and group may connect; the collector usually sits behind a local reverse proxy.
    let _ = std::fs::set_permissions(sock_path, std::fs::Permissions::from_mode(0o660));
    tracing::info!(socket = %sock_path.display(), "listening on unix socket");

    loop {
        let (stream, _) = listener.accept().await.context("accept on unix socket")?;
        let svc = TowerToHyperService::new(app.clone());
        tokio::spawn(async move {
            let builder = Builder::new(TokioExecutor::new());
            if let Err(err) = builder.serve_connection(TokioIo::new(stream), svc).await {
                tracing::debug!(error = %err, "unix connection ended with error");
            }
        });
    }
}

#[cfg(not(unix))]
pub async fn serve_unix(sock_path: &Path, _app: Router) -> Result<()> {
    anyhow::bail!(
        "unix socket {} requested but platform is not unix",
        sock_path.display()
    )
}
