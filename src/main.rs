use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};
use tracing::info;

use csp_collector::{app, app_state_builder, config, serve, server_config};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Bind host (default: 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (default: 18796)
    #[arg(long)]
    port: Option<u16>,

    /// Optional Unix socket path. If set, binds this socket instead of TCP host:port.
    #[arg(long)]
    unix_socket: Option<PathBuf>,

    /// CSV report log (default: ./csp-violations.csv)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Backup taken when the log is rotated (default: csp-violations-backup.log beside the log)
    #[arg(long)]
    backup_file: Option<PathBuf>,

    /// Rotate the log once it grows beyond this many bytes (default: 1000000)
    #[arg(long)]
    rotate_bytes: Option<u64>,

    /// Config TOML file (default: /etc/csp-collector/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config_path = args
        .config
        .unwrap_or_else(|| PathBuf::from("/etc/csp-collector/config.toml"));
    let config = match config::Config::load(&config_path) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            if let Some(ioe) = e.downcast_ref::<std::io::Error>() {
                if ioe.kind() == std::io::ErrorKind::NotFound {
                    info!(
                        "config file not found at {}; continuing",
                        config_path.display()
                    );
                    None
                } else {
                    return Err(e);
                }
            } else {
                return Err(e);
            }
        }
    };

    let cli = server_config::CliOverrides {
        host: args.host.clone(),
        port: args.port,
        unix_socket: args.unix_socket.clone(),
        log_file: args.log_file.clone(),
        backup_file: args.backup_file.clone(),
        rotate_bytes: args.rotate_bytes,
    };

    let eff = server_config::effective_settings(&cli, config.as_ref());

    info!(
        log_file = %eff.log_file.display(),
        backup_file = %eff.backup_file.display(),
        rotate_bytes = eff.rotate_bytes,
        quote_style = ?eff.quote_style,
        "report log configured"
    );

    let store = app_state_builder::build_report_store(&eff)?;
    let state = app_state_builder::build_app_state(&eff, store);
    let app = app::build_router(state);

    info!(route = %eff.report_path, "collector route");
    if let Some(sock_path) = &eff.unix_socket {
        return serve::serve_unix(sock_path, app).await;
    }

    let addr: SocketAddr = format!("{}:{}", eff.host, eff.port).parse()?;
    serve::serve_tcp(addr, app).await
}
