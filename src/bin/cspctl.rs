use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csp_collector::config;
use std::{
    collections::VecDeque,
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

/// cspctl: configure and exercise a running CSP report collector.
#[derive(Debug, Parser)]
#[command(name = "cspctl")]
#[command(version)]
struct Cli {
    /// Base URL for the collector (used by commands that call the HTTP API)
    #[arg(long, default_value = "http://127.0.0.1:18796")]
    url: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Print or validate configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },

    /// GET /health
    Health,

    /// POST a sample violation report and print the status code
    SendSample {
        /// Collector route
        #[arg(long, default_value = "/csp-report")]
        path: String,

        #[arg(long, default_value = "https://evil.example/x.js")]
        blocked_uri: String,

        #[arg(long, default_value = "https://site.example/page")]
        document_uri: String,
    },

    /// Print the last rows of a report log
    Tail {
        #[arg(long)]
        file: PathBuf,

        #[arg(short = 'n', long, default_value_t = 10)]
        lines: usize,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCmd {
    /// Print a config example to stdout
    Example,

    /// Validate a config file (loads and parses TOML)
    Validate {
        #[arg(long)]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Config { cmd } => match cmd {
            ConfigCmd::Example => {
                let ex = include_str!("../../config.example.toml");
                print!("{ex}");
            }
            ConfigCmd::Validate { path } => {
                let _ = config::Config::load(&path).with_context(|| format!("load {path:?}"))?;
                eprintln!("OK: {path:?}");
            }
        },

        Cmd::Health => {
            let u = format!("{}/health", cli.url.trim_end_matches('/'));
            let txt = reqwest::blocking::get(&u)
                .with_context(|| format!("GET {u}"))?
                .text()
                .context("read response")?;
            println!("{txt}");
        }

        Cmd::SendSample {
            path,
            blocked_uri,
            document_uri,
        } => {
            let u = format!(
                "{}/{}",
                cli.url.trim_end_matches('/'),
                path.trim_start_matches('/')
            );
            let body = serde_json::json!({
                "csp-report": {
                    "blocked-uri": blocked_uri,
                    "disposition": "enforce",
                    "document-uri": document_uri,
                    "effective-directive": "script-src-elem",
                    "original-policy": "default-src 'self'; report-uri /csp-report",
                    "referrer": "",
                    "status-code": 200,
                    "violated-directive": "script-src-elem"
                }
            });

            let resp = reqwest::blocking::Client::new()
                .post(&u)
                .header("content-type", "application/csp-report")
                .body(body.to_string())
                .send()
                .with_context(|| format!("POST {u}"))?;
            let status = resp.status();
            println!("{status}");
            if status != reqwest::StatusCode::NO_CONTENT {
                anyhow::bail!("report not accepted: {status}");
            }
        }

        Cmd::Tail { file, lines } => {
            let f = File::open(&file).with_context(|| format!("open {file:?}"))?;
            let mut last: VecDeque<String> = VecDeque::with_capacity(lines);
            for line in BufReader::new(f).lines() {
                let line = line.with_context(|| format!("read {file:?}"))?;
                if lines == 0 {
                    continue;
                }
                if last.len() == lines {
                    last.pop_front();
                }
                last.push_back(line.trim_end_matches('\r').to_string());
            }
            for line in last {
                println!("{line}");
            }
        }
    }

    Ok(())
}
