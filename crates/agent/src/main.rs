//! hcloud-agent - Hetzner Cloud load balancer metrics for Telegraf
//!
//! Runs as a Telegraf `execd` input: records go to stdout as line protocol,
//! logs go to stderr.

use anyhow::{bail, Result};
use clap::Parser;
use hcloud_lib::{
    api,
    observability::{AgentMetrics, StructuredLogger},
    Collector, HealthRegistry,
};
use std::ffi::OsString;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod shim;

use shim::{Schedule, Shim};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Readiness fails once this many poll intervals pass without a round
const STALE_AFTER_INTERVALS: u32 = 3;

/// Single-dash spellings used by existing execd command lines
const LEGACY_FLAGS: &[&str] = &["config", "poll_interval", "poll_interval_disabled"];

/// Telegraf execd input for Hetzner Cloud load balancer metrics
#[derive(Parser, Debug)]
#[command(name = "hcloud-agent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file for this plugin
    #[arg(long, env = "HCLOUD_AGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// How often to send metrics
    #[arg(
        long,
        alias = "poll_interval",
        default_value = "1m",
        value_parser = humantime::parse_duration
    )]
    pub poll_interval: Duration,

    /// Disable polling; gather once per line received on stdin
    #[arg(long, alias = "poll_interval_disabled")]
    pub poll_interval_disabled: bool,

    /// Address for the health and Prometheus listener (disabled when unset)
    #[arg(long, env = "HCLOUD_AGENT_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    fn schedule(&self) -> Result<Schedule> {
        if self.poll_interval_disabled {
            return Ok(Schedule::OnDemand);
        }
        if self.poll_interval.is_zero() {
            bail!("--poll-interval must be greater than zero");
        }
        Ok(Schedule::Interval(self.poll_interval))
    }
}

/// Rewrite `-flag` / `-flag=value` for known flags to their `--` form
fn normalize_legacy_flags(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some(s) if is_legacy_flag(s) => OsString::from(format!("-{s}")),
            _ => arg,
        })
        .collect()
}

fn is_legacy_flag(arg: &str) -> bool {
    match arg.strip_prefix('-') {
        Some(rest) if !rest.starts_with('-') => {
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            LEGACY_FLAGS.contains(&name)
        }
        _ => false,
    }
}

/// Resolves on SIGINT or SIGTERM. The SIGTERM handler is installed before
/// this returns, so a signal sent right after is not lost.
fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    let sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|e| warn!(error = %e, "Failed to install SIGTERM handler"))
        .ok();

    async move {
        let interrupt = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received SIGINT"),
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGINT handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match sigterm {
                Some(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM");
                }
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = interrupt => {}
            _ = terminate => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_legacy_flags(std::env::args_os()));

    // stdout carries line protocol, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let schedule = cli.schedule()?;
    let configs = config::AgentConfig::load(cli.config.as_deref())?;
    if configs.is_empty() {
        warn!("No [[inputs.hcloud]] sections configured, nothing will be gathered");
    }

    let collectors: Vec<Collector> = configs.into_iter().map(Collector::new).collect();

    let health = HealthRegistry::new(
        schedule
            .interval()
            .map(|period| period * STALE_AFTER_INTERVALS),
    );
    let metrics = AgentMetrics::new();

    let logger = StructuredLogger::new(config::default_instance());
    logger.log_startup(AGENT_VERSION, collectors.len(), schedule.interval());

    if let Some(addr) = cli.metrics_addr {
        let health = health.clone();
        tokio::spawn(async move {
            if let Err(e) = api::serve(addr, health).await {
                warn!(error = %e, "Monitoring listener stopped");
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let shutdown = shutdown_signal();
    tokio::spawn(async move {
        shutdown.await;
        let _ = shutdown_tx.send(());
    });

    let mut shim = Shim::new(
        collectors,
        std::io::stdout(),
        metrics,
        health,
        logger.clone(),
    );
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let reason = shim.run(schedule, stdin, shutdown_rx).await?;

    logger.log_shutdown(reason.as_str());
    info!("Shutting down");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["hcloud-agent"]).unwrap();

        assert!(cli.config.is_none());
        assert_eq!(cli.poll_interval, Duration::from_secs(60));
        assert!(!cli.poll_interval_disabled);
        assert_eq!(
            cli.schedule().unwrap(),
            Schedule::Interval(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_cli_poll_interval_disabled() {
        let cli = Cli::try_parse_from(["hcloud-agent", "--poll-interval-disabled"]).unwrap();
        assert_eq!(cli.schedule().unwrap(), Schedule::OnDemand);
    }

    #[test]
    fn test_cli_custom_interval_and_config() {
        let cli = Cli::try_parse_from([
            "hcloud-agent",
            "--config",
            "/etc/telegraf/hcloud.conf",
            "--poll-interval",
            "30s",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/telegraf/hcloud.conf")));
        assert_eq!(cli.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_cli_rejects_malformed_interval() {
        assert!(Cli::try_parse_from(["hcloud-agent", "--poll-interval", "soon"]).is_err());
    }

    #[test]
    fn test_cli_accepts_underscore_spellings() {
        let cli = Cli::try_parse_from(normalize_legacy_flags(
            ["hcloud-agent", "-config", "/etc/hcloud.conf", "-poll_interval", "10s"]
                .map(OsString::from),
        ))
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/hcloud.conf")));
        assert_eq!(cli.poll_interval, Duration::from_secs(10));

        let cli = Cli::try_parse_from(normalize_legacy_flags(
            ["hcloud-agent", "-poll_interval_disabled"].map(OsString::from),
        ))
        .unwrap();
        assert_eq!(cli.schedule().unwrap(), Schedule::OnDemand);

        let cli = Cli::try_parse_from(["hcloud-agent", "--poll_interval=2m"]).unwrap();
        assert_eq!(cli.poll_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_normalize_leaves_other_arguments() {
        let args = normalize_legacy_flags(
            ["hcloud-agent", "-h", "--config", "-poll_interval=5s", "-verbose"].map(OsString::from),
        );
        assert_eq!(
            args,
            ["hcloud-agent", "-h", "--config", "--poll_interval=5s", "-verbose"].map(OsString::from)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_signal_resolves_on_sigterm() {
        let shutdown = shutdown_signal();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), shutdown)
            .await
            .unwrap();
    }

    #[test]
    fn test_cli_rejects_zero_interval() {
        let cli = Cli::try_parse_from(["hcloud-agent", "--poll-interval", "0s"]).unwrap();
        assert!(cli.schedule().is_err());
    }
}
