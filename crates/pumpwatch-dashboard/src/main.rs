/*
[INPUT]:  CLI arguments, optional YAML configuration file, OS shutdown signals
[OUTPUT]: Running live feeds with periodic summaries and graceful shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use pumpwatch_dashboard::{DashboardConfig, LiveDataHub};

#[derive(Parser, Debug)]
#[command(name = "pumpwatch", version, about = "pump.fun token launch and SOL price dashboard")]
struct Cli {
    /// YAML configuration; built-in defaults when omitted
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Also write logs to this file
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let _log_guard = init_tracing(&args.log_level, args.log_file.as_deref())?;

    info!(
        config_path = ?args.config_path,
        dry_run = args.dry_run,
        "starting pumpwatch"
    );

    let config = load_config(args.config_path.as_deref())?;
    config.validate().context("validate config")?;
    info!(
        price_endpoint = %config.price_feed.endpoint,
        token_endpoint = %config.token_feed.endpoint,
        "configuration loaded"
    );

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let mut hub = LiveDataHub::start(&config).context("start live data hub")?;

    let shutdown = hub.shutdown_token();
    let _signals = spawn_shutdown_listener(shutdown.clone());

    shutdown.cancelled().await;

    hub.shutdown_and_wait()
        .await
        .context("shutdown live data hub")?;
    info!("live data hub shutdown complete");

    Ok(())
}

fn init_tracing(log_level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(EnvFilter::try_new(log_level).context("invalid log level")?);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .context("log file path must name a file")?;
            std::fs::create_dir_all(directory).context("create log directory")?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::try_new(log_level).context("invalid log level")?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(guard)
}

fn load_config(path: Option<&Path>) -> Result<DashboardConfig> {
    let Some(path) = path else {
        info!("no config file given; using defaults");
        return Ok(DashboardConfig::default());
    };
    let path_str = path
        .to_str()
        .context("config path must be valid utf-8")?;
    DashboardConfig::from_file(path_str).context("load config")
}

/// Cancel `shutdown` on the first SIGINT or SIGTERM.
fn spawn_shutdown_listener(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = tokio::select! {
            signal = interrupt() => signal,
            signal = terminate() => signal,
            _ = shutdown.cancelled() => return,
        };
        info!(signal, "stopping feeds");
        shutdown.cancel();
    })
}

async fn interrupt() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(err) => {
            warn!(error = %err, "SIGINT listener unavailable");
            std::future::pending().await
        }
    }
}

#[cfg(unix)]
async fn terminate() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
            "SIGTERM"
        }
        Err(err) => {
            warn!(error = %err, "SIGTERM listener unavailable");
            std::future::pending().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() -> &'static str {
    std::future::pending().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_listener_exits_when_cancelled_elsewhere() {
        let shutdown = CancellationToken::new();
        let listener = spawn_shutdown_listener(shutdown.clone());

        shutdown.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(1), listener).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["pumpwatch"]);
        assert!(cli.config_path.is_none());
        assert_eq!(cli.log_level, "info");
        assert!(cli.log_file.is_none());
        assert!(!cli.dry_run);

        let cli = Cli::parse_from(["pumpwatch", "--config", "feeds.yaml", "--dry-run"]);
        assert_eq!(cli.config_path, Some(PathBuf::from("feeds.yaml")));
        assert!(cli.dry_run);
    }

    #[test]
    fn test_missing_config_path_uses_defaults() {
        let config = load_config(None).unwrap();
        assert!(config.validate().is_ok());
    }
}
