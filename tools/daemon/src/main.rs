//! wsl-secret-service - Freedesktop.org Secret Service daemon for WSL2.
//!
//! Exposes the org.freedesktop.secrets D-Bus service on the session bus
//! and stores secret payloads in the Windows Credential Manager via a
//! companion wincred-helper.exe reached through WSL2 interop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use zbus::fdo::{RequestNameFlags, RequestNameReply};

use wslss_bridge::WincredBridge;
use wslss_common::paths::BUS_NAME;
use wslss_service::{init, spawn_idle_monitor, ServiceState, Shutdown};
use wslss_store::Store;

#[derive(Parser)]
#[command(name = "wsl-secret-service")]
#[command(about = "Secret Service daemon backed by the Windows Credential Manager")]
#[command(version)]
struct Cli {
    /// Config/metadata directory.
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Path to wincred-helper.exe (auto-discovered when omitted).
    #[arg(long, value_name = "PATH")]
    helper_path: Option<PathBuf>,

    /// Replace an existing org.freedesktop.secrets owner.
    #[arg(long)]
    replace: bool,

    /// [DEBUG] Disable memory protection (prctl, mlockall).
    #[arg(long)]
    disable_memprotect: bool,

    /// Shut down after this many seconds without client activity.
    #[arg(long, default_value_t = 30, value_name = "SECONDS")]
    timeout: u64,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("set up logging")?;

    // Harden before any secret can be read.
    if cli.disable_memprotect {
        warn!("memory protection disabled");
    } else {
        wslss_memprotect::harden_process().context("harden process")?;
        info!("memory protections applied");
    }

    let config_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    let store = Store::open(&config_dir)
        .with_context(|| format!("open metadata store at {}", config_dir.display()))?;
    info!("metadata store: {}", config_dir.display());

    let backend = WincredBridge::new(cli.helper_path.clone()).context(
        "init wincred backend\n\
         hint: build wincred-helper.exe and place it alongside this binary",
    )?;
    info!("wincred backend ready: {}", backend.helper_path().display());

    let connection = zbus::connection::Builder::session()
        .context(
            "connect to session bus\n\
             hint: ensure DBUS_SESSION_BUS_ADDRESS is set (run: export $(dbus-launch))",
        )?
        .build()
        .await
        .context("connect to session bus")?;

    let state = ServiceState::new(store, Arc::new(backend));
    init(&connection, state.clone())
        .await
        .context("start secret service")?;

    // Claim the well-known name only once the object graph is up.
    let flags = if cli.replace {
        RequestNameFlags::ReplaceExisting | RequestNameFlags::DoNotQueue
    } else {
        RequestNameFlags::DoNotQueue.into()
    };
    let reply = connection
        .request_name_with_flags(BUS_NAME, flags)
        .await
        .with_context(|| format!("request D-Bus name {BUS_NAME}"))?;
    if reply != RequestNameReply::PrimaryOwner {
        bail!("D-Bus name {BUS_NAME} is already owned (use --replace to take it over)");
    }
    info!("claimed D-Bus name: {BUS_NAME}");

    let shutdown = Shutdown::new();
    spawn_idle_monitor(
        state.activity.clone(),
        Duration::from_secs(cli.timeout),
        shutdown.clone(),
    );

    let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("install SIGINT handler")?;

    info!("org.freedesktop.secrets is ready");
    tokio::select! {
        _ = shutdown.cancelled() => info!("shutdown initiated (idle timeout)"),
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
            shutdown.trigger();
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
            shutdown.trigger();
        }
    }

    connection.graceful_shutdown().await;
    Ok(())
}

/// XDG-compliant default config directory for the service.
fn default_config_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "wsl-secret-service")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".wsl-secret-service"))
}
