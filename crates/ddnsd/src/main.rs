// # ddnsd - DDNS Daemon
//
// Thin integration layer: all update logic lives in ddns-core and the
// plug-in crates. The daemon is responsible for:
// 1. Parsing the command line and initializing logging
// 2. Registering the collaborators compiled into this build
// 3. Loading the configuration file and failing fast when it is unusable
// 4. Running the file watcher, the scheduler and the optional status endpoint
// 5. Translating signals and fatal errors into exit codes
//
// ## Example
//
// ```bash
// ddnsd --cfg /etc/ddns/config.json --status-addr 127.0.0.1:8053 --update-on-start
// ```
//
// ## Logging
//
// `--log-level` (or `DDNS_LOG_LEVEL`) sets the filter; `RUST_LOG`, when set,
// overrides it with full `EnvFilter` directive syntax.

mod status;

use anyhow::{Context, Result};
use clap::Parser;
use ddns_core::{
    ConfigStore, FileWatcher, Orchestrator, Registry, Scheduler, parse_interval, reload_channel,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration error, at start-up or on a live reload
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl DdnsExitCode {
    /// Configuration errors keep their own code wherever they surface
    fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<ddns_core::Error>() {
            Some(e) if e.is_fatal() => DdnsExitCode::ConfigError,
            _ => DdnsExitCode::RuntimeError,
        }
    }
}

/// Dynamic DNS update daemon
#[derive(Debug, Parser)]
#[command(name = "ddnsd", version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file (also holds the last pushed addresses)
    #[arg(long = "cfg", value_name = "PATH")]
    cfg: PathBuf,

    /// Log filter, e.g. "info" or "ddns_core=debug"
    #[arg(long, env = "DDNS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Serve /ipv4, /ipv6, /hostname and /status on this address
    #[arg(long, value_name = "ADDR")]
    status_addr: Option<SocketAddr>,

    /// Run one update cycle right after start-up instead of waiting one interval
    #[arg(long)]
    update_on_start: bool,

    /// Upper bound for every provider, backend and notifier call
    #[arg(long, value_name = "DURATION", default_value = "10s", value_parser = parse_interval)]
    call_timeout: Duration,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.log_level) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting ddnsd daemon");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(cli).await {
            Ok(()) => DdnsExitCode::CleanShutdown,
            Err(e) => {
                let code = DdnsExitCode::for_error(&e);
                error!(exit_code = code as u8, "Daemon error: {:#}", e);
                code
            }
        }
    });

    code.into()
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{}'", level))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

/// Register every collaborator compiled into this build
fn build_registry() -> Registry {
    #[allow(unused_mut)]
    let mut registry = Registry::new();

    #[cfg(feature = "http")]
    ddns_ip_http::register(&mut registry);

    #[cfg(feature = "cloudflare")]
    ddns_provider_cloudflare::register(&mut registry);

    #[cfg(feature = "dyndns")]
    ddns_provider_dyndns::register(&mut registry);

    #[cfg(feature = "notify")]
    ddns_notify::register(&mut registry);

    info!(
        backends = ?registry.list_backends(),
        routers = ?registry.list_address_providers(),
        "Collaborators registered"
    );
    registry
}

fn resolve_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!(error = %e, "Unable to resolve hostname");
            "unknown".to_string()
        }
    }
}

/// Run the daemon until a shutdown signal or a fatal error
async fn run_daemon(cli: Cli) -> Result<()> {
    let registry = Arc::new(build_registry());

    let store = Arc::new(
        ConfigStore::load(&cli.cfg)
            .await
            .with_context(|| format!("loading {}", cli.cfg.display()))?,
    );
    let config = store.snapshot().await;

    // An unknown router type would fail every cycle; refuse to start instead
    registry
        .create_address_provider(config.router.as_ref())
        .context("resolving the address provider")?;

    for service in &config.services {
        if !registry.has_backend(&service.service_type) {
            warn!(
                service = %service.service_type,
                domain = %service.target_domain,
                "Service type not available in this build, it will be skipped"
            );
        }
    }
    for name in registry.unsupported_notifiers(&config.notifications) {
        warn!(notifier = name, "Notifier enabled but not available in this build, skipping");
    }

    let hostname = resolve_hostname();
    info!(
        hostname = %hostname,
        update_on_start = cli.update_on_start,
        call_timeout = ?cli.call_timeout,
        "Daemon configured"
    );

    let orchestrator = Arc::new(
        Orchestrator::new(Arc::clone(&store), registry)
            .with_hostname(hostname.clone())
            .with_call_timeout(cli.call_timeout),
    );

    let status_server = match cli.status_addr {
        Some(addr) => Some(status::spawn(addr, Arc::clone(&store), hostname).await?),
        None => None,
    };

    let (reload_tx, reload_rx) = reload_channel();
    let watcher = FileWatcher::new(Arc::clone(&store), reload_tx);
    let scheduler = Scheduler::new(orchestrator, reload_rx).update_on_start(cli.update_on_start);

    let (watcher_stop, watcher_rx) = oneshot::channel();
    let (scheduler_stop, scheduler_rx) = oneshot::channel();
    let mut watcher_task = tokio::spawn(watcher.run(watcher_rx));
    let mut scheduler_task = tokio::spawn(scheduler.run(scheduler_rx));

    enum Exit {
        Signal(Result<&'static str>),
        Watcher(Result<()>),
        Scheduler(Result<()>),
    }

    let exit = tokio::select! {
        signal = wait_for_shutdown() => Exit::Signal(signal),
        result = &mut watcher_task => Exit::Watcher(joined("watcher", result)),
        result = &mut scheduler_task => Exit::Scheduler(joined("scheduler", result)),
    };

    let _ = watcher_stop.send(());
    let _ = scheduler_stop.send(());

    // Stop both tasks; an in-flight cycle is allowed to finish
    let (watcher_result, scheduler_result, signal_result) = match exit {
        Exit::Signal(signal) => (
            joined("watcher", watcher_task.await),
            joined("scheduler", scheduler_task.await),
            signal.map(|name| info!(signal = name, "Received shutdown signal")),
        ),
        Exit::Watcher(result) => {
            if result.is_ok() {
                warn!("File watcher stopped unexpectedly");
            }
            (result, joined("scheduler", scheduler_task.await), Ok(()))
        }
        Exit::Scheduler(result) => {
            if result.is_ok() {
                warn!("Scheduler stopped unexpectedly");
            }
            (joined("watcher", watcher_task.await), result, Ok(()))
        }
    };

    if let Some(server) = status_server {
        server.stop().await;
    }

    info!("Shutting down daemon");
    watcher_result.context("live reload")?;
    scheduler_result?;
    signal_result
}

/// Flatten a finished task's join result
fn joined(
    name: &str,
    result: std::result::Result<ddns_core::Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    result.with_context(|| format!("{} task failed", name))??;
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}

/// Handle of a spawned background server
pub(crate) struct ServerHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    async fn stop(self) {
        let _ = self.stop.send(());
        match self.task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Status server failed"),
            Err(e) => warn!(error = %e, "Status server task failed"),
        }
    }
}
