use bomberman::frameworks::client::{ClientExit, run_client};
use bomberman::frameworks::config;
use bomberman::frameworks::server::{
    HostSettings, init_runtime, load_assets, run_solo, start_host,
};
use bomberman::use_cases::IdleInput;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;
use tokio::process::Command;

// Head start the spawned host gets before the joiner dials it.
const MULTI_JOIN_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "bomberman", about = "Host-authoritative networked Bomberman")]
struct Cli {
    /// Spawn a host and a joining client as two child processes.
    #[arg(long)]
    multi: bool,
    /// Label for every log line of this process.
    #[arg(long)]
    instance: Option<u32>,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Play alone; no listener.
    Solo {
        #[arg(long)]
        level: Option<String>,
    },
    /// Run the authoritative world and accept connections.
    Host {
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Start the round once this many participants are in, host included.
        #[arg(long, default_value_t = 2)]
        start_with: usize,
    },
    /// Connect to a host at `address` (host:port).
    Join {
        address: String,
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_runtime(cli.instance);
    if cli.multi {
        return spawn_pair().await;
    }

    let result = match cli.mode.unwrap_or(Mode::Solo { level: None }) {
        Mode::Solo { level } => solo(level).await,
        Mode::Host {
            level,
            port,
            start_with,
        } => host(level, port, start_with).await,
        Mode::Join { address, name } => join(&address, name).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "exiting");
            ExitCode::FAILURE
        }
    }
}

fn settings(level: Option<String>) -> HostSettings {
    let mut settings = HostSettings::from_env();
    if let Some(level) = level {
        settings.level_id = level;
    }
    settings
}

async fn solo(level: Option<String>) -> std::io::Result<()> {
    let assets = load_assets()?;
    let mut settings = settings(level);
    settings.start_with = None;
    run_solo(settings, &assets, Box::new(IdleInput)).await
}

async fn host(level: Option<String>, port: Option<u16>, start_with: usize) -> std::io::Result<()> {
    let assets = load_assets()?;
    let mut settings = settings(level);
    settings.start_with = Some(start_with.max(1));

    let address = SocketAddr::new(config::bind_address(), port.unwrap_or_else(config::host_port));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| tracing::error!(%address, error = %e, "failed to bind"))?;

    let running = start_host(listener, settings, &assets, Box::new(IdleInput)).await?;
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("shutting down host");
            running.shutdown().await
        }
        Err(e) => {
            tracing::warn!(error = %e, "ctrl-c handler unavailable; serving until the listener fails");
            running.wait().await
        }
    }
}

async fn join(address: &str, name: Option<String>) -> std::io::Result<()> {
    let assets = load_assets()?;
    let name = name.unwrap_or_else(config::display_name);
    match run_client(address, &name, &assets, Box::new(IdleInput)).await {
        Ok(ClientExit::Disconnected { last_scene }) => {
            tracing::info!(?last_scene, "disconnected; back at the menu");
            Ok(())
        }
        Ok(ClientExit::Quit) => Ok(()),
        Err(e) => {
            tracing::error!(%address, error = %e, "could not join host");
            Err(std::io::Error::other(e))
        }
    }
}

// Local two-process session: `--instance 1 host` and `--instance 2 join`.
async fn spawn_pair() -> ExitCode {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            tracing::error!(error = %e, "cannot locate executable");
            return ExitCode::FAILURE;
        }
    };
    let port = config::host_port().to_string();

    let host = Command::new(&exe)
        .args(["--instance", "1", "host", "--port", &port])
        .spawn();
    let mut host = match host {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(error = %e, "failed to spawn host");
            return ExitCode::FAILURE;
        }
    };

    tokio::time::sleep(MULTI_JOIN_DELAY).await;
    let joiner = Command::new(&exe)
        .args(["--instance", "2", "join", &format!("127.0.0.1:{port}")])
        .spawn();
    let mut joiner = match joiner {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(error = %e, "failed to spawn client");
            let _ = host.kill().await;
            return ExitCode::FAILURE;
        }
    };

    let (host_status, join_status) = tokio::join!(host.wait(), joiner.wait());
    let ok = |s: std::io::Result<std::process::ExitStatus>| s.map(|s| s.success()).unwrap_or(false);
    if ok(host_status) && ok(join_status) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
