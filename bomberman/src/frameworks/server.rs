// Framework bootstrap for the host and single-player runtimes.

use crate::domain::GameState;
use crate::domain::tuning::Tuning;
use crate::frameworks::assets::AssetBundle;
use crate::frameworks::config;
use crate::interface_adapters::net::{spawn_snapshot_serializer, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::seeded_rng;
use crate::use_cases::{HostHandle, IdleInput, InputSource, SessionRegistry, WorldTaskConfig};

use axum::{Router, routing::get};
use std::fmt;
use std::io::{self, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime, time::SystemTime};

// Prefixes every timestamp with the process label set by `--instance`.
struct InstanceTimer {
    label: Option<u32>,
}

impl FormatTime for InstanceTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        SystemTime.format_time(w)?;
        match self.label {
            Some(n) => write!(w, " [instance {n}]"),
            None => Ok(()),
        }
    }
}

pub fn init_runtime(instance: Option<u32>) {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let timer = InstanceTimer { label: instance };

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_timer(timer)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_timer(timer)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

#[derive(Debug, Clone)]
pub struct HostSettings {
    pub level_id: String,
    pub host_name: String,
    /// Auto-start threshold, host included.
    pub start_with: Option<usize>,
    pub seed: Option<u64>,
    pub tick_interval: Duration,
}

impl HostSettings {
    pub fn from_env() -> Self {
        Self {
            level_id: config::default_level(),
            host_name: config::display_name(),
            start_with: Some(2),
            seed: config::rng_seed(),
            tick_interval: config::TICK_INTERVAL,
        }
    }
}

pub fn load_assets() -> Result<AssetBundle> {
    let dir = config::levels_dir();
    AssetBundle::load(&dir).map_err(|e| {
        tracing::error!(dir = %dir.display(), error = %e, "failed to load assets");
        io::Error::other(e)
    })
}

fn spawn_world(
    settings: &HostSettings,
    assets: &AssetBundle,
    input: Box<dyn InputSource>,
) -> Result<HostHandle> {
    let level = assets.level(&settings.level_id).ok_or_else(|| {
        let known: Vec<&str> = assets.level_ids().collect();
        tracing::error!(level_id = %settings.level_id, ?known, "unknown level");
        io::Error::other(format!("unknown level {}", settings.level_id))
    })?;

    Ok(HostHandle::spawn(
        level,
        Tuning::default(),
        seeded_rng(settings.seed),
        input,
        WorldTaskConfig {
            tick_interval: settings.tick_interval,
            auto_start_at: settings.start_with,
            host_id: uuid::Uuid::new_v4().to_string(),
            host_name: settings.host_name.clone(),
            event_capacity: config::INPUT_CHANNEL_CAPACITY,
        },
    ))
}

/// A host accepting connections on its listener.
pub struct RunningHost {
    handle: HostHandle,
    address: SocketAddr,
    stop: Arc<Notify>,
    server: JoinHandle<Result<()>>,
}

impl RunningHost {
    pub fn handle(&self) -> &HostHandle {
        &self.handle
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Serves until the listener fails.
    pub async fn wait(self) -> Result<()> {
        let outcome = match self.server.await {
            Ok(res) => res,
            Err(e) => Err(io::Error::other(e)),
        };
        self.handle.shutdown().await;
        outcome
    }

    /// Stops accepting connections and stops the world; open sessions end
    /// on their next exchange.
    pub async fn shutdown(self) -> Result<()> {
        self.stop.notify_one();
        self.handle.shutdown().await;
        match self.server.await {
            Ok(res) => res,
            Err(e) => Err(io::Error::other(e)),
        }
    }
}

pub async fn start_host(
    listener: TcpListener,
    settings: HostSettings,
    assets: &AssetBundle,
    input: Box<dyn InputSource>,
) -> Result<RunningHost> {
    let address = listener.local_addr()?;
    let handle = spawn_world(&settings, assets, input)?;

    let registry_seed = settings.seed.map(|s| s.wrapping_add(1));
    let state = Arc::new(AppState {
        events_tx: handle.events(),
        snapshot_bytes_rx: spawn_snapshot_serializer(handle.subscribe()),
        registry: Arc::new(SessionRegistry::new(seeded_rng(registry_seed))),
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state);

    tracing::info!(%address, level_id = %settings.level_id, "listening");

    let stop = Arc::new(Notify::new());
    let stop_signal = stop.clone();
    let server = tokio::spawn(async move {
        // Serve app and report errors rather than panicking
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { stop_signal.notified().await })
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        })
    });

    Ok(RunningHost {
        handle,
        address,
        stop,
        server,
    })
}

/// Hosts with settings from the environment until the listener fails.
pub async fn run(listener: TcpListener) -> Result<()> {
    let assets = load_assets()?;
    let host = start_host(listener, HostSettings::from_env(), &assets, Box::new(IdleInput)).await?;
    host.wait().await
}

pub async fn run_with_config() -> Result<()> {
    init_runtime(None);

    let address = SocketAddr::new(config::bind_address(), config::host_port());

    // Bind TCP listener with error handling
    let listener = TcpListener::bind(address).await.inspect_err(|e| {
        tracing::error!(%address, error = %e, "failed to bind");
    })?;

    run(listener).await
}

/// Single player: the same world task with no listener. Returns once the
/// round ends or on Ctrl-C.
pub async fn run_solo(
    settings: HostSettings,
    assets: &AssetBundle,
    input: Box<dyn InputSource>,
) -> Result<()> {
    let handle = spawn_world(&settings, assets, input)?;
    handle.start_round().await;

    let mut snapshots = handle.subscribe();
    tokio::select! {
        ended = snapshots.wait_for(|s| s.game_state == GameState::Ended) => {
            if ended.is_err() {
                tracing::warn!("world task stopped before the round ended");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
        }
    }

    let snapshot = handle.snapshot();
    let scores: Vec<(&str, u32)> = snapshot
        .participants
        .iter()
        .map(|p| (p.display_name.as_str(), p.score))
        .collect();
    tracing::info!(state = ?snapshot.game_state, ?scores, scene = ?handle.scene(), "solo session over");
    handle.shutdown().await;
    Ok(())
}
