// Client frame task: feeds local input to the session and reconciles the
// latest snapshot until the session ends.

use crate::domain::tuning::Tuning;
use crate::frameworks::assets::AssetBundle;
use crate::interface_adapters::net::session::FRAME_DELAY;
use crate::interface_adapters::net::{ConnectionError, Session};
use crate::interface_adapters::utils::throttle::{LOG_THROTTLE, should_log};
use crate::use_cases::{ClientScene, InputSource, SceneStats};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Why the frame task returned to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// The host or the transport ended the session.
    Disconnected { last_scene: Option<SceneStats> },
    /// The local user quit.
    Quit,
}

pub async fn run_client(
    address: &str,
    display_name: &str,
    assets: &AssetBundle,
    input: Box<dyn InputSource>,
) -> Result<ClientExit, ConnectionError> {
    let session = Session::connect(address, display_name).await?;
    info!(%address, participant_id = %session.participant_id(), "joined host");

    let quit = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    let exit = run_frames(&session, assets, input, quit).await;
    session.shutdown().await;
    Ok(exit)
}

/// Runs frames on an established session until it closes or `quit`
/// resolves.
pub async fn run_frames(
    session: &Session,
    assets: &AssetBundle,
    mut input: Box<dyn InputSource>,
    quit: impl Future<Output = ()>,
) -> ClientExit {
    let (closed_tx, mut closed_rx) = oneshot::channel();
    session.on_close(move || {
        let _ = closed_tx.send(());
    });
    tokio::pin!(quit);

    let mut scene: Option<ClientScene> = None;
    let mut frame = tokio::time::interval(FRAME_DELAY);
    let now = Instant::now() - LOG_THROTTLE;
    let mut last_stats_log = now;
    let mut last_level_log = now;

    loop {
        tokio::select! {
            _ = &mut closed_rx => {
                info!("session closed by host; returning to menu");
                return ClientExit::Disconnected {
                    last_scene: scene.as_ref().map(ClientScene::stats),
                };
            }
            _ = &mut quit => {
                info!("leaving session");
                session.close();
                return ClientExit::Quit;
            }
            _ = frame.tick() => {}
        }

        session.set_control(input.poll());
        let Some(snapshot) = session.latest_snapshot() else {
            continue;
        };

        // The scene follows the snapshot's level; a new level means a new scene.
        if scene.as_ref().map(ClientScene::level_id) != Some(snapshot.level_id.as_str()) {
            match assets.level(&snapshot.level_id) {
                Some(level) => {
                    scene = Some(ClientScene::new(
                        level,
                        session.participant_id(),
                        Tuning::default(),
                    ));
                }
                None => {
                    if should_log(&mut last_level_log) {
                        warn!(level_id = %snapshot.level_id, "snapshot names an unknown level");
                    }
                    continue;
                }
            }
        }

        if let Some(scene) = scene.as_mut() {
            scene.reconcile(&snapshot);
            if should_log(&mut last_stats_log) {
                debug!(
                    state = ?snapshot.game_state,
                    latency_ms = session.latency().as_millis() as u64,
                    color = ?scene.local_color(),
                    stats = ?scene.stats(),
                    "frame"
                );
            }
        }
    }
}
