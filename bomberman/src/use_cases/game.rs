use super::input::InputSource;
use super::reconcile::ClientScene;
use super::types::{GameEvent, SceneStats};
use crate::domain::snapshot::{GameState, HOST_COLOR, WorldSnapshot};
use crate::domain::tuning::Tuning;
use crate::domain::{Level, World};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct WorldTaskConfig {
    pub tick_interval: Duration,
    /// Start the round on its own once this many participants (host
    /// included) are registered.
    pub auto_start_at: Option<usize>,
    pub host_id: String,
    pub host_name: String,
    pub event_capacity: usize,
}

/// Owns the world. Everything else talks to it through `events_rx` and
/// observes it through the two watch channels.
#[allow(clippy::too_many_arguments)]
pub async fn world_task(
    mut world: World,
    mut events_rx: mpsc::Receiver<GameEvent>,
    snapshot_tx: watch::Sender<Arc<WorldSnapshot>>,
    scene_tx: watch::Sender<SceneStats>,
    mut scene: ClientScene,
    mut input: Box<dyn InputSource>,
    config: WorldTaskConfig,
    shutdown: Arc<Notify>,
) {
    // The host is always record 0.
    let host_index = world.add_participant(&config.host_id, &config.host_name, HOST_COLOR);
    info!(host_id = %config.host_id, level_id = %world.snapshot().level_id, "world task started");

    let mut interval = tokio::time::interval(config.tick_interval);
    let mut last_state = world.game_state();

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                break;
            }
            _ = interval.tick() => {}
        }

        while let Ok(ev) = events_rx.try_recv() {
            apply_event(&mut world, ev);
        }

        let ready = config
            .auto_start_at
            .is_some_and(|n| world.snapshot().participants.len() >= n);
        if ready && world.game_state() == GameState::Lobby {
            world.start();
        }

        world.set_control(host_index, input.poll(), None);
        world.tick();

        let state = world.game_state();
        if state != last_state {
            if state == GameState::Ended {
                let scores: Vec<u32> = world.snapshot().participants.iter().map(|p| p.score).collect();
                info!(ticks = world.ticks(), ?scores, "round ended");
            }
            last_state = state;
        }

        let snapshot = Arc::new(world.snapshot().clone());
        scene.reconcile(&snapshot);
        let _ = snapshot_tx.send(snapshot);
        let _ = scene_tx.send(scene.stats());
    }

    info!(ticks = world.ticks(), "world task stopped");
}

fn apply_event(world: &mut World, ev: GameEvent) {
    match ev {
        GameEvent::Join {
            participant_id,
            display_name,
            color,
        } => {
            let index = world.add_participant(participant_id.clone(), display_name.clone(), color);
            info!(%participant_id, %display_name, index, "participant joined");
        }
        GameEvent::Leave { participant_id } => match world.participant_index(&participant_id) {
            Some(index) => {
                world.kill_participant(index);
                info!(%participant_id, index, "participant left");
            }
            None => warn!(%participant_id, "leave for unknown participant"),
        },
        GameEvent::Control {
            participant_id,
            control,
            latency_ms,
        } => {
            if let Some(index) = world.participant_index(&participant_id) {
                world.set_control(index, control, latency_ms);
            }
        }
        GameEvent::Start => {
            if !world.start() {
                warn!(state = ?world.game_state(), "start ignored outside the lobby");
            }
        }
    }
}

/// Handle to a running host world task.
pub struct HostHandle {
    events_tx: mpsc::Sender<GameEvent>,
    snapshot_rx: watch::Receiver<Arc<WorldSnapshot>>,
    scene_rx: watch::Receiver<SceneStats>,
    host_id: String,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl HostHandle {
    /// Builds the world from `level` and spawns its task on the current
    /// runtime.
    pub fn spawn(
        level: &Level,
        tuning: Tuning,
        rng: StdRng,
        input: Box<dyn InputSource>,
        config: WorldTaskConfig,
    ) -> Self {
        let world = World::new(level, tuning, rng);
        let scene = ClientScene::new(level, config.host_id.clone(), tuning);
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let (snapshot_tx, snapshot_rx) =
            watch::channel(Arc::new(WorldSnapshot::lobby(level.id.clone())));
        let (scene_tx, scene_rx) = watch::channel(SceneStats::default());
        let shutdown = Arc::new(Notify::new());
        let host_id = config.host_id.clone();

        let task = tokio::spawn(world_task(
            world,
            events_rx,
            snapshot_tx,
            scene_tx,
            scene,
            input,
            config,
            shutdown.clone(),
        ));

        Self {
            events_tx,
            snapshot_rx,
            scene_rx,
            host_id,
            shutdown,
            task,
        }
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn events(&self) -> mpsc::Sender<GameEvent> {
        self.events_tx.clone()
    }

    /// Asks the world to leave the lobby. False once the task is gone.
    pub async fn start_round(&self) -> bool {
        self.events_tx.send(GameEvent::Start).await.is_ok()
    }

    pub fn snapshot(&self) -> Arc<WorldSnapshot> {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<WorldSnapshot>> {
        self.snapshot_rx.clone()
    }

    pub fn scene(&self) -> SceneStats {
        *self.scene_rx.borrow()
    }

    pub fn subscribe_scene(&self) -> watch::Receiver<SceneStats> {
        self.scene_rx.clone()
    }

    /// Stops the world task and waits for it to finish.
    pub async fn shutdown(self) {
        // notify_one keeps a permit if the task is between ticks.
        self.shutdown.notify_one();
        if let Err(err) = self.task.await {
            warn!(error = %err, "world task ended abnormally");
        }
    }
}
