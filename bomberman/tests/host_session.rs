mod support;

use bomberman::domain::snapshot::{ControlRecord, PALETTE, WorldSnapshot};
use bomberman::frameworks::client::{ClientExit, run_frames};
use bomberman::interface_adapters::net::Session;
use bomberman::interface_adapters::protocol::ServerMessage;
use bomberman::use_cases::IdleInput;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use support::Frame;

#[tokio::test]
async fn when_client_connects_then_identity_is_the_first_frame() {
    let addr = support::ensure_server();
    let mut ws = support::raw_connect(addr, "Tess").await;

    let id = support::read_identity(&mut ws).await;
    let snapshot = support::exchange_until(&mut ws, |s| s.participant(&id).is_some()).await;

    let (index, record) = snapshot.participant(&id).expect("own record");
    assert!(index > 0, "record 0 belongs to the host");
    assert_eq!(record.display_name, "Tess");
    assert!(PALETTE.contains(&record.color));
}

#[tokio::test]
async fn when_garbage_frames_arrive_then_connection_keeps_exchanging() {
    let addr = support::ensure_server();
    let mut ws = support::raw_connect(addr, "Noisy").await;
    let id = support::read_identity(&mut ws).await;

    for garbage in ["{not json", r#"{"type":"Teleport","data":{}}"#, ""] {
        support::send_text(&mut ws, garbage).await;
        match support::next_frame(&mut ws).await {
            Frame::Server(ServerMessage::Snapshot(_)) => {}
            other => panic!("expected a snapshot reply, got {other:?}"),
        }
    }

    let snapshot = support::exchange_until(&mut ws, |s| s.participant(&id).is_some()).await;
    assert_eq!(snapshot.participant(&id).map(|(_, p)| p.display_name.as_str()), Some("Noisy"));
}

#[tokio::test]
async fn when_control_is_sent_then_record_mirrors_it() {
    let addr = support::ensure_server();
    let mut ws = support::raw_connect(addr, "Mover").await;
    let id = support::read_identity(&mut ws).await;
    let control = ControlRecord {
        left: true,
        ..ControlRecord::default()
    };

    let deadline = tokio::time::Instant::now() + support::WAIT;
    loop {
        let snapshot = support::exchange(&mut ws, control).await;
        if snapshot.participant(&id).is_some_and(|(_, p)| p.control == control) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "control never mirrored");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn when_client_reports_latency_then_its_record_carries_it() {
    let addr = support::ensure_server();
    let mut ws = support::raw_connect(addr, "Pinger").await;
    let id = support::read_identity(&mut ws).await;

    let deadline = tokio::time::Instant::now() + support::WAIT;
    loop {
        let snapshot = support::exchange_reporting(&mut ws, ControlRecord::default(), Some(42)).await;
        if snapshot.participant(&id).is_some_and(|(_, p)| p.latency_ms == 42) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "latency never reached the snapshot");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn when_client_drops_abruptly_then_its_record_stays_and_is_marked_dead() {
    let host = support::spawn_host().await;
    let addr = host.address().to_string();

    let observer = Session::connect(&addr, "Watcher").await.expect("observer");
    let mut ws = support::raw_connect(&addr, "Quitter").await;
    let quitter = support::read_identity(&mut ws).await;
    let before = support::exchange_until(&mut ws, |s| s.participant(&quitter).is_some()).await;
    let (index_before, _) = before.participant(&quitter).expect("record");

    // No close handshake: the TCP stream just goes away.
    drop(ws);

    let mut snapshots = observer.snapshots();
    let seen = tokio::time::timeout(
        support::WAIT,
        snapshots.wait_for(|s| {
            s.as_ref()
                .and_then(|s| s.participant(&quitter))
                .is_some_and(|(_, p)| p.dead)
        }),
    )
    .await
    .expect("record marked dead in time")
    .expect("observer session alive");
    let snapshot: Arc<WorldSnapshot> = seen.clone().expect("snapshot");
    drop(seen);

    let (index_after, _) = snapshot.participant(&quitter).expect("record kept");
    assert_eq!(index_after, index_before);
    assert!(
        snapshot
            .participant(observer.participant_id())
            .is_some_and(|(_, p)| !p.dead)
    );

    observer.shutdown().await;
    host.shutdown().await.expect("host shutdown");
}

#[tokio::test]
async fn when_palette_is_exhausted_then_new_connections_are_refused_until_a_color_returns() {
    let host = support::spawn_host().await;
    let addr = host.address().to_string();

    let mut clients = Vec::new();
    for i in 0..PALETTE.len() {
        let mut ws = support::raw_connect(&addr, &format!("p{i}")).await;
        support::read_identity(&mut ws).await;
        clients.push(ws);
    }

    let mut late = support::raw_connect(&addr, "late").await;
    match support::next_frame(&mut late).await {
        Frame::Closed(reason) => assert_eq!(reason.as_deref(), Some("host full")),
        other => panic!("expected refusal, got {other:?}"),
    }

    let mut leaver = clients.pop().expect("client");
    leaver.close(None).await.expect("close");
    drop(leaver);

    // Cleanup runs after the close handshake; retry until the color is back.
    let mut admitted = false;
    for _ in 0..50 {
        let mut ws = support::raw_connect(&addr, "retry").await;
        if let Frame::Server(ServerMessage::Identity { .. }) = support::next_frame(&mut ws).await {
            admitted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(admitted, "color never returned to the palette");

    drop(clients);
    host.shutdown().await.expect("host shutdown");
}

#[tokio::test]
async fn when_host_shuts_down_then_client_close_callback_fires_once() {
    let host = support::spawn_host().await;
    let addr = host.address().to_string();

    let session = Session::connect(&addr, "Stayer").await.expect("session");
    let mut snapshots = session.snapshots();
    tokio::time::timeout(support::WAIT, snapshots.wait_for(|s| s.is_some()))
        .await
        .expect("snapshot in time")
        .expect("session alive");

    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_cb = fired.clone();
    session.on_close(move || {
        fired_cb.fetch_add(1, Ordering::SeqCst);
        let _ = closed_tx.send(());
    });

    host.shutdown().await.expect("host shutdown");
    tokio::time::timeout(support::WAIT, closed_rx)
        .await
        .expect("callback in time")
        .expect("callback sender alive");

    session.finished().await;
    assert!(session.is_closed());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn when_host_goes_away_then_frame_task_returns_to_the_menu() {
    let host = support::spawn_host().await;
    let addr = host.address().to_string();
    let assets = support::assets();

    let session = Session::connect(&addr, "Viewer").await.expect("session");
    let frames = run_frames(
        &session,
        &assets,
        Box::new(IdleInput),
        std::future::pending::<()>(),
    );
    let stop = async {
        let mut snapshots = session.snapshots();
        tokio::time::timeout(support::WAIT, snapshots.wait_for(|s| s.is_some()))
            .await
            .expect("snapshot in time")
            .expect("session alive");
        // A few frames so the scene is built from the snapshot's level.
        tokio::time::sleep(Duration::from_millis(200)).await;
        host.shutdown().await.expect("host shutdown");
    };

    let (exit, ()) = tokio::join!(tokio::time::timeout(support::WAIT * 2, frames), stop);
    match exit.expect("frame task returned in time") {
        ClientExit::Disconnected { last_scene } => {
            let scene = last_scene.expect("scene was built");
            assert_eq!(scene.players, 2);
        }
        ClientExit::Quit => panic!("nobody asked to quit"),
    }
}
