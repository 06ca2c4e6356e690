//! Integration tests for the player session state machine.
//!
//! The spawned "player" is the `true` binary: spawning succeeds, the
//! session cannot tell it apart from a real player, and killing it is
//! harmless.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use lofictl::ControlError;
use lofictl::session::{PlayerSession, SessionEvent, SessionState, SpawnConfig};
use lofictl::transport::Transport;
use lofictl::transport::socket::SocketTransport;
use lofictl::types::Target;

fn test_session(binary: &str) -> (TempDir, PlayerSession) {
    let dir = TempDir::new().unwrap();
    let socket_path = dir.path().join("player.sock");
    let transport: Arc<dyn Transport> = Arc::new(SocketTransport::new(&socket_path));
    let spawn = SpawnConfig {
        binary: binary.to_string(),
        socket_path,
        extra_args: Vec::new(),
    };
    (dir, PlayerSession::new(transport, spawn, 50))
}

fn target(id: &str) -> Target {
    Target {
        id: id.to_string(),
        name: format!("target {id}"),
        uri: "http://x/stream".to_string(),
    }
}

async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no session event arrived")
        .expect("event channel closed")
}

#[tokio::test]
async fn stop_on_idle_session_is_a_silent_no_op() {
    let (_dir, mut session) = test_session("true");
    let mut events = session.events();

    session.stop();
    session.stop();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(matches!(
        events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn starting_a_new_target_stops_the_previous_one_first() {
    let (_dir, mut session) = test_session("true");
    let mut events = session.events();

    session.start(target("a")).await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    session.start(target("b")).await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.target().map(|t| t.id.as_str()), Some("b"));

    // Exactly one stop for A, ordered before B's start.
    assert!(matches!(next_event(&mut events).await, SessionEvent::Started(t) if t.id == "a"));
    assert!(matches!(next_event(&mut events).await, SessionEvent::Stopped));
    assert!(matches!(next_event(&mut events).await, SessionEvent::Started(t) if t.id == "b"));
    assert!(matches!(
        events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn generation_advances_on_every_start_and_stop() {
    let (_dir, mut session) = test_session("true");
    assert_eq!(session.generation(), 0);

    session.start(target("a")).await.unwrap();
    let after_start = session.generation();
    assert!(after_start > 0);

    session.stop();
    assert!(session.generation() > after_start);
}

#[tokio::test]
async fn missing_player_binary_reports_not_found_and_stays_idle() {
    let (_dir, mut session) = test_session("/nonexistent/player-binary");
    let mut events = session.events();

    let result = session.start(target("a")).await;
    assert!(matches!(result, Err(ControlError::NotFound(_))));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Failed(_)
    ));
}

#[tokio::test]
async fn remote_player_adoption_follows_the_same_lifecycle() {
    let (_dir, mut session) = test_session("true");
    let mut events = session.events();

    let generation = session.start_remote(target("a"), "org.mpris.MediaPlayer2.spotify");
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(generation, session.generation());
    assert!(matches!(next_event(&mut events).await, SessionEvent::Started(t) if t.id == "a"));

    session.stop();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(matches!(next_event(&mut events).await, SessionEvent::Stopped));
}

#[tokio::test]
async fn toggle_outside_ready_is_a_no_op() {
    let (_dir, mut session) = test_session("true");

    // Idle: no process to target, nothing touches the transport.
    let result = session.toggle_pause().await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn skip_outside_ready_is_a_no_op() {
    let (_dir, mut session) = test_session("true");

    // Nothing is listening on the socket: an Ok proves the commands never
    // reached the transport.
    session.next().await.unwrap();
    session.previous().await.unwrap();
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn volume_outside_ready_is_remembered_but_not_sent() {
    let (_dir, mut session) = test_session("true");

    // No player socket exists; a send would fail loudly if attempted.
    session.set_volume(80).await;
    assert_eq!(session.state(), SessionState::Idle);
}
