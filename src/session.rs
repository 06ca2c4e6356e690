//! Lifecycle of the one external player a session may own.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{ControlError, Result};
use crate::transport::{Command, Reply, Transport};
use crate::types::Target;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No player handle is live.
    Idle,

    /// A start is in progress.
    Starting,

    /// The player is up and accepting commands.
    Ready,

    /// A stop is in progress.
    Stopping,
}

/// Events emitted by the session for UI collaborators.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A target started successfully.
    Started(Target),

    /// Starting failed; the reason is display-ready.
    Failed(String),

    /// The pause flag changed after a toggle command.
    PlayStateChanged(bool),

    /// The player handle was terminated.
    Stopped,
}

/// The live player, either a local subprocess or a remote bus identity.
///
/// Exclusively owned by the session; at most one exists at a time.
#[derive(Debug)]
pub enum PlayerHandle {
    /// A spawned local player process.
    Process(Child),

    /// A remote player known by its bus name.
    Remote(String),
}

impl PlayerHandle {
    /// Forcefully invalidate the handle. Local processes are killed without
    /// waiting for graceful shutdown; the kill itself is non-blocking.
    fn terminate(self) {
        match self {
            Self::Process(mut child) => {
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "player process already gone");
                }
                // Reap if it already exited; a straggler is collected by the
                // runtime when the child future is dropped.
                let _ = child.try_wait();
            }
            Self::Remote(bus_name) => {
                debug!(%bus_name, "releasing remote player identity");
            }
        }
    }
}

/// How to launch the local player process.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Player binary name or path.
    pub binary: String,

    /// IPC socket path handed to the player.
    pub socket_path: PathBuf,

    /// Additional player arguments appended after the built-in set.
    pub extra_args: Vec<String>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            binary: "mpv".to_string(),
            socket_path: PathBuf::from("/tmp/lofictl.sock"),
            extra_args: Vec::new(),
        }
    }
}

impl SpawnConfig {
    /// Argument vector for launching `target` at `volume`.
    pub fn argv(&self, target: &Target, volume: u8) -> Vec<String> {
        let mut args = vec![
            format!("--input-ipc-server={}", self.socket_path.display()),
            format!("--volume={volume}"),
            "--loop-playlist=force".to_string(),
            "--no-video".to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args.push(target.uri.clone());
        args
    }
}

/// Owns the lifecycle of exactly one external player.
///
/// Serializes outgoing commands through its transport; starting a new
/// target implicitly stops the previous one, so two players never emit
/// simultaneously.
pub struct PlayerSession {
    transport: Arc<dyn Transport>,
    spawn: SpawnConfig,
    state: SessionState,
    handle: Option<PlayerHandle>,
    target: Option<Target>,
    generation: u64,
    volume: u8,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl PlayerSession {
    /// New idle session.
    pub fn new(transport: Arc<dyn Transport>, spawn: SpawnConfig, volume: u8) -> Self {
        let (events_tx, _) = broadcast::channel(32);
        Self {
            transport,
            spawn,
            state: SessionState::Idle,
            handle: None,
            target: None,
            generation: 0,
            volume: volume.min(100),
            events_tx,
        }
    }

    /// Subscribe to session events.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Currently active target, if any.
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Session generation, bumped on every start and stop.
    ///
    /// Delayed results carrying an older generation must be discarded
    /// instead of applied to the live state.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start playing `target`, stopping any previous target first.
    ///
    /// Returns the new session generation on success.
    ///
    /// # Errors
    /// [`ControlError::NotFound`] when the player binary cannot be
    /// launched; the session stays `Idle` and a [`SessionEvent::Failed`] is
    /// emitted for one-shot surfacing.
    pub async fn start(&mut self, target: Target) -> Result<u64> {
        self.stop();
        self.state = SessionState::Starting;

        let mut command = ProcessCommand::new(&self.spawn.binary);
        command
            .args(self.spawn.argv(&target, self.volume))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match command.spawn() {
            Ok(child) => {
                info!(target_id = %target.id, uri = %target.uri, "player started");
                self.handle = Some(PlayerHandle::Process(child));
                self.target = Some(target.clone());
                self.generation += 1;
                self.state = SessionState::Ready;
                let _ = self.events_tx.send(SessionEvent::Started(target));
                Ok(self.generation)
            }
            Err(e) => {
                self.state = SessionState::Idle;
                let reason = format!("could not launch {}: {e}", self.spawn.binary);
                warn!(%reason, "player start failed");
                let _ = self.events_tx.send(SessionEvent::Failed(reason.clone()));
                Err(ControlError::NotFound(reason))
            }
        }
    }

    /// Adopt an already-running remote player as this session's target.
    ///
    /// Bus-style integrations have no process to spawn; the handle is the
    /// player's well-known bus name, and its vanish notification is what
    /// ends the session. Stops any previous target first.
    ///
    /// Returns the new session generation.
    pub fn start_remote(&mut self, target: Target, bus_name: impl Into<String>) -> u64 {
        self.stop();
        self.state = SessionState::Starting;

        let bus_name = bus_name.into();
        info!(target_id = %target.id, %bus_name, "adopted remote player");
        self.handle = Some(PlayerHandle::Remote(bus_name));
        self.target = Some(target.clone());
        self.generation += 1;
        self.state = SessionState::Ready;
        let _ = self.events_tx.send(SessionEvent::Started(target));
        self.generation
    }

    /// Stop the active player, if any.
    ///
    /// Idempotent: stopping an already idle session is a no-op and emits
    /// nothing. Termination is forceful and bounded; there is no wait for
    /// graceful shutdown.
    pub fn stop(&mut self) {
        if self.state == SessionState::Idle && self.handle.is_none() {
            return;
        }
        self.state = SessionState::Stopping;

        if let Some(handle) = self.handle.take() {
            handle.terminate();
        }
        self.target = None;
        self.generation += 1;
        self.state = SessionState::Idle;
        let _ = self.events_tx.send(SessionEvent::Stopped);
    }

    /// Toggle the pause flag and read back the resulting state.
    ///
    /// Valid only while `Ready`; otherwise a no-op returning `None`. A busy
    /// transport also turns the call into a no-op: the command is dropped,
    /// not queued, and the next user action observes the then-current
    /// state.
    ///
    /// # Errors
    /// Connection and protocol failures from the transport; `Busy` is
    /// swallowed.
    pub async fn toggle_pause(&mut self) -> Result<Option<bool>> {
        if self.state != SessionState::Ready {
            return Ok(None);
        }

        match self.transport.send(Command::TogglePause).await {
            Ok(_) => {}
            Err(ControlError::Busy) => {
                debug!("toggle dropped, a command is already in flight");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        let paused = match self.transport.send(Command::PauseState).await {
            Ok(Reply::Paused(paused)) => paused,
            Ok(reply) => {
                debug!(?reply, "unexpected reply to pause readback");
                return Ok(None);
            }
            Err(ControlError::Busy) => return Ok(None),
            Err(e) => return Err(e),
        };

        let _ = self
            .events_tx
            .send(SessionEvent::PlayStateChanged(paused));
        Ok(Some(paused))
    }

    /// Skip to the next playlist entry.
    ///
    /// Same no-op rules as [`Self::toggle_pause`]: only while `Ready`, and
    /// a busy transport drops the command instead of queuing it.
    ///
    /// # Errors
    /// Connection and protocol failures from the transport.
    pub async fn next(&mut self) -> Result<()> {
        self.skip(Command::Next).await
    }

    /// Skip to the previous playlist entry.
    ///
    /// # Errors
    /// Connection and protocol failures from the transport.
    pub async fn previous(&mut self) -> Result<()> {
        self.skip(Command::Previous).await
    }

    async fn skip(&mut self, command: Command) -> Result<()> {
        if self.state != SessionState::Ready {
            return Ok(());
        }
        match self.transport.send(command).await {
            Ok(_) => Ok(()),
            Err(ControlError::Busy) => {
                debug!("skip dropped, a command is already in flight");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Fire-and-forget volume change, 0..=100.
    ///
    /// The level is remembered for the next start; delivery is skipped when
    /// no player is live and delivery failures are logged, not surfaced.
    pub async fn set_volume(&mut self, level: u8) {
        let level = level.min(100);
        self.volume = level;

        if self.state != SessionState::Ready {
            return;
        }
        if let Err(e) = self.transport.send(Command::SetVolume(level)).await {
            debug!(error = %e, "volume change not delivered");
        }
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.terminate();
        }
    }
}
