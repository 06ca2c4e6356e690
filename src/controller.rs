//! Top-level coordinator wiring session, transport and reconciler.
//!
//! Owns the one "current session" reference with explicit
//! replace-and-dispose semantics; UI adapters call into it and watch the
//! canonical state, never the other way around.

use std::sync::{Arc, Mutex as StdMutex};

use futures::StreamExt;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::reconciler::{LocalOutcome, StateReconciler};
use crate::retry::RetryPolicy;
use crate::session::{PlayerSession, SessionEvent, SpawnConfig};
use crate::settings::{self, Settings, keys};
use crate::transport::{Command, Notification, Reply, Subscription, Transport};
use crate::types::{PlaybackState, Target, TrackMetadata};

/// Media control coordinator.
///
/// One live instance per player integration; dropping it aborts the
/// notification pump and the settings watcher.
pub struct Controller {
    session: Arc<Mutex<PlayerSession>>,
    reconciler: Arc<StateReconciler>,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    pump_handle: Arc<StdMutex<Option<JoinHandle<()>>>>,
    volume_handle: JoinHandle<()>,
}

impl Controller {
    /// Build a controller over `transport`, spawning players per `spawn`.
    ///
    /// Reads the initial volume from `settings` and follows later changes
    /// to the volume key.
    pub fn new(
        transport: Arc<dyn Transport>,
        spawn: SpawnConfig,
        settings: Arc<dyn Settings>,
    ) -> Self {
        let volume = settings::volume(settings.as_ref());
        let session = Arc::new(Mutex::new(PlayerSession::new(
            transport.clone(),
            spawn,
            volume,
        )));

        let volume_handle = tokio::spawn(follow_volume(settings, session.clone()));

        Self {
            session,
            reconciler: Arc::new(StateReconciler::new()),
            transport,
            retry: RetryPolicy::default(),
            pump_handle: Arc::new(StdMutex::new(None)),
            volume_handle,
        }
    }

    /// Override the metadata retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Snapshot of the canonical playback state.
    pub fn current_state(&self) -> PlaybackState {
        self.reconciler.current()
    }

    /// Stream of canonical state, current value first.
    pub fn watch_state(&self) -> WatchStream<PlaybackState> {
        self.reconciler.watch()
    }

    /// Subscribe to session lifecycle events.
    pub async fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.lock().await.events()
    }

    /// Start playing `target`, replacing any previously active target.
    ///
    /// # Errors
    /// [`crate::ControlError::NotFound`] when the player cannot be
    /// launched; the state stays stopped.
    pub async fn play(&self, target: Target) -> Result<()> {
        let started = {
            let mut session = self.session.lock().await;
            match session.start(target.clone()).await {
                Ok(generation) => Ok(generation),
                // The failed start already stopped any previous player;
                // its generation is the post-stop one.
                Err(e) => Err((e, session.generation())),
            }
        };

        match started {
            Ok(generation) => {
                self.reconciler.begin_generation(generation);
                self.reconciler.apply_local(
                    generation,
                    LocalOutcome::Started {
                        track_id: target.id,
                    },
                );
                self.restart_pump(generation);
                Ok(())
            }
            Err((e, generation)) => {
                self.abort_pump();
                self.reconciler.begin_generation(generation);
                self.reconciler.apply_local(generation, LocalOutcome::Stopped);
                Err(e)
            }
        }
    }

    /// Adopt an already-running remote player as the active target.
    ///
    /// Seeds the canonical state from the player's reported status and
    /// metadata (the metadata fetch is retried, since the player may still
    /// be settling), then follows its notifications.
    ///
    /// # Errors
    /// Never fails today; kept fallible for parity with [`Self::play`].
    pub async fn play_remote(&self, target: Target, bus_name: &str) -> Result<()> {
        let generation = {
            let mut session = self.session.lock().await;
            session.start_remote(target.clone(), bus_name)
        };

        self.reconciler.begin_generation(generation);
        self.reconciler.apply_local(
            generation,
            LocalOutcome::Started {
                track_id: target.id,
            },
        );
        self.restart_pump(generation);

        // Seed from the player's actual state; the optimistic Playing above
        // is corrected the same way an external notification would be.
        if let Ok(Reply::Status(status)) = self.transport.send(Command::Status).await {
            self.reconciler
                .apply_notification(generation, Notification::StatusChanged(status));
        }
        if let Some(metadata) = fetch_metadata_with_retry(&self.transport, self.retry).await {
            self.reconciler
                .apply_notification(generation, Notification::MetadataChanged(metadata));
        }
        Ok(())
    }

    /// Stop playback. Idempotent.
    pub async fn stop(&self) {
        self.abort_pump();

        let generation = {
            let mut session = self.session.lock().await;
            session.stop();
            session.generation()
        };

        self.reconciler.begin_generation(generation);
        self.reconciler.apply_local(generation, LocalOutcome::Stopped);
    }

    /// Toggle pause on the active player.
    ///
    /// A busy transport makes this a silent no-op.
    ///
    /// # Errors
    /// Transport connection/protocol failures, for one-shot surfacing.
    pub async fn toggle_pause(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let generation = session.generation();

        if let Some(paused) = session.toggle_pause().await? {
            self.reconciler
                .apply_local(generation, LocalOutcome::Toggled { paused });
        }
        Ok(())
    }

    /// Skip to the next track.
    ///
    /// No optimistic update; the resulting track reaches the canonical
    /// state through the player's own change notifications.
    ///
    /// # Errors
    /// Transport connection/protocol failures.
    pub async fn next(&self) -> Result<()> {
        self.session.lock().await.next().await
    }

    /// Skip to the previous track.
    ///
    /// # Errors
    /// Transport connection/protocol failures.
    pub async fn previous(&self) -> Result<()> {
        self.session.lock().await.previous().await
    }

    /// Set the player volume, 0..=100. Fire-and-forget.
    pub async fn set_volume(&self, level: u8) {
        self.session.lock().await.set_volume(level).await;
    }

    /// Replace the notification pump with one bound to `generation`.
    ///
    /// The subscription is taken before the task is spawned, so nothing
    /// published between this call returning and the task's first poll
    /// can slip past the channel.
    fn restart_pump(&self, generation: u64) {
        let subscription = self.transport.notifications();
        let pump = tokio::spawn(pump_notifications(
            subscription,
            self.transport.clone(),
            self.reconciler.clone(),
            self.session.clone(),
            self.retry,
            generation,
        ));

        if let Ok(mut handle) = self.pump_handle.lock() {
            if let Some(previous) = handle.replace(pump) {
                previous.abort();
            }
        }
    }

    fn abort_pump(&self) {
        if let Ok(mut handle) = self.pump_handle.lock() {
            if let Some(previous) = handle.take() {
                previous.abort();
            }
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.abort_pump();
        self.volume_handle.abort();
    }
}

/// Forward settings volume changes into the session.
async fn follow_volume(settings: Arc<dyn Settings>, session: Arc<Mutex<PlayerSession>>) {
    let mut changes = settings.watch(keys::VOLUME);
    while let Some(value) = changes.next().await {
        let Some(level) = value.as_u64() else {
            warn!(%value, "ignoring non-numeric volume value");
            continue;
        };
        session.lock().await.set_volume(level.min(100) as u8).await;
    }
}

/// Consume the transport subscription for one session generation.
///
/// Holds the subscription for its whole lifetime; aborting this task is the
/// single release of the registration.
async fn pump_notifications(
    mut subscription: Subscription,
    transport: Arc<dyn Transport>,
    reconciler: Arc<StateReconciler>,
    session: Arc<Mutex<PlayerSession>>,
    retry: RetryPolicy,
    generation: u64,
) {
    while let Some(notification) = subscription.recv().await {
        match notification {
            Notification::MetadataChanged(metadata) if !metadata.is_complete() => {
                let settled = fetch_metadata_with_retry(&transport, retry).await;
                reconciler.apply_notification(
                    generation,
                    Notification::MetadataChanged(settled.unwrap_or(metadata)),
                );
            }
            Notification::PlayerVanished => {
                info!("player vanished, clearing session state");
                reconciler.apply_notification(generation, Notification::PlayerVanished);
                session.lock().await.stop();
                return;
            }
            other => reconciler.apply_notification(generation, other),
        }
    }

    debug!("notification stream ended");
}

/// The player may announce a track change before its own metadata settles;
/// poll it a bounded number of times before falling back to placeholders.
async fn fetch_metadata_with_retry(
    transport: &Arc<dyn Transport>,
    retry: RetryPolicy,
) -> Option<TrackMetadata> {
    let transport = transport.clone();
    retry
        .run(
            move || {
                let transport = transport.clone();
                async move {
                    match transport.send(Command::Metadata).await? {
                        Reply::Metadata(metadata) => Ok(metadata),
                        reply => Err(crate::ControlError::Protocol(format!(
                            "unexpected metadata reply: {reply:?}"
                        ))),
                    }
                }
            },
            TrackMetadata::is_complete,
        )
        .await
}
