//! Merges optimistic command outcomes with authoritative external
//! notifications into one canonical [`PlaybackState`].

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::transport::Notification;
use crate::types::{PlaybackState, PlaybackStatus};

/// Outcome of a local command, applied optimistically.
#[derive(Debug, Clone)]
pub enum LocalOutcome {
    /// A target started playing.
    Started {
        /// Stable id of the started target.
        track_id: String,
    },

    /// A toggle command succeeded; the player reported this pause flag.
    Toggled {
        /// Whether the player is now paused.
        paused: bool,
    },

    /// The session stopped.
    Stopped,
}

/// The single serialization point for [`PlaybackState`] mutation.
///
/// Two inputs funnel through it: optimistic local command outcomes and
/// external notifications. Notifications always win over a stale optimistic
/// update because they fully replace the fields they cover. Every accepted
/// mutation replaces the state wholesale and wakes all watchers, so no
/// observer ever reads a half-updated value.
pub struct StateReconciler {
    state_tx: watch::Sender<PlaybackState>,
    generation: AtomicU64,
}

impl StateReconciler {
    /// Reconciler starting from the stopped state, generation 0.
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::stopped());
        Self {
            state_tx,
            generation: AtomicU64::new(0),
        }
    }

    /// Snapshot of the canonical state.
    pub fn current(&self) -> PlaybackState {
        self.state_tx.borrow().clone()
    }

    /// Stream yielding the current state immediately, then every change.
    pub fn watch(&self) -> WatchStream<PlaybackState> {
        WatchStream::new(self.state_tx.subscribe())
    }

    /// Adopt `generation` as the live session generation.
    ///
    /// Events carrying any other generation are stale and get dropped; this
    /// is what keeps a late-arriving reply from a stopped session out of
    /// the live state.
    pub fn begin_generation(&self, generation: u64) {
        self.generation.store(generation, Ordering::SeqCst);
    }

    fn is_live(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Apply an optimistic local command outcome.
    pub fn apply_local(&self, generation: u64, outcome: LocalOutcome) {
        if !self.is_live(generation) {
            debug!(generation, ?outcome, "dropping stale local outcome");
            return;
        }

        let next = match outcome {
            LocalOutcome::Started { track_id } => PlaybackState::playing(track_id),
            LocalOutcome::Toggled { paused } => {
                let current = self.current();
                if current.status == PlaybackStatus::Stopped {
                    return;
                }
                current.with_status(if paused {
                    PlaybackStatus::Paused
                } else {
                    PlaybackStatus::Playing
                })
            }
            LocalOutcome::Stopped => PlaybackState::stopped(),
        };
        self.replace(next);
    }

    /// Apply an authoritative external notification.
    ///
    /// The fields a notification covers are replaced outright, never merged
    /// field-by-field from possibly-partial old data.
    pub fn apply_notification(&self, generation: u64, notification: Notification) {
        if !self.is_live(generation) {
            debug!(generation, ?notification, "dropping stale notification");
            return;
        }

        let current = self.current();
        let next = match notification {
            Notification::StatusChanged(status) => {
                if current.status == PlaybackStatus::Stopped && status != PlaybackStatus::Stopped {
                    // No live target to attach the status to.
                    debug!(%status, "ignoring status for a stopped session");
                    return;
                }
                current.with_status(status)
            }
            Notification::MetadataChanged(metadata) => {
                if current.status == PlaybackStatus::Stopped {
                    return;
                }
                current.with_metadata(metadata)
            }
            Notification::PlayerVanished => PlaybackState::stopped(),
            Notification::PlayerAppeared => {
                debug!("player appeared");
                return;
            }
        };
        self.replace(next);
    }

    fn replace(&self, next: PlaybackState) {
        self.state_tx.send_replace(next);
    }
}

impl Default for StateReconciler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::types::TrackMetadata;

    fn playing_reconciler() -> StateReconciler {
        let reconciler = StateReconciler::new();
        reconciler.begin_generation(1);
        reconciler.apply_local(
            1,
            LocalOutcome::Started {
                track_id: "r1".to_string(),
            },
        );
        reconciler
    }

    #[test]
    fn notification_wins_over_optimistic_toggle() {
        let reconciler = playing_reconciler();

        reconciler.apply_local(1, LocalOutcome::Toggled { paused: false });
        reconciler.apply_notification(1, Notification::StatusChanged(PlaybackStatus::Paused));

        let state = reconciler.current();
        assert_eq!(state.status, PlaybackStatus::Paused);
        assert_eq!(state.track_id.as_deref(), Some("r1"));
    }

    #[test]
    fn stale_generation_events_are_dropped() {
        let reconciler = playing_reconciler();
        reconciler.begin_generation(2);

        reconciler.apply_local(1, LocalOutcome::Toggled { paused: true });
        reconciler.apply_notification(1, Notification::StatusChanged(PlaybackStatus::Stopped));

        assert_eq!(reconciler.current().status, PlaybackStatus::Playing);
    }

    #[test]
    fn vanish_resets_to_stopped() {
        let reconciler = playing_reconciler();

        reconciler.apply_notification(1, Notification::PlayerVanished);

        let state = reconciler.current();
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert!(state.track_id.is_none());
    }

    #[test]
    fn metadata_notification_replaces_fields_wholesale() {
        let reconciler = playing_reconciler();
        reconciler.apply_notification(
            1,
            Notification::MetadataChanged(TrackMetadata {
                artist: Some("Artist".into()),
                title: Some("Title".into()),
            }),
        );

        reconciler.apply_notification(
            1,
            Notification::MetadataChanged(TrackMetadata {
                artist: None,
                title: Some("Next Title".into()),
            }),
        );

        let state = reconciler.current();
        assert!(state.artist.is_none());
        assert_eq!(state.title.as_deref(), Some("Next Title"));
    }

    #[test]
    fn status_for_stopped_session_is_ignored() {
        let reconciler = StateReconciler::new();
        reconciler.begin_generation(1);

        reconciler.apply_notification(1, Notification::StatusChanged(PlaybackStatus::Playing));

        assert_eq!(reconciler.current().status, PlaybackStatus::Stopped);
        assert!(reconciler.current().track_id.is_none());
    }
}
