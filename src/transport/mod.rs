//! The boundary abstraction for talking to an external player.
//!
//! Two concrete strategies share one contract: [`socket::SocketTransport`]
//! speaks the line-delimited JSON command protocol of a local player process
//! over a unix socket, [`mpris::MprisTransport`] drives a remote player over
//! D-Bus and relays its asynchronous property-change signals.

pub mod mpris;
pub mod proxy;
pub mod socket;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::Result;
use crate::types::{PlaybackStatus, TrackMetadata};

/// A request to the external player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Flip the pause flag.
    TogglePause,

    /// Read back the current pause flag.
    PauseState,

    /// Skip forward.
    Next,

    /// Skip backward.
    Previous,

    /// Read the current playback status.
    Status,

    /// Read the current track metadata.
    Metadata,

    /// Set the volume, 0..=100.
    SetVolume(u8),
}

/// The player's answer to a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Command acknowledged, nothing to report.
    None,

    /// Current pause flag.
    Paused(bool),

    /// Current playback status.
    Status(PlaybackStatus),

    /// Current track metadata.
    Metadata(TrackMetadata),
}

/// Asynchronous push notification from the player.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Playback status changed externally.
    StatusChanged(PlaybackStatus),

    /// Track metadata changed externally.
    MetadataChanged(TrackMetadata),

    /// The remote player identity appeared on the bus.
    PlayerAppeared,

    /// The remote player identity vanished; all derived state is stale.
    PlayerVanished,
}

/// A standing registration for [`Notification`]s.
///
/// Held by whoever pumps notifications into the reconciler; dropping it is
/// the single release of the registration.
pub struct Subscription {
    rx: broadcast::Receiver<Notification>,
}

impl Subscription {
    /// Wrap a raw broadcast receiver.
    ///
    /// Exposed so alternative [`Transport`] implementations can hand out
    /// subscriptions backed by their own channel.
    pub fn new(rx: broadcast::Receiver<Notification>) -> Self {
        Self { rx }
    }

    /// Next notification, in delivery order. `None` once the transport is
    /// gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notification subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Shared transport contract.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one command and await its reply.
    ///
    /// # Errors
    /// Fails with [`crate::ControlError::Busy`] when another command is
    /// already in flight, and with the `Connection`/`Timeout`/`Protocol`
    /// taxonomy for wire failures.
    async fn send(&self, command: Command) -> Result<Reply>;

    /// Register for asynchronous notifications.
    fn notifications(&self) -> Subscription;
}
