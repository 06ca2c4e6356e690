//! Transport over the session bus for MPRIS-capable players.
//!
//! Commands become two-way method calls on the player proxy; the
//! notification side relays `PropertiesChanged` signals and tracks the
//! presence of the player's well-known bus name, so a vanished player
//! reaches subscribers as [`Notification::PlayerVanished`].

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::{Connection, fdo};

use super::proxy::MediaPlayer2PlayerProxy;
use super::{Command, Notification, Reply, Subscription, Transport};
use crate::error::Result;
use crate::types::{PlaybackStatus, TrackMetadata};

/// MPRIS transport bound to one well-known bus name.
pub struct MprisTransport {
    proxy: MediaPlayer2PlayerProxy<'static>,
    notify_tx: broadcast::Sender<Notification>,
    monitor_handle: JoinHandle<()>,
    watch_handle: JoinHandle<()>,
}

impl MprisTransport {
    /// Connect to the session bus and bind to `bus_name`.
    ///
    /// Starts the property-change relay and the bus-name presence watch.
    /// The bound player does not have to be present yet; its appearance is
    /// reported as [`Notification::PlayerAppeared`].
    ///
    /// # Errors
    /// Fails if the session bus connection or proxy construction fails.
    pub async fn connect(bus_name: &str) -> Result<Self> {
        let connection = Connection::session().await?;
        Self::with_connection(connection, bus_name).await
    }

    /// Bind to `bus_name` on an existing connection.
    ///
    /// # Errors
    /// Fails if proxy construction fails.
    pub async fn with_connection(connection: Connection, bus_name: &str) -> Result<Self> {
        let proxy = MediaPlayer2PlayerProxy::builder(&connection)
            .destination(bus_name.to_string())?
            .build()
            .await?;

        let (notify_tx, _) = broadcast::channel(64);

        let monitor_handle = tokio::spawn(relay_property_changes(proxy.clone(), notify_tx.clone()));
        let watch_handle = tokio::spawn(watch_bus_name(
            connection,
            bus_name.to_string(),
            notify_tx.clone(),
        ));

        Ok(Self {
            proxy,
            notify_tx,
            monitor_handle,
            watch_handle,
        })
    }
}

#[async_trait::async_trait]
impl Transport for MprisTransport {
    async fn send(&self, command: Command) -> Result<Reply> {
        let reply = match command {
            Command::TogglePause => {
                self.proxy.play_pause().await?;
                Reply::None
            }
            Command::Next => {
                self.proxy.next().await?;
                Reply::None
            }
            Command::Previous => {
                self.proxy.previous().await?;
                Reply::None
            }
            Command::PauseState => {
                let status = self.proxy.playback_status().await?;
                Reply::Paused(PlaybackStatus::from(status.as_str()) == PlaybackStatus::Paused)
            }
            Command::Status => {
                let status = self.proxy.playback_status().await?;
                Reply::Status(PlaybackStatus::from(status.as_str()))
            }
            Command::Metadata => {
                let map = self.proxy.metadata().await?;
                Reply::Metadata(TrackMetadata::from(map))
            }
            Command::SetVolume(level) => {
                self.proxy
                    .set_volume(f64::from(level.min(100)) / 100.0)
                    .await?;
                Reply::None
            }
        };
        Ok(reply)
    }

    fn notifications(&self) -> Subscription {
        Subscription::new(self.notify_tx.subscribe())
    }
}

impl Drop for MprisTransport {
    fn drop(&mut self) {
        self.monitor_handle.abort();
        self.watch_handle.abort();
    }
}

/// Forward property-change signals as notifications, in delivery order.
async fn relay_property_changes(
    proxy: MediaPlayer2PlayerProxy<'static>,
    notify_tx: broadcast::Sender<Notification>,
) {
    let mut status_changes = proxy.receive_playback_status_changed().await;
    let mut metadata_changes = proxy.receive_metadata_changed().await;

    loop {
        tokio::select! {
            signal = status_changes.next() => {
                let Some(signal) = signal else {
                    debug!("playback status updates stopped");
                    return;
                };
                if let Ok(status) = signal.get().await {
                    let status = PlaybackStatus::from(status.as_str());
                    let _ = notify_tx.send(Notification::StatusChanged(status));
                }
            }
            signal = metadata_changes.next() => {
                let Some(signal) = signal else {
                    debug!("metadata updates stopped");
                    return;
                };
                if let Ok(map) = signal.get().await {
                    let metadata = TrackMetadata::from(map);
                    let _ = notify_tx.send(Notification::MetadataChanged(metadata));
                }
            }
        }
    }
}

/// Watch the player's well-known name for appear/vanish transitions.
async fn watch_bus_name(
    connection: Connection,
    bus_name: String,
    notify_tx: broadcast::Sender<Notification>,
) {
    let dbus_proxy = match fdo::DBusProxy::new(&connection).await {
        Ok(proxy) => proxy,
        Err(e) => {
            warn!(error = %e, "bus name watch unavailable");
            return;
        }
    };

    let mut name_owner_changed = match dbus_proxy.receive_name_owner_changed().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "could not subscribe to name owner changes");
            return;
        }
    };

    while let Some(signal) = name_owner_changed.next().await {
        let Ok(args) = signal.args() else {
            continue;
        };

        if args.name().as_str() != bus_name {
            continue;
        }

        match (args.old_owner().as_deref(), args.new_owner().as_deref()) {
            (None, Some(_)) => {
                info!(%bus_name, "player appeared on the bus");
                let _ = notify_tx.send(Notification::PlayerAppeared);
            }
            (Some(_), None) => {
                info!(%bus_name, "player vanished from the bus");
                let _ = notify_tx.send(Notification::PlayerVanished);
            }
            _ => {}
        }
    }
}
