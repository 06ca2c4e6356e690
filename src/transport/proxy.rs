//! D-Bus proxy definition for the MPRIS player-control interface.

use std::collections::HashMap;

use zbus::{Result, proxy};

/// MPRIS `org.mpris.MediaPlayer2.Player` proxy, limited to the controls
/// and properties the sync layer consumes.
#[proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_service = "org.mpris.MediaPlayer2",
    default_path = "/org/mpris/MediaPlayer2"
)]
pub trait MediaPlayer2Player {
    /// Toggle play/pause state.
    fn play_pause(&self) -> Result<()>;

    /// Skip to the next track.
    fn next(&self) -> Result<()>;

    /// Skip to the previous track.
    fn previous(&self) -> Result<()>;

    /// Current playback status (Playing, Paused, Stopped).
    #[zbus(property)]
    fn playback_status(&self) -> Result<String>;

    /// Current track metadata.
    #[zbus(property)]
    fn metadata(&self) -> Result<HashMap<String, zbus::zvariant::OwnedValue>>;

    /// Current volume level (0.0 to 1.0).
    #[zbus(property)]
    fn volume(&self) -> Result<f64>;

    /// Set volume level.
    #[zbus(property)]
    fn set_volume(&self, volume: f64) -> Result<()>;
}
