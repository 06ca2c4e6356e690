use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use zbus::zvariant::OwnedValue;

/// Current playback status of the external player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Nothing is playing and no track is loaded.
    Stopped,

    /// A track is playing.
    Playing,

    /// A track is loaded but paused.
    Paused,
}

impl From<&str> for PlaybackStatus {
    fn from(status: &str) -> Self {
        match status {
            "Playing" => Self::Playing,
            "Paused" => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "Stopped",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        };
        write!(f, "{label}")
    }
}

/// The one canonical "what should the UI show" value.
///
/// Replaced wholesale on every reconciliation so observers never read a
/// half-updated value. Invariant: `track_id` is present exactly when
/// `status != Stopped`; the constructors below are the only way state is
/// built, which keeps that true by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    /// Playback status.
    pub status: PlaybackStatus,

    /// Stable id of the active target, if any.
    pub track_id: Option<String>,

    /// Current artist, when known.
    pub artist: Option<String>,

    /// Current title, when known.
    pub title: Option<String>,
}

impl PlaybackState {
    /// State with nothing playing.
    pub fn stopped() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            track_id: None,
            artist: None,
            title: None,
        }
    }

    /// State for a freshly started target, with no metadata yet.
    pub fn playing(track_id: impl Into<String>) -> Self {
        Self {
            status: PlaybackStatus::Playing,
            track_id: Some(track_id.into()),
            artist: None,
            title: None,
        }
    }

    /// Copy of this state with a new status.
    ///
    /// Transitioning to `Stopped` drops the track id and metadata, keeping
    /// the track-id invariant intact.
    pub fn with_status(&self, status: PlaybackStatus) -> Self {
        if status == PlaybackStatus::Stopped {
            return Self::stopped();
        }
        Self {
            status,
            ..self.clone()
        }
    }

    /// Copy of this state with artist and title fully replaced.
    ///
    /// Both fields are overwritten, even when the new values are absent, so
    /// stale metadata from a previous track never survives a change.
    pub fn with_metadata(&self, metadata: TrackMetadata) -> Self {
        Self {
            artist: metadata.artist,
            title: metadata.title,
            ..self.clone()
        }
    }

    /// Artist for display, falling back to a placeholder.
    pub fn artist_display(&self) -> &str {
        self.artist.as_deref().unwrap_or("Unknown Artist")
    }

    /// Title for display, falling back to a placeholder.
    pub fn title_display(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown Title")
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::stopped()
    }
}

/// Track metadata as reported by the external player.
///
/// Fields are optional because players routinely report metadata before
/// their own state has settled; `is_complete` is the validity predicate the
/// retry policy uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    /// Artist(s), joined with ", " when the player reports several.
    pub artist: Option<String>,

    /// Track title.
    pub title: Option<String>,
}

impl TrackMetadata {
    /// Whether both artist and title are present and non-empty.
    pub fn is_complete(&self) -> bool {
        let filled = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.is_empty());
        filled(&self.artist) && filled(&self.title)
    }
}

impl From<HashMap<String, OwnedValue>> for TrackMetadata {
    fn from(map: HashMap<String, OwnedValue>) -> Self {
        let title = map
            .get("xesam:title")
            .and_then(|value| String::try_from(value.clone()).ok())
            .filter(|s| !s.is_empty());

        let artist = map
            .get("xesam:artist")
            .and_then(|value| {
                if let Ok(array) = <&zbus::zvariant::Array>::try_from(value) {
                    let artists: Vec<String> = array
                        .iter()
                        .filter_map(|entry| {
                            if let Ok(s) = entry.downcast_ref::<String>() {
                                Some(s.clone())
                            } else if let Ok(s) = entry.downcast_ref::<&str>() {
                                Some(s.to_string())
                            } else {
                                None
                            }
                        })
                        .collect();
                    if artists.is_empty() {
                        None
                    } else {
                        Some(artists.join(", "))
                    }
                } else {
                    String::try_from(value.clone()).ok()
                }
            })
            .filter(|s| !s.is_empty());

        Self { artist, title }
    }
}

/// A user-selectable playable source (radio stream, track).
///
/// The `id` is stable: names and URIs may be edited in place without
/// changing which active session they refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Stable identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Playable URI.
    pub uri: String,
}

impl Target {
    /// Create a target with a freshly generated id.
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            uri: uri.into(),
        }
    }

    /// Parse a legacy `"name - url - id"` store entry.
    ///
    /// Older stores joined the fields with `" - "`; entries written before
    /// ids existed carry only `"name - url"` and get a generated id.
    /// Returns `None` for entries that do not match either shape.
    pub fn from_legacy_entry(entry: &str) -> Option<Self> {
        let parts: Vec<&str> = entry.split(" - ").collect();
        match parts.as_slice() {
            [name, uri, id] => Some(Self {
                id: (*id).to_string(),
                name: (*name).to_string(),
                uri: (*uri).to_string(),
            }),
            [name, uri] => Some(Self::new(*name, *uri)),
            _ => None,
        }
    }
}

/// Time-derived id, unique enough for locally edited target lists.
fn generate_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    format!("{:x}{nanos:x}", std::process::id())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn stopped_state_has_no_track_id() {
        let state = PlaybackState::stopped();
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert!(state.track_id.is_none());
    }

    #[test]
    fn status_transition_to_stopped_clears_track_id() {
        let state = PlaybackState::playing("r1").with_status(PlaybackStatus::Stopped);
        assert!(state.track_id.is_none());
        assert!(state.artist.is_none());
    }

    #[test]
    fn metadata_replacement_is_wholesale() {
        let full = TrackMetadata {
            artist: Some("Artist".into()),
            title: Some("Title".into()),
        };
        let state = PlaybackState::playing("r1").with_metadata(full);
        let replaced = state.with_metadata(TrackMetadata {
            artist: None,
            title: Some("Other".into()),
        });
        assert!(replaced.artist.is_none());
        assert_eq!(replaced.title.as_deref(), Some("Other"));
        assert_eq!(replaced.track_id.as_deref(), Some("r1"));
    }

    #[test]
    fn incomplete_metadata_is_detected() {
        assert!(!TrackMetadata::default().is_complete());
        assert!(
            !TrackMetadata {
                artist: Some(String::new()),
                title: Some("Title".into()),
            }
            .is_complete()
        );
        assert!(
            TrackMetadata {
                artist: Some("Artist".into()),
                title: Some("Title".into()),
            }
            .is_complete()
        );
    }

    #[test]
    fn legacy_entry_with_id_round_trips() {
        let target = Target::from_legacy_entry("Chill Beats - http://x/stream - abc123").unwrap();
        assert_eq!(target.name, "Chill Beats");
        assert_eq!(target.uri, "http://x/stream");
        assert_eq!(target.id, "abc123");
    }

    #[test]
    fn legacy_entry_without_id_gets_one() {
        let target = Target::from_legacy_entry("Chill Beats - http://x/stream").unwrap();
        assert!(!target.id.is_empty());
    }

    #[test]
    fn malformed_legacy_entry_is_rejected() {
        assert!(Target::from_legacy_entry("just a name").is_none());
    }

    #[test]
    fn display_placeholders_cover_missing_metadata() {
        let state = PlaybackState::playing("r1");
        assert_eq!(state.artist_display(), "Unknown Artist");
        assert_eq!(state.title_display(), "Unknown Title");
    }
}
