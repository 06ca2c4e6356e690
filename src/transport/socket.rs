//! Request/response transport over the player's local IPC socket.
//!
//! Speaks mpv's JSON IPC: one `{"command": [verb, ...args]}` object per
//! line, one reply line back. The connection is opened per request and
//! closed afterwards, so a player that is not listening costs one failed
//! connect instead of a leaked half-open stream.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::{Command, Notification, Reply, Subscription, Transport};
use crate::error::{ControlError, Result};
use crate::types::{PlaybackStatus, TrackMetadata};

const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// One reply line from the player.
#[derive(Debug, Deserialize)]
struct IpcReply {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Per-request unix socket transport.
pub struct SocketTransport {
    socket_path: PathBuf,
    reply_timeout: Duration,
    in_flight: AtomicBool,
    notify_tx: broadcast::Sender<Notification>,
}

impl SocketTransport {
    /// Transport for the player socket at `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        let (notify_tx, _) = broadcast::channel(64);
        Self {
            socket_path: socket_path.into(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            in_flight: AtomicBool::new(false),
            notify_tx,
        }
    }

    /// Override the reply deadline.
    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    /// Socket path this transport talks to.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Ask the player to shut down.
    ///
    /// Fire-and-forget: the player tears the socket down on exit, so no
    /// reply is awaited. Failing to connect means no player is listening.
    ///
    /// # Errors
    /// `Connection` when the socket is gone, `Busy` when a command is
    /// already in flight.
    pub async fn quit(&self) -> Result<()> {
        if self.in_flight.swap(true, Ordering::Acquire) {
            return Err(ControlError::Busy);
        }
        let payload = json!({ "command": ["quit"] }).to_string();
        let result = self.send_line(&payload).await;
        self.in_flight.store(false, Ordering::Release);
        result
    }

    async fn send_line(&self, payload: &str) -> Result<()> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| ControlError::Connection(e.to_string()))?;
        let (_reader, mut writer) = stream.into_split();
        writer
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| ControlError::Connection(e.to_string()))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| ControlError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn exchange(&self, command: &Command) -> Result<Reply> {
        let payload = encode(command);
        trace!(%payload, "sending player command");

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| ControlError::Connection(e.to_string()))?;
        let (reader, mut writer) = stream.into_split();

        writer
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| ControlError::Connection(e.to_string()))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| ControlError::Connection(e.to_string()))?;

        let mut lines = BufReader::new(reader).lines();
        let line = tokio::time::timeout(self.reply_timeout, lines.next_line())
            .await
            .map_err(|_| ControlError::Timeout)?
            .map_err(|e| ControlError::Connection(e.to_string()))?
            .ok_or_else(|| ControlError::Protocol("connection closed before reply".to_string()))?;

        trace!(reply = %line, "received player reply");
        decode(command, &line)
    }
}

#[async_trait::async_trait]
impl Transport for SocketTransport {
    async fn send(&self, command: Command) -> Result<Reply> {
        // One command on the wire at a time; overlapping calls are rejected,
        // not queued, so interleaved writes can never corrupt the channel.
        if self.in_flight.swap(true, Ordering::Acquire) {
            debug!(?command, "dropping command, another is in flight");
            return Err(ControlError::Busy);
        }

        let result = self.exchange(&command).await;
        self.in_flight.store(false, Ordering::Release);
        result
    }

    fn notifications(&self) -> Subscription {
        // The per-request protocol carries no push events; the channel stays
        // open but silent so subscribers outlive idle periods.
        Subscription::new(self.notify_tx.subscribe())
    }
}

fn encode(command: &Command) -> String {
    let args = match command {
        Command::TogglePause => json!(["cycle", "pause"]),
        Command::PauseState | Command::Status => json!(["get_property", "pause"]),
        Command::Next => json!(["playlist-next"]),
        Command::Previous => json!(["playlist-prev"]),
        Command::Metadata => json!(["get_property", "metadata"]),
        Command::SetVolume(level) => json!(["set_property", "volume", level]),
    };
    json!({ "command": args }).to_string()
}

fn decode(command: &Command, line: &str) -> Result<Reply> {
    let reply: IpcReply = serde_json::from_str(line)
        .map_err(|e| ControlError::Protocol(format!("unparsable reply: {e}")))?;

    if let Some(error) = reply.error.as_deref() {
        if error != "success" {
            return Err(ControlError::Protocol(format!("player reported: {error}")));
        }
    }

    let reply = match command {
        Command::TogglePause | Command::Next | Command::Previous | Command::SetVolume(_) => {
            Reply::None
        }
        Command::PauseState => {
            let paused = reply
                .data
                .as_ref()
                .and_then(Value::as_bool)
                .ok_or_else(|| ControlError::Protocol("pause flag missing".to_string()))?;
            Reply::Paused(paused)
        }
        Command::Status => {
            let paused = reply
                .data
                .as_ref()
                .and_then(Value::as_bool)
                .ok_or_else(|| ControlError::Protocol("pause flag missing".to_string()))?;
            Reply::Status(if paused {
                PlaybackStatus::Paused
            } else {
                PlaybackStatus::Playing
            })
        }
        Command::Metadata => {
            let data = reply.data.unwrap_or(Value::Null);
            Reply::Metadata(metadata_from_json(&data))
        }
    };
    Ok(reply)
}

/// Decode the player's metadata map, tolerating its uppercase and icy
/// stream-tag variants.
fn metadata_from_json(data: &Value) -> TrackMetadata {
    let field = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.is_empty())
    };

    TrackMetadata {
        artist: field("artist").or_else(|| field("ARTIST")),
        title: field("title")
            .or_else(|| field("TITLE"))
            .or_else(|| field("icy-title")),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn commands_encode_to_single_json_lines() {
        assert_eq!(
            encode(&Command::TogglePause),
            r#"{"command":["cycle","pause"]}"#
        );
        assert_eq!(
            encode(&Command::SetVolume(40)),
            r#"{"command":["set_property","volume",40]}"#
        );
    }

    #[test]
    fn pause_reply_decodes() {
        let reply = decode(
            &Command::PauseState,
            r#"{"data":true,"error":"success","request_id":0}"#,
        )
        .unwrap();
        assert_eq!(reply, Reply::Paused(true));
    }

    #[test]
    fn player_error_becomes_protocol_error() {
        let err = decode(&Command::PauseState, r#"{"error":"property unavailable"}"#).unwrap_err();
        assert!(matches!(err, ControlError::Protocol(_)));
    }

    #[test]
    fn garbage_reply_becomes_protocol_error() {
        let err = decode(&Command::Metadata, "null").unwrap_err();
        assert!(matches!(err, ControlError::Protocol(_)));
        let err = decode(&Command::Metadata, "not even json").unwrap_err();
        assert!(matches!(err, ControlError::Protocol(_)));
    }

    #[test]
    fn metadata_falls_back_through_tag_variants() {
        let decoded = metadata_from_json(&serde_json::json!({
            "ARTIST": "Someone",
            "icy-title": "Stream Title",
        }));
        assert_eq!(decoded.artist.as_deref(), Some("Someone"));
        assert_eq!(decoded.title.as_deref(), Some("Stream Title"));
    }
}
