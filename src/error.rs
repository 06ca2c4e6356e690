use thiserror::Error;

/// Errors produced by transports and player sessions.
///
/// Everything here is recoverable: failures are reported to the caller (or
/// logged and swallowed where the caller cannot act on them) and never
/// propagate as panics past the session boundary.
#[derive(Error, Debug)]
pub enum ControlError {
    /// The external player is unreachable (connect refused, broken pipe).
    #[error("player unreachable: {0}")]
    Connection(String),

    /// No reply arrived within the transport's reply deadline.
    #[error("timed out waiting for player reply")]
    Timeout,

    /// The player answered with something we could not interpret.
    #[error("malformed player response: {0}")]
    Protocol(String),

    /// Another command is already in flight on this transport.
    ///
    /// Commands are dropped rather than queued; see `PlayerSession`.
    #[error("command already in flight")]
    Busy,

    /// The player process or binary does not exist.
    #[error("player not found: {0}")]
    NotFound(String),

    /// D-Bus communication failed.
    #[error("D-Bus operation failed: {0}")]
    Dbus(#[from] zbus::Error),

    /// Configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ControlError>;
