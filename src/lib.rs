//! lofictl - control-and-sync layer for external media players.
//!
//! Tracks "is a track playing, which one, and what should the UI show" by
//! combining a command/response channel to a local player process with
//! asynchronous push notifications from an MPRIS-style bus, reconciling
//! both into one canonical [`types::PlaybackState`]. The main pieces:
//!
//! - [`transport`] - the player boundary: a per-request unix-socket JSON
//!   protocol and an MPRIS D-Bus variant with signal subscriptions
//! - [`session`] - lifecycle of the one external player a session owns
//! - [`reconciler`] - last-writer-wins merge of optimistic command
//!   outcomes and authoritative notifications
//! - [`controller`] - the top-level coordinator a UI adapter drives
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lofictl::controller::Controller;
//! use lofictl::session::SpawnConfig;
//! use lofictl::settings::MemorySettings;
//! use lofictl::transport::socket::SocketTransport;
//! use lofictl::types::Target;
//!
//! # async fn run() -> lofictl::Result<()> {
//! let transport = Arc::new(SocketTransport::new("/tmp/lofictl.sock"));
//! let settings = Arc::new(MemorySettings::new());
//! let controller = Controller::new(transport, SpawnConfig::default(), settings);
//!
//! controller.play(Target::new("Chill Beats", "http://x/stream")).await?;
//! println!("{:?}", controller.current_state());
//! # Ok(())
//! # }
//! ```

/// Debug/driver command line.
pub mod cli;

/// CLI driver configuration.
pub mod config;

/// Top-level coordinator owning the current session.
pub mod controller;

/// Error taxonomy and result alias.
pub mod error;

/// Canonical-state reconciliation.
pub mod reconciler;

/// Bounded retry for fetches racing player state settling.
pub mod retry;

/// External player lifecycle.
pub mod session;

/// Injected key-value settings collaborator.
pub mod settings;

/// Structured logging setup.
pub mod tracing_config;

/// Player transports.
pub mod transport;

/// Core value types.
pub mod types;

pub use error::{ControlError, Result};
