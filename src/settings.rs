//! Injected key-value settings collaborator.
//!
//! The core never persists settings itself; it consumes whatever store the
//! host wires in through the [`Settings`] trait and reacts to change
//! notifications. [`MemorySettings`] backs the CLI driver and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_stream::stream;
use futures::stream::BoxStream;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

use crate::types::Target;

/// Settings keys the core reads.
pub mod keys {
    /// Player volume, integer 0..=100.
    pub const VOLUME: &str = "volume";

    /// Configured target list.
    pub const TARGETS: &str = "targets";
}

/// Key-value store with change notification.
///
/// Keys are strings, values are JSON. `watch` yields every new value
/// written to one key, in write order.
pub trait Settings: Send + Sync {
    /// Current value for `key`, if set.
    fn get(&self, key: &str) -> Option<Value>;

    /// Write `value` under `key` and notify watchers.
    fn set(&self, key: &str, value: Value);

    /// Stream of new values for `key`.
    fn watch(&self, key: &str) -> BoxStream<'static, Value>;
}

/// In-memory [`Settings`] implementation.
pub struct MemorySettings {
    values: RwLock<HashMap<String, Value>>,
    changes_tx: broadcast::Sender<(String, Value)>,
}

impl MemorySettings {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(64);
        Self {
            values: RwLock::new(HashMap::new()),
            changes_tx,
        }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings for MemorySettings {
    fn get(&self, key: &str) -> Option<Value> {
        match self.values.read() {
            Ok(values) => values.get(key).cloned(),
            Err(_) => None,
        }
    }

    fn set(&self, key: &str, value: Value) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value.clone());
        }
        let _ = self.changes_tx.send((key.to_string(), value));
    }

    fn watch(&self, key: &str) -> BoxStream<'static, Value> {
        let mut rx = self.changes_tx.subscribe();
        let key = key.to_string();

        Box::pin(stream! {
            loop {
                let (changed, value) = match rx.recv().await {
                    Ok(change) => change,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "settings watcher lagged behind");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if changed == key {
                    yield value;
                }
            }
        })
    }
}

/// Read the volume key, clamped to 0..=100. Defaults to 50.
pub fn volume(settings: &dyn Settings) -> u8 {
    settings
        .get(keys::VOLUME)
        .and_then(|value| value.as_u64())
        .map_or(50, |level| level.min(100) as u8)
}

/// Read the configured target list.
///
/// Accepts both the structured form (array of objects) and the legacy
/// separator-joined string entries written by older stores; unparsable
/// entries are skipped with a warning.
pub fn targets(settings: &dyn Settings) -> Vec<Target> {
    let Some(Value::Array(entries)) = settings.get(keys::TARGETS) else {
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(legacy) => {
                let parsed = Target::from_legacy_entry(&legacy);
                if parsed.is_none() {
                    warn!(entry = %legacy, "skipping unparsable legacy target entry");
                }
                parsed
            }
            structured => serde_json::from_value(structured).ok(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use futures::StreamExt;
    use serde_json::json;

    use super::*;

    #[test]
    fn volume_defaults_and_clamps() {
        let store = MemorySettings::new();
        assert_eq!(volume(&store), 50);

        store.set(keys::VOLUME, json!(250));
        assert_eq!(volume(&store), 100);
    }

    #[test]
    fn targets_accept_mixed_legacy_and_structured_entries() {
        let store = MemorySettings::new();
        store.set(
            keys::TARGETS,
            json!([
                "Chill - http://x/a - id1",
                { "id": "id2", "name": "Jazz", "uri": "http://x/b" },
                "garbage entry",
            ]),
        );

        let parsed = targets(&store);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, "id1");
        assert_eq!(parsed[1].name, "Jazz");
    }

    #[tokio::test]
    async fn watch_sees_only_its_key() {
        let store = MemorySettings::new();
        let mut changes = store.watch(keys::VOLUME);

        store.set(keys::TARGETS, json!([]));
        store.set(keys::VOLUME, json!(30));

        let value = changes.next().await.unwrap();
        assert_eq!(value, json!(30));
    }
}
