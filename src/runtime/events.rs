//! Event bus for observing engine runs
//!
//! Listeners subscribe by event name. Delivery is synchronous and follows
//! registration order; nothing is buffered, so listeners must be attached
//! before a run starts to see its first events.
//!
//! | name                | payload            |
//! |---------------------|--------------------|
//! | `start`             | [`StartEvent`]     |
//! | `block result`      | [`BlockResultEvent`] |
//! | `block <id> result` | [`BlockResultEvent`] |
//! | `error`             | [`ErrorEvent`]     |
//! | `end`               | [`EndEvent`]       |

use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::engine::StepError;
use crate::core::Params;

pub const START: &str = "start";
pub const BLOCK_RESULT: &str = "block result";
pub const ERROR: &str = "error";
pub const END: &str = "end";

/// Name of the event fired only for steps on block `id`.
pub fn block_result_for(id: &str) -> String {
    format!("block {} result", id)
}

// ── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartEvent {
    pub run_id: Uuid,
    pub id: String,
    pub params: Params,
    /// Milliseconds since the Unix epoch.
    pub start_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockResultEvent {
    pub run_id: Uuid,
    pub id: String,
    /// Arguments the block was run with.
    pub params: Params,
    /// Raw block output, before normalization.
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    pub run_id: Uuid,
    pub id: String,
    pub params: Params,
    #[serde(serialize_with = "serialize_display")]
    pub error: StepError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndEvent {
    pub run_id: Uuid,
    pub result: Params,
    /// Run duration in milliseconds.
    pub time: f64,
}

fn serialize_display<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Any event emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum EngineEvent {
    Start(StartEvent),
    BlockResult(BlockResultEvent),
    Error(ErrorEvent),
    End(EndEvent),
}

impl EngineEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            EngineEvent::Start(e) => e.run_id,
            EngineEvent::BlockResult(e) => e.run_id,
            EngineEvent::Error(e) => e.run_id,
            EngineEvent::End(e) => e.run_id,
        }
    }

    pub fn as_start(&self) -> Option<&StartEvent> {
        match self {
            EngineEvent::Start(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_block_result(&self) -> Option<&BlockResultEvent> {
        match self {
            EngineEvent::BlockResult(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorEvent> {
        match self {
            EngineEvent::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_end(&self) -> Option<&EndEvent> {
        match self {
            EngineEvent::End(e) => Some(e),
            _ => None,
        }
    }
}

// ── Bus ─────────────────────────────────────────────────────────────────────

/// Handle returned by [`EventBus::on`], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    once: bool,
    callback: Callback,
}

/// Synchronous publish/subscribe channel keyed by event name
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event emitted under `name`.
    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.subscribe(name.into(), false, Arc::new(listener))
    }

    /// Subscribe to the next event emitted under `name` only.
    pub fn once<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.subscribe(name.into(), true, Arc::new(listener))
    }

    fn subscribe(&self, name: String, once: bool, callback: Callback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(name)
            .or_default()
            .push(Listener { id, once, callback });
        id
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let mut removed = false;
        listeners.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|l| l.id != id);
            removed |= entries.len() != before;
            !entries.is_empty()
        });
        removed
    }

    /// Remove every listener subscribed under `name`.
    pub fn remove_all(&self, name: &str) {
        self.listeners.write().remove(name);
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.read().get(name).map_or(0, Vec::len)
    }

    /// Deliver `event` to the listeners of `name`, returning how many ran.
    ///
    /// Listeners run on a snapshot taken before the first one is called, so
    /// they may subscribe or unsubscribe without affecting this delivery.
    /// `once` listeners leave the table in the same critical section that
    /// takes the snapshot; concurrent emits never both claim one.
    pub fn emit(&self, name: &str, event: &EngineEvent) -> usize {
        let snapshot: Vec<Listener> = {
            let mut listeners = self.listeners.write();
            let Some(entries) = listeners.get_mut(name) else {
                return 0;
            };
            let snapshot = entries.clone();
            entries.retain(|l| !l.once);
            if entries.is_empty() {
                listeners.remove(name);
            }
            snapshot
        };

        for listener in &snapshot {
            (listener.callback)(event);
        }
        snapshot.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read();
        let counts: HashMap<&str, usize> = listeners.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}
