//! Core state and subscriber type definitions
//!
//! Defines the state map exchanged on each bus, the dispatchable envelope
//! accepted by [`Store::dispatch`](super::Store::dispatch), and the
//! subscriber triple registered via
//! [`Store::subscribe`](super::Store::subscribe).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::ErrorDispatchable;

/// Reserved metadata field names written by the store
///
/// Preserved verbatim for interop with other iotes implementations.
pub mod fields {
    /// Store-local clock reading at merge time (milliseconds, as a string)
    pub const TIMESTAMP: &str = "@@iotes_timestamp";
    /// Owning-store-id set: store id -> true (multi-store provenance)
    pub const STORE_ID: &str = "@@iotes_storeId";
    /// Logical bus the stamping store serves (e.g. "HOST", "DEVICE")
    pub const CHANNEL: &str = "@@iotes_channel";
    /// Unique id shared by all entities accepted in one dispatch
    pub const DISPATCHABLE_ID: &str = "@@iotes_dispatchableId";
    /// Travel direction of the entity ("I", "O" or "B")
    pub const DIRECTION: &str = "@@iotes_direction";
    /// Originating layer of an application dispatch
    pub const SOURCE: &str = "@@source";
    /// Bus label stamped on application dispatches
    pub const BUS: &str = "@@bus";
}

/// State map for one bus: entity name -> entity record (a JSON object)
pub type State = serde_json::Map<String, Value>;

/// Subscriber callback, invoked synchronously with the merged
/// selection-plus-delta payload
pub type Subscription = Arc<dyn Fn(State) + Send + Sync>;

/// The set of entity names a subscriber restricts itself to
pub type Selector = Vec<String>;

/// Per-subscription transform applied to the delta before delivery
///
/// Returning `None` suppresses delivery for this subscriber only.
pub type Middleware = Arc<dyn Fn(State) -> Option<State> + Send + Sync>;

/// Shareable dispatch handle bound to one store
pub type DispatchFn = Arc<dyn Fn(Dispatchable) + Send + Sync>;

/// Shareable subscribe handle bound to one store; returns the subscriber's
/// registration index
pub type SubscribeFn =
    Arc<dyn Fn(Subscription, Option<Selector>, Vec<Middleware>) -> usize + Send + Sync>;

/// A message submitted to a store
///
/// State fragments are carried as raw JSON so malformed shapes (strings,
/// arrays, numbers) reach the validator and are rejected wholesale rather
/// than being unrepresentable at the call site.
#[derive(Debug, Clone)]
pub enum Dispatchable {
    /// Candidate state fragment, validated at dispatch time
    State(Value),
    /// Error value routed to the store's error handler
    Error(ErrorDispatchable),
}

impl From<State> for Dispatchable {
    fn from(fragment: State) -> Self {
        Dispatchable::State(Value::Object(fragment))
    }
}

impl From<Value> for Dispatchable {
    fn from(value: Value) -> Self {
        Dispatchable::State(value)
    }
}

impl From<ErrorDispatchable> for Dispatchable {
    fn from(error: ErrorDispatchable) -> Self {
        Dispatchable::Error(error)
    }
}

/// Travel direction of a dispatchable relative to a bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// From strategy to bus
    #[serde(rename = "I")]
    Inbound,
    /// From application to bus
    #[serde(rename = "O")]
    Outbound,
    /// Both directions (meaningful for filters only)
    #[serde(rename = "B")]
    Both,
}

impl Direction {
    /// Wire representation stamped into entity records
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "I",
            Direction::Outbound => "O",
            Direction::Both => "B",
        }
    }

    /// Parse from the wire representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "I" => Some(Direction::Inbound),
            "O" => Some(Direction::Outbound),
            "B" => Some(Direction::Both),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered subscriber: callback, optional entity selector, and the
/// middleware chain applied to each delta before delivery
#[derive(Clone)]
pub struct Subscriber {
    pub subscription: Subscription,
    pub selector: Option<Selector>,
    pub middleware: Vec<Middleware>,
}

impl Subscriber {
    /// Build a subscriber triple from a plain callback
    pub fn new<F>(subscription: F, selector: Option<Selector>, middleware: Vec<Middleware>) -> Self
    where
        F: Fn(State) + Send + Sync + 'static,
    {
        Self {
            subscription: Arc::new(subscription),
            selector,
            middleware,
        }
    }
}
