//! Store - deduplicating, hook-extensible state-merge engine
//!
//! One store serves one bus ("HOST" or "DEVICE"). `dispatch` merges
//! accepted state fragments into the authoritative map and fans them out
//! synchronously to subscribers; `subscribe` registers a callback with an
//! optional entity selector and a middleware chain. Loopback suppression
//! lets a store be fed by multiple producers without re-processing its own
//! prior output forwarded back to it.

mod metadata;
mod types;
mod validate;


pub use types::{
    fields, Direction, Dispatchable, DispatchFn, Middleware, Selector, State, SubscribeFn,
    Subscriber, Subscription,
};
pub use validate::{InvalidReason, Validated};

use crate::error::ErrorDispatchable;
use crate::hooks::StoreHooks;
use crate::middleware::apply_stage;
use metadata::{create_store_id, MetadataStamper};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Handler invoked when an error value is dispatched
///
/// Its return becomes the new state wholesale, bypassing merge, metadata,
/// and fan-out.
pub type ErrorHandler = Arc<dyn Fn(&ErrorDispatchable, &State) -> State + Send + Sync>;

/// Store construction arguments
pub struct StoreConfig {
    /// Logical bus this store serves (e.g. "HOST", "DEVICE")
    pub channel: String,
    /// Hook pipeline applied around state changes and registration
    pub hooks: StoreHooks,
    /// Error-value handler; the integration layer installs a logging
    /// default when none is supplied
    pub error_handler: Option<ErrorHandler>,
}

impl StoreConfig {
    /// Configuration with no hooks and no error handler
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            hooks: StoreHooks::default(),
            error_handler: None,
        }
    }
}

/// Create a store for one bus
pub fn create_store(config: StoreConfig) -> Store {
    Store::new(config)
}

/// Deduplicating state store with synchronous subscriber fan-out
#[derive(Clone)]
pub struct Store {
    /// Unique store identity, the basis of the loopback guard
    store_id: String,
    /// Stamper bound to this store's id and channel
    stamper: Arc<MetadataStamper>,
    /// Hook pipeline, fixed at construction
    hooks: Arc<StoreHooks>,
    /// Error-value handler
    error_handler: Option<ErrorHandler>,
    /// Authoritative state map
    state: Arc<RwLock<State>>,
    /// Registered subscribers (append-only)
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl Store {
    /// Create a new store with a fresh globally-unique id
    pub fn new(config: StoreConfig) -> Self {
        let store_id = create_store_id();
        debug!("Created store {} for channel {}", store_id, config.channel);

        Self {
            stamper: Arc::new(MetadataStamper::new(store_id.clone(), config.channel)),
            store_id,
            hooks: Arc::new(config.hooks),
            error_handler: config.error_handler,
            state: Arc::new(RwLock::new(State::new())),
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Unique id of this store instance
    pub fn id(&self) -> &str {
        &self.store_id
    }

    /// Snapshot of the full authoritative state
    pub fn current_state(&self) -> State {
        self.state.read().clone()
    }

    /// Submit a dispatchable
    ///
    /// Fire-and-forget: merge and subscriber fan-out complete synchronously
    /// on this call stack before the function returns. Malformed
    /// dispatchables and fragments fully consumed by the loopback guard are
    /// silent, side-effect-free no-ops.
    pub fn dispatch(&self, dispatchable: impl Into<Dispatchable>) {
        match dispatchable.into() {
            Dispatchable::Error(error) => self.handle_error(error),
            Dispatchable::State(fragment) => self.dispatch_state(fragment),
        }
    }

    /// Register a subscriber; returns its registration index
    ///
    /// Pre-subscribe hooks may transform the subscriber triple before it is
    /// registered; post-subscribe hooks run afterwards with the final
    /// triple (the replay-on-subscribe seam).
    pub fn subscribe<F>(
        &self,
        subscription: F,
        selector: Option<Selector>,
        middleware: Vec<Middleware>,
    ) -> usize
    where
        F: Fn(State) + Send + Sync + 'static,
    {
        self.subscribe_with(Subscriber::new(subscription, selector, middleware))
    }

    /// Register a prebuilt subscriber triple
    pub fn subscribe_with(&self, subscriber: Subscriber) -> usize {
        let mut subscriber = subscriber;
        for hook in &self.hooks.pre_subscribe {
            subscriber = hook(subscriber);
        }

        let index = {
            let mut subscribers = self.subscribers.write();
            subscribers.push(subscriber.clone());
            subscribers.len() - 1
        };

        for hook in &self.hooks.post_subscribe {
            hook(&subscriber);
        }

        index
    }

    fn handle_error(&self, error: ErrorDispatchable) {
        match &self.error_handler {
            Some(handler) => {
                let next = {
                    let state = self.state.read();
                    handler(&error, &state)
                };
                *self.state.write() = next;
            }
            None => warn!(
                "Dropped error dispatch without a configured handler: {}",
                error.message
            ),
        }
    }

    fn dispatch_state(&self, fragment: Value) {
        let candidate = match fragment {
            Value::Object(map) => self.strip_loopback(map),
            _ => {
                trace!("Rejected dispatchable: {}", InvalidReason::NotAnObject);
                return;
            }
        };

        let delta = match validate::validate_fragment(candidate) {
            Validated::Valid(delta) => delta,
            Validated::Invalid(reason) => {
                trace!("Rejected dispatchable: {}", reason);
                return;
            }
        };

        let stamped = self.stamper.stamp(delta);

        {
            let mut state = self.state.write();
            for (name, entity) in &stamped {
                // Shallow merge: the whole entity record is replaced per key
                state.insert(name.clone(), entity.clone());
            }
        }

        // Locks are released before fan-out so subscriber callbacks may
        // dispatch again on the same stack
        self.notify_subscribers(stamped);
    }

    /// Drop entities already stamped with this store's id (echo suppression)
    fn strip_loopback(&self, fragment: State) -> State {
        fragment
            .into_iter()
            .filter(|(name, entity)| {
                let seen = entity
                    .get(fields::STORE_ID)
                    .and_then(|ids| ids.get(&self.store_id))
                    .and_then(|flag| flag.as_bool())
                    .unwrap_or(false);
                if seen {
                    trace!("Loopback guard dropped entity '{}'", name);
                }
                !seen
            })
            .collect()
    }

    fn notify_subscribers(&self, delta: State) {
        // Global stages run once per dispatch, shared by all subscribers.
        // pre_update runs even when nobody is subscribed yet, so recording
        // hooks see every accepted dispatch.
        let delta = apply_stage(&self.hooks.pre_update, delta);

        let subscribers = self.subscribers.read().clone();
        if subscribers.is_empty() {
            return;
        }

        let shared = apply_stage(&self.hooks.pre_middleware, delta.clone());
        let snapshot = self.state.read().clone();

        for subscriber in subscribers {
            let selection = match &subscriber.selector {
                Some(selector) => project(&snapshot, selector),
                None => snapshot.clone(),
            };

            let staged = apply_stage(&subscriber.middleware, shared.clone());
            let staged = apply_stage(&self.hooks.post_middleware, staged);

            // The delta decides whether to fire; the projection decides
            // what is sent alongside it
            if let Some(selector) = &subscriber.selector {
                if !selector.iter().any(|name| delta.contains_key(name)) {
                    continue;
                }
            }

            // An empty delta after middleware means delivery was vetoed
            if staged.is_empty() {
                continue;
            }

            let mut payload = selection;
            payload.extend(staged);
            (subscriber.subscription)(payload);
        }
    }
}

/// Project the full state down to the selected keys that exist
fn project(state: &State, selector: &[String]) -> State {
    selector
        .iter()
        .filter_map(|name| {
            state
                .get(name)
                .map(|entity| (name.clone(), entity.clone()))
        })
        .collect()
}
