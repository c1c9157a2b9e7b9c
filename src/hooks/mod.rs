//! Lifecycle hooks and their composition
//!
//! A lifecycle hook contributes optional behavior at integration creation
//! time plus per-store transformation slots for each bus. Every slot
//! defaults to a no-op; implementors override only what they need. Hooks
//! execute in registration order and must not panic to abort an in-flight
//! dispatch — a panicking hook propagates to the dispatching caller.

mod history;

pub use history::{HistoryHook, RemoteHistorySource, HISTORY_ENTITY};

use crate::integration::Iotes;
use crate::store::{Middleware, Subscriber};
use std::sync::Arc;

/// Hook applied to a subscriber triple before registration
pub type PreSubscribeHook = Arc<dyn Fn(Subscriber) -> Subscriber + Send + Sync>;

/// Hook run with the final (transformed) subscriber triple after
/// registration; used for replay-on-subscribe patterns
pub type PostSubscribeHook = Arc<dyn Fn(&Subscriber) + Send + Sync>;

/// Ordered per-store transformation slots
///
/// Each slot composes left-to-right in registration order.
#[derive(Clone, Default)]
pub struct StoreHooks {
    pub pre_subscribe: Vec<PreSubscribeHook>,
    pub post_subscribe: Vec<PostSubscribeHook>,
    pub pre_middleware: Vec<Middleware>,
    pub post_middleware: Vec<Middleware>,
    pub pre_update: Vec<Middleware>,
}

impl StoreHooks {
    /// Append another bundle's slots after this one's, preserving order
    pub fn extend(&mut self, other: StoreHooks) {
        self.pre_subscribe.extend(other.pre_subscribe);
        self.post_subscribe.extend(other.post_subscribe);
        self.pre_middleware.extend(other.pre_middleware);
        self.post_middleware.extend(other.post_middleware);
        self.pre_update.extend(other.pre_update);
    }
}

/// A composable lifecycle extension for the integration
pub trait LifecycleHook: Send + Sync {
    /// Runs once, synchronously, before either store exists
    ///
    /// Side effects only; must not block on asynchronous work.
    fn pre_create(&self) {}

    /// Runs once the integration and both stores are live
    ///
    /// May spawn asynchronous work; the orchestrator does not await it.
    fn post_create(&self, _iotes: &Iotes) {}

    /// Store hook slots contributed to the host bus
    fn host_hooks(&self) -> StoreHooks {
        StoreHooks::default()
    }

    /// Store hook slots contributed to the device bus
    fn device_hooks(&self) -> StoreHooks {
        StoreHooks::default()
    }
}

/// Registered hooks fanned into categorized, ordered bundles
pub struct ComposedHooks {
    /// Hooks participating in pre/post-create, in registration order
    pub creation: Vec<Arc<dyn LifecycleHook>>,
    /// Host-store slots, merged in registration order
    pub host: StoreHooks,
    /// Device-store slots, merged in registration order
    pub device: StoreHooks,
}

/// Fan a hook list into creation hooks plus per-bus store hooks
pub fn compose_hooks(hooks: &[Arc<dyn LifecycleHook>]) -> ComposedHooks {
    let mut host = StoreHooks::default();
    let mut device = StoreHooks::default();

    for hook in hooks {
        host.extend(hook.host_hooks());
        device.extend(hook.device_hooks());
    }

    ComposedHooks {
        creation: hooks.to_vec(),
        host,
        device,
    }
}
