//! History lifecycle hook
//!
//! Records every delta accepted on the device bus and replays the
//! accumulated history to each new subscriber, so late subscribers catch up
//! on traffic they missed. Optionally seeds the history from a remote
//! source once the integration is live; the load is spawned and never
//! blocks setup.

use super::{LifecycleHook, StoreHooks};
use crate::dispatch::create_device_dispatchable;
use crate::integration::Iotes;
use crate::store::{State, Subscriber};
use parking_lot::RwLock;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Entity name used for history replay dispatchables
pub const HISTORY_ENTITY: &str = "IOTES_HISTORY_HOOK";

/// Caller-supplied asynchronous source of seed history
pub type RemoteHistorySource = Arc<
    dyn Fn() -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<State>>> + Send>> + Send + Sync,
>;

/// Where the accumulated history has been loaded from so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryStatus {
    LocalOnly,
    All,
}

impl HistoryStatus {
    fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::LocalOnly => "LOCAL_ONLY",
            HistoryStatus::All => "ALL",
        }
    }
}

/// Device-bus history recorder with replay-on-subscribe
pub struct HistoryHook {
    history: Arc<RwLock<Vec<State>>>,
    status: Arc<RwLock<HistoryStatus>>,
    remote_source: Option<RemoteHistorySource>,
}

impl HistoryHook {
    /// In-memory history with no remote seed
    pub fn new() -> Self {
        Self {
            history: Arc::new(RwLock::new(Vec::new())),
            status: Arc::new(RwLock::new(HistoryStatus::LocalOnly)),
            remote_source: None,
        }
    }

    /// History seeded from a remote source after creation
    pub fn with_remote_source(remote_source: RemoteHistorySource) -> Self {
        Self {
            remote_source: Some(remote_source),
            ..Self::new()
        }
    }
}

impl Default for HistoryHook {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleHook for HistoryHook {
    fn post_create(&self, iotes: &Iotes) {
        let Some(remote_source) = self.remote_source.clone() else {
            return;
        };

        let history = Arc::clone(&self.history);
        let status = Arc::clone(&self.status);
        let iotes = iotes.clone();

        tokio::spawn(async move {
            match remote_source().await {
                Ok(seed) => {
                    debug!("History hook loaded {} remote entries", seed.len());
                    {
                        let mut history = history.write();
                        let local = std::mem::take(&mut *history);
                        *history = seed.into_iter().chain(local).collect();
                    }
                    *status.write() = HistoryStatus::All;

                    let snapshot = history.read().clone();
                    iotes.device_dispatch(create_device_dispatchable(
                        HISTORY_ENTITY,
                        HistoryStatus::All.as_str(),
                        json!({ "history": snapshot }),
                        None,
                        None,
                        None,
                    ));
                }
                Err(error) => {
                    warn!("History hook failed to load remote history: {}", error);
                }
            }
        });
    }

    fn device_hooks(&self) -> StoreHooks {
        let mut hooks = StoreHooks::default();

        // Record each accepted delta exactly once per dispatch; replay
        // dispatches themselves are not recorded
        let history = Arc::clone(&self.history);
        hooks.pre_update.push(Arc::new(move |delta: State| {
            if !delta.contains_key(HISTORY_ENTITY) {
                history.write().push(delta.clone());
            }
            Some(delta)
        }));

        // Push the accumulated history to every new subscriber
        let history = Arc::clone(&self.history);
        let status = Arc::clone(&self.status);
        hooks.post_subscribe.push(Arc::new(move |subscriber: &Subscriber| {
            let snapshot = history.read().clone();
            let status = status.read().as_str();
            let replay = create_device_dispatchable(
                HISTORY_ENTITY,
                status,
                json!({ "history": snapshot }),
                None,
                None,
                None,
            );
            (subscriber.subscription)(replay);
        }));

        hooks
    }
}
