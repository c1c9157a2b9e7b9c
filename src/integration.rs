//! Integration orchestration
//!
//! `create_iotes` builds the two stores, runs lifecycle hooks, connects the
//! caller's strategy against the topology, and returns the public handle.
//! All context is threaded explicitly from here; there is no process-global
//! registry.

use crate::dispatch::{with_app_source, with_direction};
use crate::error::{ErrorDispatchable, ErrorLevel, IotesError};
use crate::hooks::{compose_hooks, LifecycleHook};
use crate::store::{
    create_store, Direction, DispatchFn, Dispatchable, ErrorHandler, Middleware, Selector, State,
    Store, StoreConfig, SubscribeFn, Subscriber,
};
use crate::strategy::{Strategy, StrategyApi};
use crate::topology::TopologyMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shape-preserving transform applied to the handle before it is returned
pub type Plugin = Box<dyn FnOnce(Iotes) -> Iotes + Send>;

/// Arguments to [`create_iotes`]
pub struct IotesConfig {
    /// Hosts and devices to wire up
    pub topology: TopologyMap,
    /// Caller-supplied connection logic
    pub strategy: Arc<dyn Strategy>,
    /// Lifecycle hooks, composed in registration order
    pub lifecycle_hooks: Vec<Arc<dyn LifecycleHook>>,
    /// Optional transform of the finished handle
    pub plugin: Option<Plugin>,
    /// Optional tracing filter directive (e.g. "info", "iotes=debug");
    /// installed best-effort so an embedding application's subscriber wins
    pub log_level: Option<String>,
}

impl IotesConfig {
    pub fn new(topology: TopologyMap, strategy: Arc<dyn Strategy>) -> Self {
        Self {
            topology,
            strategy,
            lifecycle_hooks: Vec::new(),
            plugin: None,
            log_level: None,
        }
    }
}

/// Public handle over the two buses
///
/// Dispatch methods tag application traffic outbound before it reaches the
/// store; subscribe methods register directly against the store.
#[derive(Clone)]
pub struct Iotes {
    host_store: Store,
    device_store: Store,
    host_app_dispatch: DispatchFn,
    device_app_dispatch: DispatchFn,
}

impl std::fmt::Debug for Iotes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Iotes").finish_non_exhaustive()
    }
}

impl Iotes {
    /// Dispatch application traffic on the host bus
    pub fn host_dispatch(&self, dispatchable: impl Into<Dispatchable>) {
        (self.host_app_dispatch)(dispatchable.into());
    }

    /// Dispatch application traffic on the device bus
    pub fn device_dispatch(&self, dispatchable: impl Into<Dispatchable>) {
        (self.device_app_dispatch)(dispatchable.into());
    }

    /// Subscribe to host-bus updates
    pub fn host_subscribe<F>(
        &self,
        subscription: F,
        selector: Option<Selector>,
        middleware: Vec<Middleware>,
    ) -> usize
    where
        F: Fn(State) + Send + Sync + 'static,
    {
        self.host_store.subscribe(subscription, selector, middleware)
    }

    /// Subscribe to device-bus updates
    pub fn device_subscribe<F>(
        &self,
        subscription: F,
        selector: Option<Selector>,
        middleware: Vec<Middleware>,
    ) -> usize
    where
        F: Fn(State) + Send + Sync + 'static,
    {
        self.device_store
            .subscribe(subscription, selector, middleware)
    }

    /// Snapshot of the host bus state
    pub fn host_state(&self) -> State {
        self.host_store.current_state()
    }

    /// Snapshot of the device bus state
    pub fn device_state(&self) -> State {
        self.device_store.current_state()
    }
}

/// Build the two stores, connect the strategy, and return the handle
///
/// Fails with a distinct error for malformed wiring
/// ([`IotesError::InvalidTopology`]) versus a strategy that errored while
/// connecting ([`IotesError::StrategyConstruction`]).
pub async fn create_iotes(config: IotesConfig) -> Result<Iotes, IotesError> {
    let IotesConfig {
        topology,
        strategy,
        lifecycle_hooks,
        plugin,
        log_level,
    } = config;

    if let Some(level) = &log_level {
        init_logging(level);
    }

    topology.validate()?;

    let composed = compose_hooks(&lifecycle_hooks);

    // Creation hooks run before either store exists
    for hook in &composed.creation {
        hook.pre_create();
    }

    let host_store = create_store(StoreConfig {
        channel: "HOST".to_string(),
        hooks: composed.host,
        error_handler: Some(default_error_handler("HOST")),
    });
    let device_store = create_store(StoreConfig {
        channel: "DEVICE".to_string(),
        hooks: composed.device,
        error_handler: Some(default_error_handler("DEVICE")),
    });

    info!("Set up host and device stores");

    let api = StrategyApi {
        host_dispatch: with_direction(Direction::Inbound, store_dispatch(&host_store)),
        device_dispatch: with_direction(Direction::Inbound, store_dispatch(&device_store)),
        host_subscribe: store_subscribe(&host_store),
        device_subscribe: store_subscribe(&device_store),
    };

    for host in &topology.hosts {
        debug!("Connecting host '{}'...", host.name);
        let connector = strategy
            .connect_host(host, &topology.client, api.clone())
            .await
            .map_err(|error| IotesError::StrategyConstruction {
                host: host.name.clone(),
                error,
            })?;

        for device in topology.devices_for_host(&host.name) {
            connector
                .connect_device(device)
                .await
                .map_err(|error| IotesError::StrategyConstruction {
                    host: host.name.clone(),
                    error,
                })?;
        }
        info!("Host '{}' connected", host.name);
    }

    let iotes = Iotes {
        host_app_dispatch: with_app_source("SYSTEM", store_dispatch(&host_store)),
        device_app_dispatch: with_app_source("DEVICE", store_dispatch(&device_store)),
        host_store,
        device_store,
    };

    // Creation hooks see the finished handle; anything async they start is
    // deliberately not awaited
    for hook in &composed.creation {
        hook.post_create(&iotes);
    }

    info!("Integration ready");

    Ok(match plugin {
        Some(plugin) => plugin(iotes),
        None => iotes,
    })
}

fn store_dispatch(store: &Store) -> DispatchFn {
    let store = store.clone();
    Arc::new(move |dispatchable: Dispatchable| store.dispatch(dispatchable))
}

fn store_subscribe(store: &Store) -> SubscribeFn {
    let store = store.clone();
    Arc::new(move |subscription, selector, middleware: Vec<Middleware>| {
        store.subscribe_with(Subscriber {
            subscription,
            selector,
            middleware,
        })
    })
}

/// Logs the error at its carried level and leaves state untouched, guarding
/// the otherwise-undefined no-handler path
fn default_error_handler(channel: &str) -> ErrorHandler {
    let channel = channel.to_string();
    Arc::new(move |dispatched: &ErrorDispatchable, state: &State| {
        match dispatched.level {
            ErrorLevel::Debug => debug!("[{}] {}", channel, dispatched.message),
            ErrorLevel::Info => info!("[{}] {}", channel, dispatched.message),
            ErrorLevel::Warn => warn!("[{}] {}", channel, dispatched.message),
            ErrorLevel::Error => error!("[{}] {}", channel, dispatched.message),
        }
        state.clone()
    })
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::create_device_dispatchable;
    use crate::middleware::direction;
    use crate::strategies::LocalStrategy;
    use crate::strategy::DeviceConnector;
    use crate::topology::{ClientConfig, DeviceConfig, HostConfig};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn make_test_topology() -> TopologyMap {
        TopologyMap {
            client: ClientConfig {
                name: "test".to_string(),
            },
            hosts: vec![HostConfig {
                name: "testapp/0".to_string(),
                host: "localhost".to_string(),
                port: "8888".to_string(),
                strategy_config: None,
            }],
            devices: vec![
                DeviceConfig {
                    device_type: "RFID_READER".to_string(),
                    name: "READER/1".to_string(),
                    channel: Some(1),
                    host_name: "testapp/0".to_string(),
                },
                DeviceConfig {
                    device_type: "ROTARY_ENCODER".to_string(),
                    name: "ENCODER/1".to_string(),
                    channel: Some(2),
                    host_name: "testapp/0".to_string(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_create_iotes_with_local_strategy() {
        let iotes = create_iotes(IotesConfig::new(
            make_test_topology(),
            Arc::new(LocalStrategy::new()),
        ))
        .await
        .unwrap();

        // The local strategy announced the host and both devices
        assert_eq!(iotes.host_state()["testapp/0"]["type"], json!("CONNECT"));
        let devices = iotes.device_state();
        assert!(devices.contains_key("READER/1"));
        assert!(devices.contains_key("ENCODER/1"));
        assert_eq!(
            devices["READER/1"][crate::store::fields::DIRECTION],
            json!("I")
        );
    }

    #[tokio::test]
    async fn test_app_dispatch_is_tagged_outbound() {
        let iotes = create_iotes(IotesConfig::new(
            make_test_topology(),
            Arc::new(LocalStrategy::new()),
        ))
        .await
        .unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        iotes.device_subscribe(
            move |state| sink.lock().push(state),
            Some(vec!["PANEL/1".to_string()]),
            vec![direction(Direction::Outbound)],
        );

        iotes.device_dispatch(create_device_dispatchable(
            "PANEL/1",
            "UPDATE",
            json!({ "level": 3 }),
            None,
            None,
            None,
        ));

        let received = received.lock();
        assert_eq!(received.len(), 1);
        let record = received[0]["PANEL/1"].as_object().unwrap();
        assert_eq!(record[crate::store::fields::DIRECTION], json!("O"));
        assert_eq!(record[crate::store::fields::SOURCE], json!("APP"));
        assert_eq!(record[crate::store::fields::BUS], json!("DEVICE"));
    }

    #[tokio::test]
    async fn test_direction_filter_across_interleaved_dispatches() {
        let iotes = create_iotes(IotesConfig::new(
            make_test_topology(),
            Arc::new(LocalStrategy::new()),
        ))
        .await
        .unwrap();

        let inbound = Arc::new(AtomicUsize::new(0));
        let outbound = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&inbound);
        iotes.device_subscribe(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            None,
            vec![direction(Direction::Inbound)],
        );
        let counter = Arc::clone(&outbound);
        iotes.device_subscribe(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            None,
            vec![direction(Direction::Outbound)],
        );

        // Each outbound dispatch is echoed back inbound by the local
        // strategy on the same stack: 5 dispatches, 10 interleaved updates
        for i in 0..5 {
            iotes.device_dispatch(create_device_dispatchable(
                "PANEL/1",
                "UPDATE",
                json!({ "i": i }),
                None,
                None,
                None,
            ));
        }

        assert_eq!(outbound.load(Ordering::SeqCst), 5);
        assert_eq!(inbound.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_invalid_topology_is_rejected() {
        let mut topology = make_test_topology();
        topology.devices[0].host_name = "nowhere/0".to_string();

        let error = create_iotes(IotesConfig::new(topology, Arc::new(LocalStrategy::new())))
            .await
            .unwrap_err();

        assert!(matches!(error, IotesError::InvalidTopology { .. }));
    }

    struct FailingStrategy;

    #[async_trait]
    impl Strategy for FailingStrategy {
        async fn connect_host(
            &self,
            _host: &HostConfig,
            _client: &ClientConfig,
            _api: StrategyApi,
        ) -> anyhow::Result<Box<dyn DeviceConnector>> {
            Err(anyhow!("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_strategy_failure_names_the_host() {
        let error = create_iotes(IotesConfig::new(
            make_test_topology(),
            Arc::new(FailingStrategy),
        ))
        .await
        .unwrap_err();

        match error {
            IotesError::StrategyConstruction { host, error } => {
                assert_eq!(host, "testapp/0");
                assert!(error.to_string().contains("connection refused"));
            }
            other => panic!("expected StrategyConstruction, got {}", other),
        }
    }

    struct OrderedHook {
        pre_ran: Arc<AtomicBool>,
        post_ran: Arc<AtomicBool>,
    }

    impl LifecycleHook for OrderedHook {
        fn pre_create(&self) {
            self.pre_ran.store(true, Ordering::SeqCst);
        }

        fn post_create(&self, iotes: &Iotes) {
            // Stores exist by now: the local strategy already connected
            assert!(iotes.host_state().contains_key("testapp/0"));
            self.post_ran.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_lifecycle_hooks_run_around_creation() {
        let pre_ran = Arc::new(AtomicBool::new(false));
        let post_ran = Arc::new(AtomicBool::new(false));

        let mut config = IotesConfig::new(make_test_topology(), Arc::new(LocalStrategy::new()));
        config.lifecycle_hooks.push(Arc::new(OrderedHook {
            pre_ran: Arc::clone(&pre_ran),
            post_ran: Arc::clone(&post_ran),
        }));

        create_iotes(config).await.unwrap();

        assert!(pre_ran.load(Ordering::SeqCst));
        assert!(post_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_plugin_transforms_the_handle() {
        let applied = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&applied);

        let mut config = IotesConfig::new(make_test_topology(), Arc::new(LocalStrategy::new()));
        config.plugin = Some(Box::new(move |iotes| {
            flag.store(true, Ordering::SeqCst);
            iotes
        }));

        create_iotes(config).await.unwrap();
        assert!(applied.load(Ordering::SeqCst));
    }
}
