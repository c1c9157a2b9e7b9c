//! # iotes - pub/sub state bridge for IoT integrations
//!
//! An in-process publish/subscribe state-propagation core bridging two
//! message buses - a "host" bus and a "device" bus - inside an IoT
//! integration layer. External connection logic is supplied by the caller
//! as a [`Strategy`]; the crate wires two independent [`Store`] instances
//! into one coherent fabric.
//!
//! ## Core Concepts
//!
//! - **Store**: a deduplicating, hook-extensible, selector-filtered,
//!   middleware-chained state-merge engine
//! - **Dispatchable**: a state-fragment message submitted to a store
//! - **Loopback guard**: keeps a store from re-accepting its own previously
//!   emitted data when producers forward it back
//! - **Direction**: every entity is tagged inbound (strategy to bus) or
//!   outbound (application to bus), so subscribers can filter one way
//! - **Lifecycle hooks**: ordered, composable stages around creation,
//!   subscription, and state updates
//!
//! ## Usage
//!
//! ```rust,ignore
//! use iotes::{create_iotes, IotesConfig, LocalStrategy, TopologyMap};
//! use std::sync::Arc;
//!
//! let topology = TopologyMap::from_yaml_file("topology.yaml").await?;
//! let iotes = create_iotes(IotesConfig::new(topology, Arc::new(LocalStrategy::new()))).await?;
//!
//! iotes.device_subscribe(|state| println!("{:?}", state), None, vec![]);
//! ```

pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod integration;
pub mod middleware;
pub mod store;
pub mod strategies;
pub mod strategy;
pub mod topology;

// Re-export the primary surface at the crate root
pub use dispatch::{
    create_device_dispatchable, create_host_dispatchable, tag_direction, with_app_source,
    with_direction, HostConnectionType,
};
pub use error::{ErrorDispatchable, ErrorLevel, IotesError};
pub use hooks::{
    compose_hooks, ComposedHooks, HistoryHook, LifecycleHook, PostSubscribeHook, PreSubscribeHook,
    RemoteHistorySource, StoreHooks,
};
pub use integration::{create_iotes, Iotes, IotesConfig, Plugin};
pub use middleware::{apply_stage, debounce, direction, identity};
pub use store::{
    create_store, fields, Direction, DispatchFn, Dispatchable, ErrorHandler, InvalidReason,
    Middleware, Selector, State, Store, StoreConfig, SubscribeFn, Subscriber, Subscription,
    Validated,
};
pub use strategies::LocalStrategy;
pub use strategy::{DeviceConnector, Strategy, StrategyApi};
pub use topology::{ClientConfig, DeviceConfig, HostConfig, TopologyMap};
