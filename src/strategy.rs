//! Strategy boundary
//!
//! A strategy supplies the external connection logic binding physical hosts
//! and devices to the two buses. The orchestrator hands it inbound-tagged
//! dispatch handles plus raw subscribe handles, then walks the topology:
//! one `connect_host` per configured host, one `connect_device` per device
//! wired to that host.
//!
//! All methods take `&self`; strategies needing mutable state use interior
//! mutability so they can be shared behind `Arc<dyn Strategy>`.

use crate::store::{DispatchFn, SubscribeFn};
use crate::topology::{ClientConfig, DeviceConfig, HostConfig};
use anyhow::Result;
use async_trait::async_trait;

/// Bus access handed to strategies
///
/// Dispatch handles tag every entity inbound before it reaches the store;
/// subscribe handles are the stores' own.
#[derive(Clone)]
pub struct StrategyApi {
    pub host_dispatch: DispatchFn,
    pub device_dispatch: DispatchFn,
    pub host_subscribe: SubscribeFn,
    pub device_subscribe: SubscribeFn,
}

/// Connects configured hosts to the buses
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Connect one host; returns the connector used to attach its devices
    ///
    /// Errors abort integration construction and surface as
    /// [`IotesError::StrategyConstruction`](crate::error::IotesError).
    async fn connect_host(
        &self,
        host: &HostConfig,
        client: &ClientConfig,
        api: StrategyApi,
    ) -> Result<Box<dyn DeviceConnector>>;
}

/// Attaches one host's devices
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect_device(&self, device: &DeviceConfig) -> Result<()>;
}
