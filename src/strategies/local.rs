//! Local strategy - in-process loopback for tests and development
//!
//! Simulates a connected fleet without hardware. Host and device
//! connections emit CONNECT dispatchables inbound, and application
//! (outbound-tagged) device traffic is echoed straight back as fresh
//! inbound dispatchables, the way a real device acknowledges a command.

use crate::dispatch::{create_device_dispatchable, create_host_dispatchable, HostConnectionType};
use crate::middleware::direction;
use crate::store::{Direction, State, Subscription};
use crate::strategy::{DeviceConnector, Strategy, StrategyApi};
use crate::topology::{ClientConfig, DeviceConfig, HostConfig};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Strategy that loops application traffic back inbound
pub struct LocalStrategy;

impl LocalStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Strategy for LocalStrategy {
    async fn connect_host(
        &self,
        host: &HostConfig,
        client: &ClientConfig,
        api: StrategyApi,
    ) -> Result<Box<dyn DeviceConnector>> {
        info!(
            "Local strategy connecting host '{}' for client '{}'",
            host.name, client.name
        );

        (api.host_dispatch)(
            create_host_dispatchable(
                &host.name,
                HostConnectionType::Connect,
                json!({}),
                None,
                Some("local"),
                None,
            )
            .into(),
        );

        // Echo application traffic back inbound, as a device would respond.
        // Only outbound-tagged entities are echoed; the store's loopback
        // guard plus the direction filter keep this from oscillating.
        let device_dispatch = api.device_dispatch.clone();
        let echo: Subscription = Arc::new(move |state: State| {
            for (name, entity) in state {
                let Some(record) = entity.as_object() else {
                    continue;
                };
                if record
                    .get(crate::store::fields::DIRECTION)
                    .and_then(Value::as_str)
                    != Some(Direction::Outbound.as_str())
                {
                    continue;
                }

                let kind = record
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("UPDATE")
                    .to_string();
                let payload = record.get("payload").cloned().unwrap_or(Value::Null);
                debug!("Local strategy echoing '{}' back inbound", name);
                device_dispatch(
                    create_device_dispatchable(&name, &kind, payload, None, Some("local"), None)
                        .into(),
                );
            }
        });
        (api.device_subscribe)(echo, None, vec![direction(Direction::Outbound)]);

        Ok(Box::new(LocalDeviceConnector { api }))
    }
}

struct LocalDeviceConnector {
    api: StrategyApi,
}

#[async_trait]
impl DeviceConnector for LocalDeviceConnector {
    async fn connect_device(&self, device: &DeviceConfig) -> Result<()> {
        info!(
            "Local strategy connecting device '{}' ({})",
            device.name, device.device_type
        );

        (self.api.device_dispatch)(
            create_device_dispatchable(
                &device.name,
                &device.device_type,
                json!({ "status": "connected", "channel": device.channel }),
                None,
                Some("local"),
                None,
            )
            .into(),
        );

        Ok(())
    }
}
