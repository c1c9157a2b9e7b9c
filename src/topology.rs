//! Topology configuration
//!
//! Describes the client application, the hosts to connect, and the devices
//! attached to each host. Topologies are plain data handed to the strategy;
//! they can be built in code or loaded from YAML, and are validated before
//! the strategy runs.

use crate::error::IotesError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

/// Client application identity
///
/// The name scopes dispatch provenance; it must be stable for the process
/// lifetime.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub name: String,
}

/// One host to connect
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// Host name, unique within the topology
    pub name: String,
    /// Host address, e.g. "127.0.0.1"
    pub host: String,
    /// Port, e.g. "8000"
    pub port: String,
    /// Opaque configuration forwarded to the strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_config: Option<Value>,
}

/// One device attached to a host
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Device type, from the set the strategy in use understands
    #[serde(rename = "type")]
    pub device_type: String,
    /// Device name, unique within the topology
    pub name: String,
    /// Optional channel for tighter definition of the connection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u16>,
    /// Name of the host this device connects through
    pub host_name: String,
}

/// Root topology: client + hosts + devices
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopologyMap {
    pub client: ClientConfig,
    pub hosts: Vec<HostConfig>,
    pub devices: Vec<DeviceConfig>,
}

impl TopologyMap {
    /// Load a topology from a YAML file
    pub async fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).await.with_context(|| {
            format!(
                "Failed to read topology file: {}",
                path.as_ref().display()
            )
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse a topology from YAML text
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("Failed to parse topology YAML")
    }

    /// Structural validation: unique names, every device wired to a known
    /// host
    pub fn validate(&self) -> Result<(), IotesError> {
        let mut host_names = HashSet::new();
        for host in &self.hosts {
            if !host_names.insert(host.name.as_str()) {
                return Err(IotesError::InvalidTopology {
                    reason: format!("duplicate host name '{}'", host.name),
                });
            }
        }

        let mut device_names = HashSet::new();
        for device in &self.devices {
            if !device_names.insert(device.name.as_str()) {
                return Err(IotesError::InvalidTopology {
                    reason: format!("duplicate device name '{}'", device.name),
                });
            }
            if !host_names.contains(device.host_name.as_str()) {
                return Err(IotesError::InvalidTopology {
                    reason: format!(
                        "device '{}' references unknown host '{}'",
                        device.name, device.host_name
                    ),
                });
            }
        }

        Ok(())
    }

    /// Devices wired to the named host
    pub fn devices_for_host(&self, host_name: &str) -> Vec<&DeviceConfig> {
        self.devices
            .iter()
            .filter(|device| device.host_name == host_name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TOPOLOGY_YAML: &str = r#"
client:
  name: test
hosts:
  - name: testapp/0
    host: localhost
    port: "8888"
devices:
  - hostName: testapp/0
    type: RFID_READER
    name: READER/1
    channel: 1
  - hostName: testapp/0
    type: ROTARY_ENCODER
    name: ENCODER/1
    channel: 2
"#;

    #[test]
    fn test_parse_topology_yaml() {
        let topology = TopologyMap::from_yaml(TOPOLOGY_YAML).unwrap();
        assert_eq!(topology.client.name, "test");
        assert_eq!(topology.hosts.len(), 1);
        assert_eq!(topology.devices.len(), 2);
        assert_eq!(topology.devices[0].device_type, "RFID_READER");
        assert_eq!(topology.devices[0].host_name, "testapp/0");
        assert_eq!(topology.devices[1].channel, Some(2));
    }

    #[tokio::test]
    async fn test_load_topology_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TOPOLOGY_YAML.as_bytes()).unwrap();

        let topology = TopologyMap::from_yaml_file(file.path()).await.unwrap();
        assert_eq!(topology.client.name, "test");
        assert!(topology.validate().is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_gives_context() {
        let error = TopologyMap::from_yaml_file("does/not/exist.yaml")
            .await
            .unwrap_err();
        assert!(error.to_string().contains("does/not/exist.yaml"));
    }

    #[test]
    fn test_validate_rejects_unknown_host_reference() {
        let mut topology = TopologyMap::from_yaml(TOPOLOGY_YAML).unwrap();
        topology.devices[0].host_name = "nowhere/0".to_string();

        let error = topology.validate().unwrap_err();
        assert!(matches!(error, IotesError::InvalidTopology { .. }));
        assert!(error.to_string().contains("unknown host"));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut topology = TopologyMap::from_yaml(TOPOLOGY_YAML).unwrap();
        topology.devices[1].name = topology.devices[0].name.clone();

        let error = topology.validate().unwrap_err();
        assert!(error.to_string().contains("duplicate device name"));
    }

    #[test]
    fn test_devices_for_host() {
        let topology = TopologyMap::from_yaml(TOPOLOGY_YAML).unwrap();
        assert_eq!(topology.devices_for_host("testapp/0").len(), 2);
        assert!(topology.devices_for_host("other/0").is_empty());
    }
}
