//! Directional dispatch wrapping and dispatchable builders
//!
//! Every dispatchable entering a store is tagged per entity with the
//! direction it travels: inbound from a strategy, or outbound from the
//! application. Builders produce the canonical single-entity fragments
//! exchanged on both buses.

use crate::error::ErrorDispatchable;
use crate::store::{fields, Direction, Dispatchable, DispatchFn, State};
use serde_json::{Map, Value};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Host connection lifecycle signal carried by host dispatchables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostConnectionType {
    Connect,
    Disconnect,
    Reconnecting,
    DeviceConnect,
    DeviceDisconnect,
}

impl HostConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostConnectionType::Connect => "CONNECT",
            HostConnectionType::Disconnect => "DISCONNECT",
            HostConnectionType::Reconnecting => "RECONNECTING",
            HostConnectionType::DeviceConnect => "DEVICE_CONNECT",
            HostConnectionType::DeviceDisconnect => "DEVICE_DISCONNECT",
        }
    }
}

impl std::fmt::Display for HostConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tag every entity of a state fragment, overwriting existing tags
///
/// Error dispatchables and malformed entities pass through untouched; the
/// validator deals with the latter downstream.
fn tag_entities(dispatchable: Dispatchable, tags: &[(&str, Value)]) -> Dispatchable {
    match dispatchable {
        Dispatchable::State(Value::Object(fragment)) => {
            let tagged: State = fragment
                .into_iter()
                .map(|(name, entity)| {
                    let entity = match entity {
                        Value::Object(mut record) => {
                            for (key, value) in tags {
                                record.insert((*key).to_string(), value.clone());
                            }
                            Value::Object(record)
                        }
                        other => other,
                    };
                    (name, entity)
                })
                .collect();
            Dispatchable::State(Value::Object(tagged))
        }
        other => other,
    }
}

/// Tag every entity of a dispatchable with a travel direction
pub fn tag_direction(dispatchable: Dispatchable, direction: Direction) -> Dispatchable {
    tag_entities(
        dispatchable,
        &[(
            fields::DIRECTION,
            Value::String(direction.as_str().to_string()),
        )],
    )
}

/// Wrap a dispatch handle so every forwarded entity carries `direction`
///
/// Pure and stateless beyond the forwarded call.
pub fn with_direction(direction: Direction, dispatch: DispatchFn) -> DispatchFn {
    Arc::new(move |dispatchable| dispatch(tag_direction(dispatchable, direction)))
}

/// Wrap a dispatch handle for application-originated traffic
///
/// Entities are tagged outbound and stamped with the application source and
/// the bus label they were submitted on.
pub fn with_app_source(bus: impl Into<String>, dispatch: DispatchFn) -> DispatchFn {
    let bus: String = bus.into();
    Arc::new(move |dispatchable| {
        let tags = [
            (
                fields::DIRECTION,
                Value::String(Direction::Outbound.as_str().to_string()),
            ),
            (fields::SOURCE, Value::String("APP".to_string())),
            (fields::BUS, Value::String(bus.clone())),
        ];
        dispatch(tag_entities(dispatchable, &tags))
    })
}

fn build_dispatchable(
    name: &str,
    kind: &str,
    payload: Value,
    meta: Option<Value>,
    source: Option<&str>,
    error: Option<ErrorDispatchable>,
) -> State {
    let mut record = Map::new();
    record.insert("type".to_string(), Value::String(kind.to_string()));
    record.insert("name".to_string(), Value::String(name.to_string()));
    record.insert("payload".to_string(), payload);
    record.insert(
        "meta".to_string(),
        meta.unwrap_or_else(|| Value::Object(Map::new())),
    );
    record.insert(
        "source".to_string(),
        source
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
    );
    record.insert(
        "error".to_string(),
        error
            .and_then(|e| serde_json::to_value(e).ok())
            .unwrap_or(Value::Null),
    );

    let mut fragment = State::new();
    fragment.insert(name.to_string(), Value::Object(record));
    fragment
}

/// Build a single-entity device fragment `{name: {type, name, payload, ...}}`
pub fn create_device_dispatchable(
    name: &str,
    kind: &str,
    payload: Value,
    meta: Option<Value>,
    source: Option<&str>,
    error: Option<ErrorDispatchable>,
) -> State {
    build_dispatchable(name, kind, payload, meta, source, error)
}

/// Build a single-entity host fragment carrying a connection signal
pub fn create_host_dispatchable(
    name: &str,
    connection: HostConnectionType,
    payload: Value,
    meta: Option<Value>,
    source: Option<&str>,
    error: Option<ErrorDispatchable>,
) -> State {
    build_dispatchable(name, connection.as_str(), payload, meta, source, error)
}
