//! Metadata stamping for accepted dispatches
//!
//! Every entity surviving the loopback guard is stamped with provenance
//! fields before it is merged: a store-local timestamp, the owning store's
//! id, the channel the store serves, and one dispatch id shared by all
//! entities accepted in the same dispatch.

use super::types::{fields, State};
use serde_json::{Map, Value};

/// Generate a globally-unique store id
pub fn create_store_id() -> String {
    format!("iotes_{}", short_uid())
}

fn short_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Stamps provenance metadata onto every entity of an accepted delta
pub struct MetadataStamper {
    store_id: String,
    channel: String,
}

impl MetadataStamper {
    pub fn new(store_id: String, channel: String) -> Self {
        Self { store_id, channel }
    }

    /// Stamp all entities of a validated delta
    ///
    /// One fresh dispatch id is minted per call; the owning store's id is
    /// merged into each entity's existing store-id set rather than
    /// replacing it, so provenance from other stores survives forwarding.
    pub fn stamp(&self, delta: State) -> State {
        let dispatchable_id = format!("iotes_dId_{}", short_uid());
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();

        delta
            .into_iter()
            .map(|(name, entity)| {
                // Entities were validated as objects upstream
                let mut record = match entity {
                    Value::Object(record) => record,
                    _ => Map::new(),
                };

                let mut store_ids = match record.get(fields::STORE_ID) {
                    Some(Value::Object(ids)) => ids.clone(),
                    _ => Map::new(),
                };
                store_ids.insert(self.store_id.clone(), Value::Bool(true));

                record.insert(
                    fields::DISPATCHABLE_ID.to_string(),
                    Value::String(dispatchable_id.clone()),
                );
                record.insert(
                    fields::TIMESTAMP.to_string(),
                    Value::String(timestamp.clone()),
                );
                record.insert(
                    fields::CHANNEL.to_string(),
                    Value::String(self.channel.clone()),
                );
                record.insert(fields::STORE_ID.to_string(), Value::Object(store_ids));

                (name, Value::Object(record))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stamper() -> MetadataStamper {
        MetadataStamper::new("iotes_test0001".to_string(), "TEST".to_string())
    }

    fn delta(value: Value) -> State {
        match value {
            Value::Object(map) => map,
            _ => panic!("test delta must be an object"),
        }
    }

    #[test]
    fn test_stamps_all_metadata_fields() {
        let stamped = stamper().stamp(delta(json!({
            "reader/1": { "type": "RFID_READER", "payload": {} }
        })));

        let record = stamped["reader/1"].as_object().unwrap();
        assert_eq!(record[fields::CHANNEL], json!("TEST"));
        assert_eq!(record[fields::STORE_ID], json!({ "iotes_test0001": true }));
        assert!(record[fields::TIMESTAMP].is_string());
        let id = record[fields::DISPATCHABLE_ID].as_str().unwrap();
        assert!(id.starts_with("iotes_dId_"));
        // Caller fields survive
        assert_eq!(record["type"], json!("RFID_READER"));
    }

    #[test]
    fn test_one_dispatch_id_per_dispatch() {
        let stamped = stamper().stamp(delta(json!({
            "a": { "payload": 1 },
            "b": { "payload": 2 }
        })));

        let id_a = &stamped["a"][fields::DISPATCHABLE_ID];
        let id_b = &stamped["b"][fields::DISPATCHABLE_ID];
        assert_eq!(id_a, id_b);

        let again = stamper().stamp(delta(json!({ "a": { "payload": 1 } })));
        assert_ne!(id_a, &again["a"][fields::DISPATCHABLE_ID]);
    }

    #[test]
    fn test_merges_store_id_set() {
        let stamped = stamper().stamp(delta(json!({
            "reader/1": {
                "payload": {},
                "@@iotes_storeId": { "iotes_other": true }
            }
        })));

        assert_eq!(
            stamped["reader/1"][fields::STORE_ID],
            json!({ "iotes_other": true, "iotes_test0001": true })
        );
    }

    #[test]
    fn test_store_ids_are_unique() {
        let a = create_store_id();
        let b = create_store_id();
        assert!(a.starts_with("iotes_"));
        assert_ne!(a, b);
    }
}
