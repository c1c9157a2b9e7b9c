//! Fragment well-formedness validation
//!
//! A candidate fragment is either a usable state delta or invalid with a
//! reason, checked explicitly before merge. Invalid fragments never cause a
//! partial merge.

use super::types::State;

/// Outcome of validating a candidate state fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Validated {
    Valid(State),
    Invalid(InvalidReason),
}

/// Why a candidate fragment was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// Top-level value is not a JSON object
    NotAnObject,
    /// Fragment has no entities (possibly after loopback stripping)
    Empty,
    /// The named entity is not itself a JSON object
    NonObjectEntity(String),
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::NotAnObject => write!(f, "fragment is not an object"),
            InvalidReason::Empty => write!(f, "fragment has no entities"),
            InvalidReason::NonObjectEntity(name) => {
                write!(f, "entity '{}' is not an object", name)
            }
        }
    }
}

/// Validate a stripped fragment: at least one entity, every entity a JSON
/// object
pub fn validate_fragment(fragment: State) -> Validated {
    if fragment.is_empty() {
        return Validated::Invalid(InvalidReason::Empty);
    }

    for (name, entity) in &fragment {
        if !entity.is_object() {
            return Validated::Invalid(InvalidReason::NonObjectEntity(name.clone()));
        }
    }

    Validated::Valid(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fragment(value: serde_json::Value) -> State {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("test fragment must be an object"),
        }
    }

    #[test]
    fn test_accepts_well_formed_fragment() {
        let result = validate_fragment(fragment(json!({
            "reader/1": { "type": "RFID_READER", "payload": { "sample": "test" } }
        })));
        assert!(matches!(result, Validated::Valid(_)));
    }

    #[test]
    fn test_rejects_empty_fragment() {
        let result = validate_fragment(State::new());
        assert_eq!(result, Validated::Invalid(InvalidReason::Empty));
    }

    #[test]
    fn test_rejects_non_object_entity() {
        let result = validate_fragment(fragment(json!({ "payload": "test" })));
        assert_eq!(
            result,
            Validated::Invalid(InvalidReason::NonObjectEntity("payload".to_string()))
        );
    }

    #[test]
    fn test_rejects_null_entity() {
        let result = validate_fragment(fragment(json!({ "reader/1": null })));
        assert_eq!(
            result,
            Validated::Invalid(InvalidReason::NonObjectEntity("reader/1".to_string()))
        );
    }

    #[test]
    fn test_rejects_array_entity_among_valid_ones() {
        let result = validate_fragment(fragment(json!({
            "reader/1": { "payload": 1 },
            "reader/2": ["a", "b"]
        })));
        assert_eq!(
            result,
            Validated::Invalid(InvalidReason::NonObjectEntity("reader/2".to_string()))
        );
    }

    #[test]
    fn test_empty_entity_object_is_valid() {
        let result = validate_fragment(fragment(json!({ "reader/1": {} })));
        assert!(matches!(result, Validated::Valid(_)));
    }
}
