//! Middleware chain primitives
//!
//! A middleware receives the current delta and returns the transformed
//! delta, or `None` to veto delivery. Hook and middleware stages compose
//! left-to-right in registration order; a `None` inside a stage
//! short-circuits the remainder of that stage to an empty map, which still
//! feeds the next stage.

mod debounce;
mod direction;

pub use debounce::debounce;
pub use direction::direction;

use crate::store::{Middleware, State};
use std::sync::Arc;

/// Identity middleware, the implicit chain for plain subscribers
pub fn identity() -> Middleware {
    Arc::new(|state: State| Some(state))
}

/// Run one pipeline stage over a delta
pub fn apply_stage(stage: &[Middleware], input: State) -> State {
    let mut current = input;
    for middleware in stage {
        match middleware(current) {
            Some(next) => current = next,
            None => return State::new(),
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delta(value: serde_json::Value) -> State {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("test delta must be an object"),
        }
    }

    #[test]
    fn test_empty_stage_is_identity() {
        let input = delta(json!({ "a": { "payload": 1 } }));
        assert_eq!(apply_stage(&[], input.clone()), input);
    }

    #[test]
    fn test_stage_composes_left_to_right() {
        let first: Middleware = Arc::new(|mut state: State| {
            state.insert("first".to_string(), json!({ "order": 1 }));
            Some(state)
        });
        let second: Middleware = Arc::new(|mut state: State| {
            // Sees the first transform's output
            assert!(state.contains_key("first"));
            state.insert("second".to_string(), json!({ "order": 2 }));
            Some(state)
        });

        let result = apply_stage(&[first, second], State::new());
        assert!(result.contains_key("first"));
        assert!(result.contains_key("second"));
    }

    #[test]
    fn test_none_short_circuits_stage_to_empty() {
        let veto: Middleware = Arc::new(|_| None);
        let unreachable: Middleware = Arc::new(|_| panic!("stage must short-circuit"));

        let result = apply_stage(
            &[veto, unreachable],
            delta(json!({ "a": { "payload": 1 } })),
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_identity_passes_through() {
        let input = delta(json!({ "a": { "payload": 1 } }));
        assert_eq!(apply_stage(&[identity()], input.clone()), input);
    }
}
