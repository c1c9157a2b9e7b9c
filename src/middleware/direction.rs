//! Direction filter middleware
//!
//! Restricts a subscriber to traffic flowing one way over the bus:
//! inbound from the strategy, or outbound from the application.

use crate::store::{fields, Direction, Middleware, State};
use std::sync::Arc;

/// Keep only entities whose direction tag matches `d`
///
/// `Direction::Both` passes the delta through unchanged. This is a
/// same-shape filter, not a short-circuit: mismatched entities are dropped
/// individually, and an all-mismatch delta yields an empty map (which the
/// store then suppresses).
pub fn direction(d: Direction) -> Middleware {
    Arc::new(move |state: State| {
        if d == Direction::Both {
            return Some(state);
        }

        let filtered: State = state
            .into_iter()
            .filter(|(_, entity)| {
                entity
                    .get(fields::DIRECTION)
                    .and_then(|tag| tag.as_str())
                    .and_then(Direction::from_str)
                    == Some(d)
            })
            .collect();

        Some(filtered)
    })
}
