//! Bundled strategies
//!
//! Real integrations supply their own [`Strategy`](crate::Strategy)
//! implementations; the local strategy here exists for tests and
//! development without hardware.

pub mod local;

pub use local::LocalStrategy;
