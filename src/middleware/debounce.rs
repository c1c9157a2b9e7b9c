//! Debounce middleware
//!
//! Rate-limits deliveries through a single shared latch. The latch-open
//! call passes its delta through untouched; everything arriving while the
//! latch is closed is suppressed.

use crate::store::{Middleware, State};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Suppress deliveries for `interval` after each one that passes
///
/// The first delta while the latch is open is delivered and closes the
/// latch; all deltas while it is closed return `None`. The latch reopens on
/// a detached timer, independent of further calls, so the next delivery
/// carries whatever arrives first after the interval elapses.
pub fn debounce(interval: Duration) -> Middleware {
    let closed = Arc::new(AtomicBool::new(false));

    Arc::new(move |state: State| {
        if closed.swap(true, Ordering::SeqCst) {
            return None;
        }

        let closed = Arc::clone(&closed);
        thread::spawn(move || {
            thread::sleep(interval);
            closed.store(false, Ordering::SeqCst);
        });

        Some(state)
    })
}
