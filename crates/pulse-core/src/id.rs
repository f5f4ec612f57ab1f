//! Monotonic ping-id generation.
//!
//! Ping ids double as the natural sort key for "latest ping per user"
//! queries, so they must be strictly increasing for the lifetime of the
//! process and keep increasing across restarts. The id packs the current
//! Unix milliseconds into the high bits and leaves 20 low bits of slack;
//! when two ids are requested within the same millisecond the CAS loop
//! bumps the previous value instead of reusing it.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Return the next ping id. Strictly increasing across all threads.
pub fn next_ping_id() -> i64 {
    let candidate = Utc::now().timestamp_millis() << 20;
    let mut current = LAST_ID.load(Ordering::Relaxed);
    loop {
        let next = if candidate > current {
            candidate
        } else {
            current + 1
        };
        match LAST_ID.compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => current = observed,
        }
    }
}
