//! Local order id generation.
//!
//! Ids are wall-clock milliseconds, bumped to stay strictly increasing
//! within the process so that two creates in the same millisecond never
//! collide.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_ORDER_ID: AtomicI64 = AtomicI64::new(0);

/// Next local order id: `max(now_ms, last + 1)`.
pub fn next_order_id() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_ORDER_ID.load(Ordering::SeqCst);
    loop {
        let next = now.max(last + 1);
        match LAST_ORDER_ID.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}
