//! De-duplicating, rate-limited work queue.
//!
//! Bursts of change notifications for the same key collapse into one pending
//! entry, a key is never handed to two workers at once, and keys that keep
//! failing are re-added with growing delays.

mod rate_limiter;
mod work_queue;

pub use rate_limiter::*;
pub use work_queue::*;
