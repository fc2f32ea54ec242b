// Conflict backoff shared by every read-modify-write loop over the store

use rand::Rng;
use std::time::Duration;

/// Sleep before the next attempt after a version conflict: `base_ms` per
/// attempt so far, plus up to `jitter_ms` of random spread so racing writers
/// stop colliding in lockstep
pub(crate) fn backoff(attempt: u32, base_ms: u64, jitter_ms: u64) {
    let delay = backoff_delay(attempt, base_ms, jitter_ms);
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

fn backoff_delay(attempt: u32, base_ms: u64, jitter_ms: u64) -> Duration {
    let base = base_ms.saturating_mul(u64::from(attempt));
    let jitter = if jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=jitter_ms)
    } else {
        0
    };
    Duration::from_millis(base.saturating_add(jitter))
}
