//! Process-wide monotonic unique-id source for durable DLS consumer names.
//!
//! Concurrent `fetch_by_filter` invocations are independent because each one
//! allocates its durable consumer name from here before touching the engine;
//! collisions within a process are impossible (monotonic counter) and across
//! processes are vanishingly unlikely (nanoid suffix).

use std::sync::atomic::{AtomicU64, Ordering};

pub struct NuidGenerator {
    counter: AtomicU64,
}

impl Default for NuidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl NuidGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// A fresh, process-unique durable consumer name for a DLS fetch-by-filter
    /// call, e.g. `dls-fetch-7-xK3pQdR1`.
    pub fn next_consumer_name(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{n}-{}", nanoid::nanoid!(8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_monotonic() {
        let gen = NuidGenerator::new();
        let a = gen.next_consumer_name("dls-fetch");
        let b = gen.next_consumer_name("dls-fetch");
        assert_ne!(a, b);
        assert!(a.starts_with("dls-fetch-0-"));
        assert!(b.starts_with("dls-fetch-1-"));
    }
}
