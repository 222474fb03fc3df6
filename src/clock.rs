//! Source of `lastModified` stamps.

use std::sync::atomic::{AtomicI64, Ordering};

/// Wall-clock milliseconds, forced to be strictly increasing within a process
/// so two writes never share a stamp.
#[derive(Debug, Default)]
pub struct ModificationClock {
    last: AtomicI64,
}

impl ModificationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock whose first stamp is at least `floor + 1`.
    pub fn starting_after(floor: i64) -> Self {
        Self {
            last: AtomicI64::new(floor),
        }
    }

    pub fn now_millis(&self) -> i64 {
        let wall = chrono::Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(wall.max(last + 1))
            })
            .unwrap_or(wall);
        wall.max(previous + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_are_strictly_increasing() {
        let clock = ModificationClock::new();
        let mut previous = clock.now_millis();
        for _ in 0..1000 {
            let next = clock.now_millis();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn starting_after_is_respected() {
        let far_future = chrono::Utc::now().timestamp_millis() + 1_000_000;
        let clock = ModificationClock::starting_after(far_future);
        assert_eq!(clock.now_millis(), far_future + 1);
        assert_eq!(clock.now_millis(), far_future + 2);
    }
}
