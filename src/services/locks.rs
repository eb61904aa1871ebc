use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per barber timeline. Everything that reads a barber's
/// schedule and then writes to it (booking, cancel + reassignment, the
/// no-show sweep) holds the barber's guard for the whole sequence.
///
/// Entries only live while someone holds or waits for them, so the map stays
/// bounded by the number of barbers with work in flight.
#[derive(Default)]
pub struct BarberLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held for the duration of a read-check-write on one barber's timeline.
pub struct BarberGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    barber_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl BarberLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, barber_id: &str) -> BarberGuard<'_> {
        // Cloned under the shard lock, so eviction can never race a new waiter.
        let lock = self
            .locks
            .entry(barber_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        BarberGuard {
            locks: &self.locks,
            barber_id: barber_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for BarberGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.barber_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
