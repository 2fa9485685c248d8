use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per record id.
///
/// Guards are held across store I/O, so the read-check-write sequence on a
/// booking or driver runs as a unit. Lock order is always booking, then driver.
/// A slot lives only while someone holds or waits on it.
#[derive(Default)]
pub struct KeyedLocks {
    slots: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: Uuid) -> KeyedGuard<'_> {
        // Clone the slot out first so no DashMap shard guard lives across the await.
        let slot = self
            .slots
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        KeyedGuard {
            locks: self,
            id,
            guard: Some(slot.lock_owned().await),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Held lock on one id. Dropping it unlocks and evicts the slot if it is idle.
pub struct KeyedGuard<'a> {
    locks: &'a KeyedLocks,
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold a clone of the slot, so a count of one means only the map is left.
        self.locks
            .slots
            .remove_if(&self.id, |_, slot| Arc::strong_count(slot) == 1);
    }
}
