//! # Live worker table of the manager.
//!
//! Only the manager loop mutates the table. An entry is removed when the OS
//! reports the worker reaped, which is what frees its id.

use std::collections::BTreeMap;

use crate::worker::{WorkerCensus, WorkerId};

/// One live worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerSlot {
    /// Identity held by the worker.
    pub id: WorkerId,
    /// OS process id.
    pub pid: u32,
    /// Asked to exit by a scale-down; its exit is expected.
    pub retiring: bool,
}

/// Live workers keyed by id.
#[derive(Debug, Default)]
pub struct WorkerTable {
    slots: BTreeMap<WorkerId, WorkerSlot>,
}

impl WorkerTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a spawned worker; returns `false` if `id` is already held.
    pub fn insert(&mut self, id: WorkerId, pid: u32) -> bool {
        if self.slots.contains_key(&id) {
            return false;
        }
        self.slots.insert(
            id,
            WorkerSlot {
                id,
                pid,
                retiring: false,
            },
        );
        true
    }

    /// Removes a reaped worker.
    ///
    /// The pid must match, so a stale report can never evict a successor.
    pub fn remove(&mut self, id: WorkerId, pid: u32) -> Option<WorkerSlot> {
        match self.slots.get(&id) {
            Some(slot) if slot.pid == pid => self.slots.remove(&id),
            _ => None,
        }
    }

    /// Number of live workers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` if no worker is alive.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Live workers in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkerSlot> {
        self.slots.values()
    }

    /// Marks live workers whose id is above `desired` as retiring and returns
    /// the newly marked ones, highest id first.
    pub fn retire_excess(&mut self, desired: usize) -> Vec<WorkerSlot> {
        self.slots
            .values_mut()
            .rev()
            .filter(|slot| slot.id.get() as usize > desired && !slot.retiring)
            .map(|slot| {
                slot.retiring = true;
                *slot
            })
            .collect()
    }
}

impl WorkerCensus for WorkerTable {
    fn is_alive(&self, id: WorkerId) -> bool {
        self.slots.contains_key(&id)
    }

    fn alive_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> WorkerId {
        WorkerId::new(n).unwrap()
    }

    #[test]
    fn duplicate_ids_are_refused() {
        let mut table = WorkerTable::new();
        assert!(table.insert(id(1), 100));
        assert!(!table.insert(id(1), 101));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn stale_reap_does_not_evict_successor() {
        let mut table = WorkerTable::new();
        table.insert(id(1), 100);
        assert!(table.remove(id(1), 100).is_some());
        table.insert(id(1), 200);
        assert!(table.remove(id(1), 100).is_none());
        assert!(table.is_alive(id(1)));
    }

    #[test]
    fn excess_is_retired_highest_first_and_once() {
        let mut table = WorkerTable::new();
        for n in 1..=4 {
            table.insert(id(n), 100 + n);
        }
        let retired: Vec<u32> = table.retire_excess(2).iter().map(|s| s.id.get()).collect();
        assert_eq!(retired, vec![4, 3]);
        assert!(table.retire_excess(2).is_empty());

        let retired: Vec<u32> = table.retire_excess(1).iter().map(|s| s.id.get()).collect();
        assert_eq!(retired, vec![2]);

        // Reaping a retired worker reports it as expected.
        let slot = table.remove(id(4), 104).unwrap();
        assert!(slot.retiring);
        assert!(!table.remove(id(1), 101).unwrap().retiring);
    }

    #[test]
    fn ids_stay_unique_over_random_spawn_and_death() {
        use rand::Rng;

        use crate::worker::{DesiredWorkers, WorkerIdentityAllocator};

        let mut rng = rand::rng();
        let desired = DesiredWorkers::new(4);
        let allocator = WorkerIdentityAllocator::new(desired.clone());
        let mut table = WorkerTable::new();
        let mut next_pid = 1000;

        for _ in 0..2_000 {
            match rng.random_range(0..4) {
                0 => {
                    desired.increment();
                }
                1 => {
                    let d = desired.decrement();
                    table.retire_excess(d);
                }
                2 => {
                    let live: Vec<WorkerSlot> = table.iter().copied().collect();
                    if !live.is_empty() {
                        let victim = live[rng.random_range(0..live.len())];
                        assert!(table.remove(victim.id, victim.pid).is_some());
                    }
                }
                _ => {}
            }

            // Refill the way the manager does.
            let d = desired.get();
            while table.iter().filter(|s| s.id.get() as usize <= d).count() < d {
                let new_id = allocator.allocate(&table).unwrap();
                assert!(new_id.get() as usize <= d, "id {new_id} above desired {d}");
                assert!(table.insert(new_id, next_pid), "id {new_id} handed out twice");
                next_pid += 1;
            }

            let held: Vec<u32> = table.iter().filter(|s| !s.retiring).map(|s| s.id.get()).collect();
            for n in 1..=d as u32 {
                assert!(table.is_alive(id(n)), "id {n} missing with desired {d}: {held:?}");
            }
        }
    }
}
