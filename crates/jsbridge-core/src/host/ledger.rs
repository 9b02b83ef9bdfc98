//! Reference ledger
//!
//! Hands out local and global references to heap objects and records every
//! deletion, so callers can assert that each reference was released exactly
//! once. Objects whose last reference is deleted are queued as unreachable
//! until the owning heap sweeps them.

use std::collections::HashMap;
use std::sync::Arc;

use jsbridge_sdk::{GlobalRef, LocalRef, ObjectId, RefId, RefTable};
use parking_lot::Mutex;
use tracing::warn;

#[derive(Default)]
struct LedgerState {
    next_ref: RefId,
    live_local: HashMap<RefId, ObjectId>,
    live_global: HashMap<RefId, ObjectId>,
    releases: HashMap<RefId, u32>,
    double_releases: usize,
    object_refs: HashMap<ObjectId, usize>,
    unreachable: Vec<ObjectId>,
}

impl LedgerState {
    fn retain(&mut self, object: ObjectId) {
        *self.object_refs.entry(object).or_insert(0) += 1;
    }

    fn drop_ref(&mut self, object: ObjectId) {
        let Some(count) = self.object_refs.get_mut(&object) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.object_refs.remove(&object);
            self.unreachable.push(object);
        }
    }
}

/// Reference bookkeeping of a [`ManagedHeap`](super::ManagedHeap)
#[derive(Default)]
pub struct RefLedger {
    state: Mutex<LedgerState>,
}

impl RefLedger {
    /// Create an empty ledger
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a local reference to `object`
    pub fn new_local(self: &Arc<Self>, object: ObjectId) -> LocalRef {
        let ref_id = {
            let mut state = self.state.lock();
            state.next_ref += 1;
            let id = state.next_ref;
            state.live_local.insert(id, object);
            state.retain(object);
            id
        };
        LocalRef::new(ref_id, object, self.clone())
    }

    /// Create a global reference to `object`
    pub fn new_global(self: &Arc<Self>, object: ObjectId) -> GlobalRef {
        let ref_id = {
            let mut state = self.state.lock();
            state.next_ref += 1;
            let id = state.next_ref;
            state.live_global.insert(id, object);
            state.retain(object);
            id
        };
        GlobalRef::new(ref_id, object, self.clone())
    }

    /// Local references not yet released
    pub fn live_local_refs(&self) -> usize {
        self.state.lock().live_local.len()
    }

    /// Global references not yet released
    pub fn live_global_refs(&self) -> usize {
        self.state.lock().live_global.len()
    }

    /// How many times a reference was deleted
    pub fn release_count(&self, ref_id: RefId) -> u32 {
        self.state.lock().releases.get(&ref_id).copied().unwrap_or(0)
    }

    /// Deletions of references that were already deleted
    pub fn double_releases(&self) -> usize {
        self.state.lock().double_releases
    }

    /// Drain the objects left without any live reference
    pub fn take_unreachable(&self) -> Vec<ObjectId> {
        std::mem::take(&mut self.state.lock().unreachable)
    }

    fn record(&self, ref_id: RefId, global: bool) {
        let mut state = self.state.lock();
        let object = if global {
            state.live_global.remove(&ref_id)
        } else {
            state.live_local.remove(&ref_id)
        };
        let count = state.releases.entry(ref_id).or_insert(0);
        *count += 1;
        if let Some(object) = object {
            state.drop_ref(object);
        } else {
            state.double_releases += 1;
            warn!(ref_id, global, "release of a reference that is not live");
        }
    }
}

impl RefTable for RefLedger {
    fn delete_local_ref(&self, ref_id: RefId) {
        self.record(ref_id, false);
    }

    fn delete_global_ref(&self, ref_id: RefId) {
        self.record(ref_id, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_lifecycle() {
        let ledger = RefLedger::new();
        let mut r = ledger.new_local(1);
        assert_eq!(ledger.live_local_refs(), 1);
        r.release();
        assert_eq!(ledger.live_local_refs(), 0);
        assert_eq!(ledger.release_count(r.ref_id()), 1);
        drop(r);
        assert_eq!(ledger.release_count(1), 1);
        assert_eq!(ledger.double_releases(), 0);
    }

    #[test]
    fn test_double_delete_is_counted() {
        let ledger = RefLedger::new();
        let r = ledger.new_local(5);
        let id = r.ref_id();
        drop(r);
        ledger.delete_local_ref(id);
        assert_eq!(ledger.release_count(id), 2);
        assert_eq!(ledger.double_releases(), 1);
    }

    #[test]
    fn test_global_refs() {
        let ledger = RefLedger::new();
        let g = ledger.new_global(3);
        let g2 = g.clone();
        assert_eq!(ledger.live_global_refs(), 1);
        drop(g);
        drop(g2);
        assert_eq!(ledger.live_global_refs(), 0);
    }

    #[test]
    fn test_object_unreachable_after_last_ref() {
        let ledger = RefLedger::new();
        let a = ledger.new_local(7);
        let g = ledger.new_global(7);
        let b = ledger.new_local(8);
        drop(a);
        assert!(ledger.take_unreachable().is_empty());
        drop(g);
        assert_eq!(ledger.take_unreachable(), vec![7]);

        // A double delete does not queue the object twice
        let id = b.ref_id();
        drop(b);
        ledger.delete_local_ref(id);
        assert_eq!(ledger.take_unreachable(), vec![8]);
        assert!(ledger.take_unreachable().is_empty());
    }
}
