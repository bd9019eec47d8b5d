//! Reference identity tracking for one (de)serialization call.
//!
//! The [`ReferenceManager`] hands out graph ids. The first encounter of an
//! instance allocates a fresh id and reports `is_first_usage = true`; every
//! later encounter of the same instance (same allocation, not equal value)
//! returns the same id with `is_first_usage = false`. Ids start at 1 so that
//! 0 can mean "no reference" on the wire.

use std::collections::HashMap;

use crate::model::ModelRef;

/// What the manager knows about one instance.
#[derive(Debug, Clone)]
pub struct ReferenceInfo {
    /// Graph id of the instance.
    pub id: u32,
    /// The instance itself.
    pub instance: ModelRef,
    /// True only on the call that registered the instance.
    pub is_first_usage: bool,
}

/// Identity map for a single top-level call. Not shared across calls.
#[derive(Debug)]
pub struct ReferenceManager {
    // Keyed by allocation address. The handles kept in `by_id` keep those
    // allocations alive, so an address cannot be reused while the pass runs.
    by_address: HashMap<usize, u32>,
    by_id: HashMap<u32, ModelRef>,
    next_id: u32,
}

impl ReferenceManager {
    /// The first id handed out.
    pub const FIRST_ID: u32 = 1;

    /// Creates an empty manager.
    pub fn new() -> Self {
        Self {
            by_address: HashMap::new(),
            by_id: HashMap::new(),
            next_id: Self::FIRST_ID,
        }
    }

    /// Gets or creates the info for `instance`.
    pub fn get_info(&mut self, instance: &ModelRef) -> ReferenceInfo {
        let address = instance.address();
        if let Some(&id) = self.by_address.get(&address) {
            return ReferenceInfo {
                id,
                instance: instance.clone(),
                is_first_usage: false,
            };
        }

        let id = self.allocate_id();
        self.by_address.insert(address, id);
        self.by_id.insert(id, instance.clone());
        ReferenceInfo {
            id,
            instance: instance.clone(),
            is_first_usage: true,
        }
    }

    /// Looks an instance up by its graph id.
    pub fn get_info_by_id(&self, id: u32) -> Option<ReferenceInfo> {
        self.by_id.get(&id).map(|instance| ReferenceInfo {
            id,
            instance: instance.clone(),
            is_first_usage: false,
        })
    }

    /// Binds `instance` to a known id, as read from a payload.
    ///
    /// Returns false, changing nothing, when the id is already bound to a
    /// different instance or when the instance is already known under another
    /// id. Re-registering the same pair is a no-op that returns true.
    pub fn register_manually(&mut self, id: u32, instance: &ModelRef) -> bool {
        if id == 0 {
            return false;
        }

        let address = instance.address();
        match (self.by_id.get(&id), self.by_address.get(&address)) {
            (Some(existing), _) => existing.ptr_eq(instance),
            (None, Some(_)) => false,
            (None, None) => {
                self.by_id.insert(id, instance.clone());
                self.by_address.insert(address, id);
                if id >= self.next_id {
                    self.next_id = id.saturating_add(1);
                }
                true
            }
        }
    }

    /// Marks the current allocation point for [`rollback`](Self::rollback).
    pub fn checkpoint(&self) -> u32 {
        self.next_id
    }

    /// Forgets every instance registered at or after `checkpoint`.
    ///
    /// Used when a member is dropped after its value was partly encoded: the
    /// instances it introduced were never written, so their next occurrence
    /// must be written in full again.
    pub fn rollback(&mut self, checkpoint: u32) {
        let checkpoint = checkpoint.max(Self::FIRST_ID);
        let dropped: Vec<u32> = self.by_id.keys().copied().filter(|&id| id >= checkpoint).collect();
        for id in dropped {
            if let Some(instance) = self.by_id.remove(&id) {
                self.by_address.remove(&instance.address());
            }
        }
        self.next_id = self.next_id.min(checkpoint);
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true when nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn allocate_id(&mut self) -> u32 {
        // Manual registration may have claimed ids ahead of the counter.
        while self.by_id.contains_key(&self.next_id) {
            self.next_id = self.next_id.saturating_add(1);
        }
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }
}

impl Default for ReferenceManager {
    fn default() -> Self {
        Self::new()
    }
}
