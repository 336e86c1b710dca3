//! System-wide mutex table

use core::ops::{Index, IndexMut};

use crate::config::NUM_MUT;

use super::{MutexDescriptor, MutexId, MutexKind, MutexName};

/// Fixed array of mutex descriptors.
#[derive(Debug)]
pub struct MutexTable {
    slots: [MutexDescriptor; NUM_MUT],
    live: usize,
}

impl MutexTable {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| MutexDescriptor::new()),
            live: 0,
        }
    }

    /// Number of descriptors in use.
    pub fn live(&self) -> usize {
        self.live
    }

    pub fn is_full(&self) -> bool {
        self.live == NUM_MUT
    }

    /// Live mutex called `name`.
    pub fn find(&self, name: &MutexName) -> Option<MutexId> {
        self.slots
            .iter()
            .position(|slot| slot.name() == Some(name))
            .map(MutexId::from_index)
    }

    /// Claim the lowest free descriptor.
    pub fn allocate(&mut self, name: MutexName, kind: MutexKind) -> Option<MutexId> {
        let index = self.slots.iter().position(MutexDescriptor::is_free)?;
        self.slots[index].claim(name, kind);
        self.live += 1;
        Some(MutexId::from_index(index))
    }

    /// Return a descriptor to the free pool.
    pub fn free(&mut self, id: MutexId) {
        let slot = &mut self.slots[id.index()];
        if !slot.is_free() {
            *slot = MutexDescriptor::new();
            self.live -= 1;
        }
    }
}

impl Default for MutexTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<MutexId> for MutexTable {
    type Output = MutexDescriptor;

    fn index(&self, id: MutexId) -> &MutexDescriptor {
        &self.slots[id.index()]
    }
}

impl IndexMut<MutexId> for MutexTable {
    fn index_mut(&mut self, id: MutexId) -> &mut MutexDescriptor {
        &mut self.slots[id.index()]
    }
}
