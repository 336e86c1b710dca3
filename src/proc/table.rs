//! Process table

use core::ops::{Index, IndexMut};

use crate::config::MAX_PROC;
use crate::hal::Hal;

use super::{Pcb, Pid, ProcessState};

/// Fixed array of process control blocks indexed by pid.
pub struct ProcessTable<H: Hal> {
    slots: [Pcb<H>; MAX_PROC],
}

impl<H: Hal> ProcessTable<H> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|index| Pcb::new(Pid::from_index(index))),
        }
    }

    /// Lowest unused slot.
    pub fn find_free(&self) -> Option<Pid> {
        self.slots
            .iter()
            .find(|pcb| pcb.state == ProcessState::Unused)
            .map(|pcb| pcb.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pcb<H>> {
        self.slots.iter()
    }

    /// Borrow one slot mutably and a different one shared.
    pub fn pair_mut(&mut self, first: Pid, second: Pid) -> (&mut Pcb<H>, &Pcb<H>) {
        debug_assert_ne!(first, second);
        let (a, b) = (first.index(), second.index());
        if a < b {
            let (low, high) = self.slots.split_at_mut(b);
            (&mut low[a], &high[0])
        } else {
            let (low, high) = self.slots.split_at_mut(a);
            (&mut high[0], &low[b])
        }
    }
}

impl<H: Hal> Default for ProcessTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Hal> Index<Pid> for ProcessTable<H> {
    type Output = Pcb<H>;

    fn index(&self, pid: Pid) -> &Pcb<H> {
        &self.slots[pid.index()]
    }
}

impl<H: Hal> IndexMut<Pid> for ProcessTable<H> {
    fn index_mut(&mut self, pid: Pid) -> &mut Pcb<H> {
        &mut self.slots[pid.index()]
    }
}
