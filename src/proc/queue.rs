//! FIFO queue of pids
//!
//! Fixed ring buffer holding at most one entry per process. Used for the
//! ready queue, the blocked queue and mutex wait lists.

use crate::config::MAX_PROC;

use super::Pid;

/// Bounded FIFO of process ids.
#[derive(Debug, Clone)]
pub struct PidQueue {
    slots: [Pid; MAX_PROC],
    head: usize,
    len: usize,
}

impl PidQueue {
    pub const fn new() -> Self {
        Self {
            slots: [Pid::from_index(0); MAX_PROC],
            head: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn front(&self) -> Option<Pid> {
        if self.is_empty() {
            None
        } else {
            Some(self.slots[self.head])
        }
    }

    /// Append `pid` at the tail.
    pub fn push_back(&mut self, pid: Pid) {
        debug_assert!(!self.contains(pid), "process {} queued twice", pid);
        if self.len == MAX_PROC {
            return;
        }
        let tail = self.slot(self.len);
        self.slots[tail] = pid;
        self.len += 1;
    }

    pub fn pop_front(&mut self) -> Option<Pid> {
        let pid = self.front()?;
        self.head = (self.head + 1) % MAX_PROC;
        self.len -= 1;
        Some(pid)
    }

    /// Unlink `pid` from wherever it sits. Returns whether it was queued.
    pub fn remove(&mut self, pid: Pid) -> bool {
        let Some(position) = self.iter().position(|queued| queued == pid) else {
            return false;
        };
        for offset in position..self.len - 1 {
            let (to, from) = (self.slot(offset), self.slot(offset + 1));
            self.slots[to] = self.slots[from];
        }
        self.len -= 1;
        true
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.iter().any(|queued| queued == pid)
    }

    /// Pids from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        (0..self.len).map(move |offset| self.slots[self.slot(offset)])
    }

    fn slot(&self, offset: usize) -> usize {
        (self.head + offset) % MAX_PROC
    }
}

impl Default for PidQueue {
    fn default() -> Self {
        Self::new()
    }
}
