//! Mutex descriptors and identifiers

use core::fmt;

use crate::config::{MAX_MUTEX_NAME, MAX_PROC, NUM_MUT, NUM_MUT_PROC};
use crate::proc::{Pid, PidQueue};
use crate::syscall::SyscallError;

/// Locking discipline of a mutex.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexKind {
    /// Relocking by the owner is an error.
    NonRecursive = 0,
    /// The owner may lock again; each lock needs a matching unlock.
    Recursive = 1,
}

impl TryFrom<u64> for MutexKind {
    type Error = SyscallError;

    fn try_from(value: u64) -> Result<Self, SyscallError> {
        match value {
            0 => Ok(Self::NonRecursive),
            1 => Ok(Self::Recursive),
            _ => Err(SyscallError::InvalidArgument),
        }
    }
}

/// Mutex name stored inline.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MutexName {
    bytes: [u8; MAX_MUTEX_NAME],
    len: u8,
}

impl MutexName {
    /// Copy `name`, rejecting names longer than [`MAX_MUTEX_NAME`].
    pub fn new(name: &[u8]) -> Result<Self, SyscallError> {
        if name.len() > MAX_MUTEX_NAME {
            return Err(SyscallError::NameTooLong);
        }
        let mut bytes = [0; MAX_MUTEX_NAME];
        bytes[..name.len()].copy_from_slice(name);
        Ok(Self {
            bytes,
            len: name.len() as u8,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }
}

impl fmt::Debug for MutexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(text) => write!(f, "{:?}", text),
            Err(_) => write!(f, "{:?}", self.as_bytes()),
        }
    }
}

/// Index of a descriptor in the mutex table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct MutexId(u8);

impl MutexId {
    /// Create an id if `index` names a table slot.
    pub const fn new(index: usize) -> Option<Self> {
        if index < NUM_MUT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u8)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-process handle: index into the process's open-mutex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct MutexHandle(u8);

impl MutexHandle {
    /// Decode a handle passed by a process. Out-of-range values are rejected.
    pub const fn new(raw: u64) -> Option<Self> {
        if raw < NUM_MUT_PROC as u64 {
            Some(Self(raw as u8))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One slot of the mutex table.
///
/// A descriptor without a name is free.
#[derive(Debug, Clone)]
pub struct MutexDescriptor {
    name: Option<MutexName>,
    kind: MutexKind,
    openers: [u8; MAX_PROC],
    owner: Option<Pid>,
    holds: u32,
    waiters: PidQueue,
}

impl MutexDescriptor {
    pub const fn new() -> Self {
        Self {
            name: None,
            kind: MutexKind::NonRecursive,
            openers: [0; MAX_PROC],
            owner: None,
            holds: 0,
            waiters: PidQueue::new(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.name.is_none()
    }

    pub fn name(&self) -> Option<&MutexName> {
        self.name.as_ref()
    }

    pub fn kind(&self) -> MutexKind {
        self.kind
    }

    pub fn owner(&self) -> Option<Pid> {
        self.owner
    }

    /// Outstanding locks by the owner.
    pub fn holds(&self) -> u32 {
        self.holds
    }

    /// Processes blocked in `lock`, oldest first.
    pub fn waiters(&self) -> impl Iterator<Item = Pid> + '_ {
        self.waiters.iter()
    }

    /// Handles `pid` has open on this mutex.
    pub fn opened_by(&self, pid: Pid) -> usize {
        usize::from(self.openers[pid.index()])
    }

    /// Handles open across all processes.
    pub fn openers(&self) -> usize {
        self.openers.iter().map(|count| usize::from(*count)).sum()
    }

    pub(crate) fn claim(&mut self, name: MutexName, kind: MutexKind) {
        *self = Self::new();
        self.name = Some(name);
        self.kind = kind;
    }

    pub(crate) fn add_opener(&mut self, pid: Pid) {
        self.openers[pid.index()] += 1;
    }

    /// Drop one of `pid`'s handles, returning how many remain in total.
    pub(crate) fn remove_opener(&mut self, pid: Pid) -> usize {
        let count = &mut self.openers[pid.index()];
        *count = count.saturating_sub(1);
        self.openers()
    }

    pub(crate) fn acquire(&mut self, pid: Pid) {
        self.owner = Some(pid);
        self.holds = 1;
    }

    pub(crate) fn relock(&mut self) {
        self.holds += 1;
    }

    /// Undo one lock. Returns true once the owner holds it no more.
    pub(crate) fn unlock_once(&mut self) -> bool {
        self.holds = self.holds.saturating_sub(1);
        self.holds == 0
    }

    pub(crate) fn release(&mut self) {
        self.owner = None;
        self.holds = 0;
    }

    pub(crate) fn enqueue_waiter(&mut self, pid: Pid) {
        self.waiters.push_back(pid);
    }

    pub(crate) fn next_waiter(&mut self) -> Option<Pid> {
        self.waiters.pop_front()
    }
}

impl Default for MutexDescriptor {
    fn default() -> Self {
        Self::new()
    }
}
