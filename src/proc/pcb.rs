//! Process control block

use core::fmt;

use bitflags::bitflags;

use crate::config::{MAX_PROC, NUM_MUT_PROC, TICKS_PER_SECOND, TICKS_PER_SLICE};
use crate::hal::Hal;
use crate::mutex::{MutexHandle, MutexId, MutexKind, MutexName};

/// Process identifier: the index of the process's slot in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Pid(u16);

impl Pid {
    /// Create a pid if `index` names a table slot.
    pub const fn new(index: usize) -> Option<Self> {
        if index < MAX_PROC {
            Some(Self(index as u16))
        } else {
            None
        }
    }

    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u16)
    }

    /// Table slot of this process.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Slot available for a new process.
    Unused,
    /// Waiting in the ready queue.
    Ready,
    /// Owns the CPU. Also sits at the head of the ready queue.
    Running,
    /// Waiting in the blocked queue for the reasons in its wait flags.
    Blocked,
    /// Finished; the slot is reclaimed once the CPU has left it.
    Terminated,
}

bitflags! {
    /// Reasons a blocked process is waiting.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WaitFlags: u8 {
        /// Sleeping until a tick deadline.
        const SLEEP = 1 << 0;
        /// Waiting for terminal input.
        const READ = 1 << 1;
        /// Waiting for a free mutex descriptor.
        const MUTEX_CREATE = 1 << 2;
        /// Waiting for ownership of a mutex.
        const MUTEX_LOCK = 1 << 3;
    }
}

/// A blocking call to re-run when the process is dispatched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCall {
    /// Sleep; completes on wake.
    Sleep,
    /// Terminal read; re-checks the input buffer.
    ReadChar,
    /// Mutex creation; re-validates the name, then retries allocation.
    CreateMutex {
        /// Requested name.
        name: MutexName,
        /// Requested kind.
        kind: MutexKind,
    },
    /// Lock; completes if ownership was handed over, otherwise retries.
    Lock {
        /// Handle the lock was requested through.
        handle: MutexHandle,
    },
}

/// Per-process record.
pub struct Pcb<H: Hal> {
    pub(crate) id: Pid,
    pub(crate) state: ProcessState,
    pub(crate) context: H::Context,
    pub(crate) image: Option<H::Image>,
    pub(crate) stack: Option<H::Stack>,
    pub(crate) sleep_start: u64,
    pub(crate) sleep_secs: u32,
    pub(crate) user_ticks: u64,
    pub(crate) system_ticks: u64,
    pub(crate) slice_left: u32,
    pub(crate) wait: WaitFlags,
    pub(crate) pending: Option<PendingCall>,
    pub(crate) handles: [Option<MutexId>; NUM_MUT_PROC],
    pub(crate) open_mutexes: usize,
}

impl<H: Hal> Pcb<H> {
    pub(crate) fn new(id: Pid) -> Self {
        Self {
            id,
            state: ProcessState::Unused,
            context: H::Context::default(),
            image: None,
            stack: None,
            sleep_start: 0,
            sleep_secs: 0,
            user_ticks: 0,
            system_ticks: 0,
            slice_left: 0,
            wait: WaitFlags::empty(),
            pending: None,
            handles: [None; NUM_MUT_PROC],
            open_mutexes: 0,
        }
    }

    /// Fill a free slot with a freshly loaded program.
    pub(crate) fn activate(&mut self, context: H::Context, image: H::Image, stack: H::Stack) {
        *self = Self::new(self.id);
        self.context = context;
        self.image = Some(image);
        self.stack = Some(stack);
        self.slice_left = TICKS_PER_SLICE;
        self.state = ProcessState::Ready;
    }

    pub fn id(&self) -> Pid {
        self.id
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn wait(&self) -> WaitFlags {
        self.wait
    }

    /// Ticks charged while the process ran in user mode.
    pub fn user_ticks(&self) -> u64 {
        self.user_ticks
    }

    /// Ticks charged while the kernel ran on the process's behalf.
    pub fn system_ticks(&self) -> u64 {
        self.system_ticks
    }

    pub fn slice_left(&self) -> u32 {
        self.slice_left
    }

    pub fn open_mutexes(&self) -> usize {
        self.open_mutexes
    }

    pub fn pending(&self) -> Option<PendingCall> {
        self.pending
    }

    /// Whether a sleep started at `sleep_start` has run its course by `now`.
    ///
    /// Only a plain sleep qualifies; a process also waiting on input or a
    /// mutex stays blocked.
    pub fn sleep_due(&self, now: u64) -> bool {
        let others = WaitFlags::READ | WaitFlags::MUTEX_CREATE | WaitFlags::MUTEX_LOCK;
        self.state == ProcessState::Blocked
            && self.wait.contains(WaitFlags::SLEEP)
            && !self.wait.intersects(others)
            && now.saturating_sub(self.sleep_start)
                >= u64::from(self.sleep_secs) * u64::from(TICKS_PER_SECOND)
    }

    /// Mutex behind a handle, if the handle is open.
    pub fn mutex_at(&self, handle: MutexHandle) -> Option<MutexId> {
        self.handles[handle.index()]
    }

    /// Bind `id` to the lowest free handle.
    pub(crate) fn attach_mutex(&mut self, id: MutexId) -> Option<MutexHandle> {
        let index = self.handles.iter().position(Option::is_none)?;
        self.handles[index] = Some(id);
        self.open_mutexes += 1;
        MutexHandle::new(index as u64)
    }

    /// Unbind a handle, returning the mutex it referred to.
    pub(crate) fn detach_mutex(&mut self, handle: MutexHandle) -> Option<MutexId> {
        let id = self.handles[handle.index()].take()?;
        self.open_mutexes -= 1;
        Some(id)
    }
}
