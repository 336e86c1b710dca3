//! Mutex system calls

use core::task::Poll;

use log::{debug, info};

use crate::config::NUM_MUT_PROC;
use crate::hal::{Hal, IrqGuard, IrqLevel};
use crate::kernel::Kernel;
use crate::proc::{PendingCall, Pid, WaitFlags};
use crate::syscall::{SysResult, SyscallError};

use super::{MutexHandle, MutexId, MutexKind, MutexName};

impl<'h, H: Hal> Kernel<'h, H> {
    /// Create a mutex and open it in the caller.
    ///
    /// # Arguments
    /// * `name` - Name as read from the caller, or the error reading it
    /// * `kind` - 0 for non-recursive, 1 for recursive
    ///
    /// # Returns
    /// The new handle. Blocks while the mutex table is full.
    pub(crate) fn create_mutex(
        &mut self,
        name: SysResult<MutexName>,
        kind: u64,
    ) -> Poll<SysResult<u64>> {
        let caller = self.current_pid();
        if self.procs[caller].open_mutexes() >= NUM_MUT_PROC {
            return Poll::Ready(Err(SyscallError::MutexLimit));
        }
        let name = name?;
        let kind = MutexKind::try_from(kind)?;
        self.try_create_mutex(name, kind)
    }

    /// Allocation step of `create_mutex`, re-run after waiting for space.
    ///
    /// The name is checked again on every attempt since another process may
    /// have taken it while the caller slept.
    pub(crate) fn try_create_mutex(
        &mut self,
        name: MutexName,
        kind: MutexKind,
    ) -> Poll<SysResult<u64>> {
        let caller = self.current_pid();
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
        if self.mutexes.find(&name).is_some() {
            return Poll::Ready(Err(SyscallError::NameExists));
        }
        let Some(id) = self.mutexes.allocate(name, kind) else {
            debug!("mutex table full, process {} waits to create {:?}", caller, name);
            self.block_current(WaitFlags::MUTEX_CREATE, PendingCall::CreateMutex { name, kind });
            return Poll::Pending;
        };
        let Some(handle) = self.procs[caller].attach_mutex(id) else {
            self.mutexes.free(id);
            return Poll::Ready(Err(SyscallError::NoDescriptor));
        };
        self.mutexes[id].add_opener(caller);
        info!("process {} created mutex {:?} ({:?})", caller, name, kind);
        Poll::Ready(Ok(handle.index() as u64))
    }

    /// Open an existing mutex by name.
    pub(crate) fn open_mutex(&mut self, name: SysResult<MutexName>) -> SysResult<u64> {
        let caller = self.current_pid();
        if self.procs[caller].open_mutexes() >= NUM_MUT_PROC {
            return Err(SyscallError::MutexLimit);
        }
        let name = name?;
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
        let id = self.mutexes.find(&name).ok_or(SyscallError::MutexNotFound)?;
        let handle = self.procs[caller]
            .attach_mutex(id)
            .ok_or(SyscallError::NoDescriptor)?;
        self.mutexes[id].add_opener(caller);
        Ok(handle.index() as u64)
    }

    pub(crate) fn lock_mutex(&mut self, raw: u64) -> Poll<SysResult<u64>> {
        let handle = MutexHandle::new(raw).ok_or(SyscallError::BadHandle)?;
        self.try_lock(handle)
    }

    fn try_lock(&mut self, handle: MutexHandle) -> Poll<SysResult<u64>> {
        let caller = self.current_pid();
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
        let id = self.open_mutex_id(caller, handle)?;
        let mutex = &mut self.mutexes[id];
        match mutex.owner() {
            None => mutex.acquire(caller),
            Some(owner) if owner == caller => {
                if mutex.kind() == MutexKind::NonRecursive {
                    return Poll::Ready(Err(SyscallError::WouldDeadlock));
                }
                mutex.relock();
            }
            Some(owner) => {
                mutex.enqueue_waiter(caller);
                debug!("process {} waits for mutex held by {}", caller, owner);
                self.block_current(WaitFlags::MUTEX_LOCK, PendingCall::Lock { handle });
                return Poll::Pending;
            }
        }
        Poll::Ready(Ok(0))
    }

    /// Finish a lock the caller blocked in. Ownership is normally handed
    /// over by the unlocking process before the waiter runs again.
    pub(crate) fn resume_lock(&mut self, handle: MutexHandle) -> Poll<SysResult<u64>> {
        let caller = self.current_pid();
        let owned = self.procs[caller]
            .mutex_at(handle)
            .is_some_and(|id| self.mutexes[id].owner() == Some(caller));
        if owned {
            Poll::Ready(Ok(0))
        } else {
            self.try_lock(handle)
        }
    }

    pub(crate) fn unlock_mutex(&mut self, raw: u64) -> SysResult<u64> {
        let caller = self.current_pid();
        let handle = MutexHandle::new(raw).ok_or(SyscallError::BadHandle)?;
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
        let id = self.open_mutex_id(caller, handle)?;
        if self.mutexes[id].owner() != Some(caller) {
            return Err(SyscallError::NotOwner);
        }
        if self.mutexes[id].unlock_once() {
            self.hand_over(id);
        }
        Ok(0)
    }

    pub(crate) fn close_mutex(&mut self, raw: u64) -> SysResult<u64> {
        let caller = self.current_pid();
        let handle = MutexHandle::new(raw).ok_or(SyscallError::BadHandle)?;
        self.close_handle(caller, handle)
    }

    /// Close every handle `pid` still has open.
    pub(crate) fn close_all_mutexes(&mut self, pid: Pid) {
        for raw in 0..NUM_MUT_PROC as u64 {
            let Some(handle) = MutexHandle::new(raw) else {
                continue;
            };
            if self.procs[pid].mutex_at(handle).is_some() {
                let _ = self.close_handle(pid, handle);
            }
        }
    }

    /// Drop one handle. Releases the lock if `pid` held it and frees the
    /// descriptor with its last opener.
    fn close_handle(&mut self, pid: Pid, handle: MutexHandle) -> SysResult<u64> {
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
        let id = self.procs[pid]
            .detach_mutex(handle)
            .ok_or(SyscallError::BadHandle)?;
        if self.mutexes[id].owner() == Some(pid) {
            self.hand_over(id);
        }
        if self.mutexes[id].remove_opener(pid) == 0 {
            info!("mutex {:?} destroyed", self.mutexes[id].name());
            self.mutexes.free(id);
            self.wake_first(WaitFlags::MUTEX_CREATE);
        }
        Ok(0)
    }

    /// Release `id` and give it to the longest waiter, if any.
    fn hand_over(&mut self, id: MutexId) {
        let mutex = &mut self.mutexes[id];
        mutex.release();
        if let Some(next) = mutex.next_waiter() {
            mutex.acquire(next);
            debug!("mutex handed to process {}", next);
            self.wake(next);
        }
    }

    fn open_mutex_id(&self, pid: Pid, handle: MutexHandle) -> SysResult<MutexId> {
        self.procs[pid]
            .mutex_at(handle)
            .ok_or(SyscallError::BadHandle)
    }
}
