//! System Call Handler
//!
//! Decodes the trap registers, dispatches on [`Syscall`] and implements the
//! calls that do not belong to another subsystem.

use core::task::Poll;

use log::{trace, warn};

use crate::config::{MAX_PROGRAM_NAME, REG_ARGS, REG_CALL, REG_RESULT, WRITE_CHUNK};
use crate::hal::{Hal, IrqGuard, IrqLevel};
use crate::kernel::Kernel;
use crate::proc::{PendingCall, WaitFlags};

use super::error::{SysResult, SyscallError};

/// System call numbers.
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    CreateProcess = 0,
    TerminateProcess = 1,
    Write = 2,
    GetPid = 3,
    Sleep = 4,
    ProcessTimes = 5,
    CreateMutex = 6,
    OpenMutex = 7,
    Lock = 8,
    Unlock = 9,
    CloseMutex = 10,
    ReadChar = 11,
}

impl TryFrom<u64> for Syscall {
    type Error = SyscallError;

    fn try_from(number: u64) -> Result<Self, SyscallError> {
        Ok(match number {
            0 => Self::CreateProcess,
            1 => Self::TerminateProcess,
            2 => Self::Write,
            3 => Self::GetPid,
            4 => Self::Sleep,
            5 => Self::ProcessTimes,
            6 => Self::CreateMutex,
            7 => Self::OpenMutex,
            8 => Self::Lock,
            9 => Self::Unlock,
            10 => Self::CloseMutex,
            11 => Self::ReadChar,
            _ => return Err(SyscallError::NoSuchCall),
        })
    }
}

/// CPU time of a process as copied out by `process_times`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessTimes {
    /// Ticks spent in user mode.
    pub user: u32,
    /// Ticks spent in the kernel on the process's behalf.
    pub system: u32,
}

impl ProcessTimes {
    /// In-memory layout, native endian.
    pub fn to_bytes(self) -> [u8; 8] {
        let mut bytes = [0; 8];
        bytes[..4].copy_from_slice(&self.user.to_ne_bytes());
        bytes[4..].copy_from_slice(&self.system.to_ne_bytes());
        bytes
    }
}

/// How a system call left its caller.
pub(crate) enum Completion {
    /// Finished; the value goes to the result register.
    Done(SysResult<u64>),
    /// The caller blocked and the CPU must move on.
    Blocked,
    /// The caller is gone and another process is already current.
    Exited,
}

impl From<Poll<SysResult<u64>>> for Completion {
    fn from(poll: Poll<SysResult<u64>>) -> Self {
        match poll {
            Poll::Ready(result) => Self::Done(result),
            Poll::Pending => Self::Blocked,
        }
    }
}

/// Register encoding of a call result.
pub(crate) fn encode(result: SysResult<u64>) -> u64 {
    match result {
        Ok(value) => value,
        Err(error) => error.code() as u64,
    }
}

impl<'h, H: Hal> Kernel<'h, H> {
    /// Handle a system call trap from the current process.
    ///
    /// # Registers
    /// * `REG_CALL` - call number
    /// * `REG_ARGS` - up to three arguments
    /// * `REG_RESULT` - result, written when the call completes
    pub(crate) fn system_call(&mut self) {
        let caller = self.current_pid();
        let number = self.hal.read_register(REG_CALL);
        let args = REG_ARGS.map(|register| self.hal.read_register(register));

        let completion = match Syscall::try_from(number) {
            Ok(call) => {
                trace!("process {} calls {:?} {:x?}", caller, call, args);
                self.invoke(call, args)
            }
            Err(error) => {
                warn!("process {} made unknown system call {}", caller, number);
                Completion::Done(Err(error))
            }
        };

        match completion {
            Completion::Done(result) => self.hal.write_register(REG_RESULT, encode(result)),
            Completion::Blocked => self.dispatch(Some(caller)),
            Completion::Exited => {}
        }
    }

    fn invoke(&mut self, call: Syscall, [first, second, _]: [u64; 3]) -> Completion {
        match call {
            Syscall::CreateProcess => self.sys_create_process(first),
            Syscall::TerminateProcess => {
                self.terminate_current();
                Completion::Exited
            }
            Syscall::Write => self.sys_write(first, second),
            Syscall::GetPid => Completion::Done(Ok(self.current_pid().index() as u64)),
            Syscall::Sleep => self
                .sleep(u32::try_from(first).unwrap_or(u32::MAX))
                .into(),
            Syscall::ProcessTimes => self.sys_process_times(first),
            Syscall::CreateMutex => match self.read_mutex_name(first) {
                Ok(name) => self.create_mutex(name, second).into(),
                Err(_) => Completion::Exited,
            },
            Syscall::OpenMutex => match self.read_mutex_name(first) {
                Ok(name) => Completion::Done(self.open_mutex(name)),
                Err(_) => Completion::Exited,
            },
            Syscall::Lock => self.lock_mutex(first).into(),
            Syscall::Unlock => Completion::Done(self.unlock_mutex(first)),
            Syscall::CloseMutex => Completion::Done(self.close_mutex(first)),
            Syscall::ReadChar => self.read_char().into(),
        }
    }

    /// Re-run a call the current process blocked in.
    pub(crate) fn resume(&mut self, call: PendingCall) -> Poll<SysResult<u64>> {
        trace!("process {} resumes {:?}", self.current_pid(), call);
        match call {
            PendingCall::Sleep => Poll::Ready(Ok(0)),
            PendingCall::ReadChar => self.read_char(),
            PendingCall::CreateMutex { name, kind } => self.try_create_mutex(name, kind),
            PendingCall::Lock { handle } => self.resume_lock(handle),
        }
    }

    fn sys_create_process(&mut self, name_addr: u64) -> Completion {
        let mut buf = [0; MAX_PROGRAM_NAME + 1];
        let Ok(name) = self.read_user_str(name_addr, &mut buf) else {
            return Completion::Exited;
        };
        let result = name
            .and_then(|bytes| core::str::from_utf8(bytes).ok())
            .ok_or(SyscallError::ProgramNotFound)
            .and_then(|program| self.create_process(program))
            .map(|pid| pid.index() as u64);
        Completion::Done(result)
    }

    /// Copy `len` bytes at `addr` to the console.
    fn sys_write(&mut self, addr: u64, len: u64) -> Completion {
        let mut chunk = [0; WRITE_CHUNK];
        let mut done = 0;
        while done < len {
            let size = (len - done).min(WRITE_CHUNK as u64) as usize;
            let at = addr.wrapping_add(done);
            let copied = self.with_user_access(|hal| hal.read_user(at, &mut chunk[..size]));
            if copied.is_err() {
                return Completion::Exited;
            }
            self.hal.write_bytes(&chunk[..size]);
            done += size as u64;
        }
        Completion::Done(Ok(0))
    }

    /// Block the caller for `seconds` whole seconds.
    pub(crate) fn sleep(&mut self, seconds: u32) -> Poll<SysResult<u64>> {
        let caller = self.current_pid();
        {
            let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
            let pcb = &mut self.procs[caller];
            pcb.sleep_start = self.ticks;
            pcb.sleep_secs = seconds;
        }
        self.block_current(WaitFlags::SLEEP, PendingCall::Sleep);
        Poll::Pending
    }

    /// Total ticks since boot; fills `times_addr` with the caller's CPU
    /// time when it is not null.
    fn sys_process_times(&mut self, times_addr: u64) -> Completion {
        let caller = self.current_pid();
        if times_addr != 0 {
            let pcb = &self.procs[caller];
            let times = ProcessTimes {
                user: u32::try_from(pcb.user_ticks).unwrap_or(u32::MAX),
                system: u32::try_from(pcb.system_ticks).unwrap_or(u32::MAX),
            };
            let bytes = times.to_bytes();
            if self
                .with_user_access(|hal| hal.write_user(times_addr, &bytes))
                .is_err()
            {
                return Completion::Exited;
            }
        }
        Completion::Done(Ok(self.ticks))
    }

    /// Next buffered keystroke, blocking while the buffer is empty.
    pub(crate) fn read_char(&mut self) -> Poll<SysResult<u64>> {
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Terminal);
        match self.input.pop() {
            Some(byte) => Poll::Ready(Ok(u64::from(byte))),
            None => {
                self.block_current(WaitFlags::READ, PendingCall::ReadChar);
                Poll::Pending
            }
        }
    }
}
