//! System call error codes

use core::fmt;

/// Failure of a system call, returned to the caller as a negative code.
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// The call number is not in the call table.
    NoSuchCall = -1,
    /// No free process slot.
    ProcessTableFull = -2,
    /// The program image could not be loaded.
    ProgramNotFound = -3,
    /// The caller already holds the maximum number of mutex handles.
    MutexLimit = -4,
    /// Mutex name longer than the configured maximum.
    NameTooLong = -5,
    /// A mutex with this name already exists.
    NameExists = -6,
    /// No free handle slot in the caller.
    NoDescriptor = -7,
    /// No mutex with this name exists.
    MutexNotFound = -8,
    /// The handle is out of range or not open.
    BadHandle = -9,
    /// Unlock by a process that does not own the mutex.
    NotOwner = -10,
    /// Relock of a non-recursive mutex by its owner.
    WouldDeadlock = -11,
    /// An argument is outside its accepted range.
    InvalidArgument = -12,
}

impl SyscallError {
    /// Numeric code written to the result register.
    pub const fn code(self) -> i64 {
        self as i64
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchCall => write!(f, "no such system call"),
            Self::ProcessTableFull => write!(f, "process table full"),
            Self::ProgramNotFound => write!(f, "program not found"),
            Self::MutexLimit => write!(f, "too many open mutexes"),
            Self::NameTooLong => write!(f, "mutex name too long"),
            Self::NameExists => write!(f, "mutex name already in use"),
            Self::NoDescriptor => write!(f, "no free mutex handle"),
            Self::MutexNotFound => write!(f, "mutex not found"),
            Self::BadHandle => write!(f, "bad mutex handle"),
            Self::NotOwner => write!(f, "mutex not owned by caller"),
            Self::WouldDeadlock => write!(f, "non-recursive mutex already held by caller"),
            Self::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

/// Result of a system call body.
pub type SysResult<T> = Result<T, SyscallError>;
