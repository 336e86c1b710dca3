//! System Call Interface
//!
//! A process traps with the call number in register 0 and up to three
//! arguments in registers 1-3. The result goes back in register 0:
//! non-negative on success, a negative [`SyscallError`] code on failure.
//!
//! # Call Table
//! - 0: create_process(program) - start a new process, returns its pid
//! - 1: terminate_process() - end the caller, never returns
//! - 2: write(buf, len) - copy bytes to the console
//! - 3: get_pid() - pid of the caller
//! - 4: sleep(seconds) - block for whole seconds
//! - 5: process_times(times) - tick counters, optionally filling `times`
//! - 6: create_mutex(name, kind) - create and open a named mutex
//! - 7: open_mutex(name) - open an existing mutex
//! - 8: lock(handle)
//! - 9: unlock(handle)
//! - 10: close_mutex(handle)
//! - 11: read_char() - next terminal byte, blocking while none is buffered
//!
//! Unknown numbers fail with [`SyscallError::NoSuchCall`].

mod error;
mod handler;
mod validate;

pub use error::{SysResult, SyscallError};
pub use handler::{ProcessTimes, Syscall};

pub(crate) use handler::encode;
