//! Minikernel - dispatching core of a single-CPU preemptible kernel
//!
//! The platform delivers every interrupt, exception and system call trap to
//! [`Kernel::handle_interrupt`]. The kernel updates its tables and, when the
//! CPU should move to another process, asks the HAL to switch context.
//!
//! # Subsystems
//! - Process table with FIFO ready and blocked queues
//! - Round-robin scheduling driven by the clock through a deferred software
//!   interrupt
//! - Named mutexes, recursive and non-recursive
//! - Blocking terminal input
//!
//! # Concurrency
//! One CPU, no threads. Interrupt levels are the only exclusion mechanism:
//! every table update runs under an [`IrqGuard`] that masks the handlers
//! touching the same data and restores the previous level when dropped.
//!
//! # Architecture
//! ```text
//!   HAL vector ──► Kernel::handle_interrupt ──► handler ──► queues / tables
//!                                                   │
//!                                                   └──► schedule ──► Hal::switch_context
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod drivers;
pub mod exception;
pub mod hal;
pub mod kernel;
pub mod mutex;
pub mod proc;
pub mod syscall;

pub use hal::{Console, Hal, Interrupt, IrqGuard, IrqLevel, UserFault};
pub use kernel::Kernel;
pub use proc::{Pid, ProcessState};
pub use syscall::{SysResult, Syscall, SyscallError};
