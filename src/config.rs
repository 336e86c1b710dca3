//! Build-time kernel configuration
//!
//! Every capacity in the kernel is fixed here. Tables are plain arrays sized
//! by these constants, so the core never allocates.

/// Number of process control blocks in the process table.
pub const MAX_PROC: usize = 8;

/// Number of mutex descriptors in the system-wide mutex table.
pub const NUM_MUT: usize = 16;

/// Maximum number of mutex handles a single process may hold open.
pub const NUM_MUT_PROC: usize = 4;

/// Maximum length of a mutex name in bytes, terminator excluded.
pub const MAX_MUTEX_NAME: usize = 8;

/// Capacity of the terminal input buffer in bytes.
pub const TERMINAL_BUFFER: usize = 8;

/// Clock ticks a process may run before it is preempted.
pub const TICKS_PER_SLICE: u32 = 10;

/// Clock interrupts per second.
pub const TICKS_PER_SECOND: u32 = 100;

/// Size of the stack handed to every new process.
pub const STACK_SIZE: usize = 32 * 1024;

/// Longest program name accepted by process creation.
pub const MAX_PROGRAM_NAME: usize = 64;

/// Program loaded as the first process at boot.
pub const INIT_PROGRAM: &str = "init";

/// Device port the terminal controller delivers keystrokes on.
pub const TERMINAL_PORT: u16 = 0x60;

/// Bytes copied from user memory per console write.
pub const WRITE_CHUNK: usize = 64;

/// Register holding the system call number on entry.
pub const REG_CALL: usize = 0;

/// Register receiving the system call result.
pub const REG_RESULT: usize = 0;

/// Registers holding the first, second and third call arguments.
pub const REG_ARGS: [usize; 3] = [1, 2, 3];
