//! Process model
//!
//! Fixed-size process table, per-process control blocks and the FIFO pid
//! queues used for the ready and blocked lists.

mod pcb;
mod queue;
mod table;

pub use pcb::{Pcb, PendingCall, Pid, ProcessState, WaitFlags};
pub use queue::PidQueue;
pub use table::ProcessTable;
