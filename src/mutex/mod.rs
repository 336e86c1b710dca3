//! Named mutexes
//!
//! Mutexes live in a system-wide table of descriptors and are reached from
//! a process through small per-process handles, much like file descriptors.
//!
//! # Semantics
//! - Names are unique among live mutexes
//! - A non-recursive mutex relocked by its owner fails instead of deadlocking
//! - Unlocking hands ownership straight to the longest waiter
//! - The descriptor is freed when its last handle closes, waking one
//!   process waiting for table space

mod descriptor;
mod ops;
mod table;

pub use descriptor::{MutexDescriptor, MutexHandle, MutexId, MutexKind, MutexName};
pub use table::MutexTable;
