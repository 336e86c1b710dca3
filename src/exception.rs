//! Interrupt and Exception Handling
//!
//! Single entry point for every vector the HAL delivers, and the handlers
//! behind it.
//!
//! # Vectors
//! - Arithmetic and memory faults: fatal to the faulting process, fatal to
//!   the machine when raised by kernel code
//! - Clock: CPU accounting, slice expiry, sleeper wakeups
//! - Terminal: buffers one keystroke and wakes one reader
//! - Syscall: see [`crate::syscall`]
//! - Software: deferred preemption requested by the clock

use log::{trace, warn};

use crate::config::TERMINAL_PORT;
use crate::hal::{Hal, Interrupt, IrqGuard, IrqLevel};
use crate::kernel::Kernel;
use crate::proc::{ProcessState, WaitFlags};

impl<'h, H: Hal> Kernel<'h, H> {
    /// Service `vector`. Called by the HAL for every interrupt and trap.
    pub fn handle_interrupt(&mut self, vector: Interrupt) {
        match vector {
            Interrupt::ArithmeticFault => self.arithmetic_fault(),
            Interrupt::MemoryFault => self.memory_fault(),
            Interrupt::Clock => self.clock_tick(),
            Interrupt::Terminal => self.terminal_input(),
            Interrupt::Syscall => self.system_call(),
            Interrupt::Software => self.software_interrupt(),
        }
    }

    fn arithmetic_fault(&mut self) {
        if !self.hal.from_user_mode() {
            self.hal.panic("arithmetic exception in kernel mode");
        }
        warn!("process {} raised an arithmetic exception", self.current_pid());
        self.terminate_current();
    }

    /// Also reached when a user-memory copy fails, with `user_access` set.
    pub(crate) fn memory_fault(&mut self) {
        if !self.user_access && !self.hal.from_user_mode() {
            self.hal.panic("memory exception in kernel mode");
        }
        warn!("process {} raised a memory exception", self.current_pid());
        self.terminate_current();
    }

    pub(crate) fn clock_tick(&mut self) {
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
        if let Some(pid) = self.current {
            let user = self.hal.from_user_mode();
            let pcb = &mut self.procs[pid];
            if user {
                pcb.user_ticks += 1;
            } else {
                pcb.system_ticks += 1;
            }
            if pcb.slice_left <= 1 {
                self.soft_target = Some(pid);
                self.hal.raise_software_interrupt();
            } else {
                pcb.slice_left -= 1;
            }
        }
        self.ticks += 1;
        trace!("tick {}", self.ticks);
        self.wake_sleepers();
    }

    pub(crate) fn terminal_input(&mut self) {
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Terminal);
        let byte = self.hal.read_port(TERMINAL_PORT);
        if !self.input.push(byte) {
            trace!("input buffer full, dropped {:#04x}", byte);
            return;
        }
        trace!("buffered {:#04x}", byte);
        self.wake_first(WaitFlags::READ);
    }

    /// Rotate the current process to the tail of the ready queue if its
    /// slice ran out.
    ///
    /// The request is stale when the process it was raised for has since
    /// blocked or finished.
    fn software_interrupt(&mut self) {
        let target = self.soft_target.take();
        let Some(pid) = self.current.filter(|current| target == Some(*current)) else {
            trace!("stale preemption request for {:?}", target);
            return;
        };
        {
            let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
            self.ready.remove(pid);
            self.ready.push_back(pid);
            self.procs[pid].state = ProcessState::Ready;
        }
        self.dispatch(Some(pid));
    }
}
