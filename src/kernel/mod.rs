//! Kernel state
//!
//! [`Kernel`] owns every table the core manages: the process table, the
//! ready and blocked queues, the mutex table and the terminal input buffer.
//! It borrows the HAL for its whole lifetime.
//!
//! # Boot Sequence
//! 1. Route every interrupt vector to the kernel
//! 2. Program the interrupt controller, clock and keyboard
//! 3. Load the initial program
//! 4. Dispatch it

mod sched;

use log::info;

use crate::config::{INIT_PROGRAM, STACK_SIZE, TICKS_PER_SECOND};
use crate::drivers::terminal::InputBuffer;
use crate::hal::{Hal, Interrupt, IrqGuard, IrqLevel};
use crate::mutex::{MutexDescriptor, MutexId, MutexTable};
use crate::proc::{Pcb, Pid, PidQueue, ProcessState, ProcessTable};
use crate::syscall::{SysResult, SyscallError};

/// The dispatching core of the kernel.
pub struct Kernel<'h, H: Hal> {
    pub(crate) hal: &'h H,
    pub(crate) procs: ProcessTable<H>,
    pub(crate) ready: PidQueue,
    pub(crate) blocked: PidQueue,
    pub(crate) current: Option<Pid>,
    pub(crate) ticks: u64,
    /// Process the pending software interrupt was raised for.
    pub(crate) soft_target: Option<Pid>,
    pub(crate) mutexes: MutexTable,
    pub(crate) input: InputBuffer,
    /// Set while the kernel copies to or from user memory.
    pub(crate) user_access: bool,
}

impl<'h, H: Hal> Kernel<'h, H> {
    pub fn new(hal: &'h H) -> Self {
        Self {
            hal,
            procs: ProcessTable::new(),
            ready: PidQueue::new(),
            blocked: PidQueue::new(),
            current: None,
            ticks: 0,
            soft_target: None,
            mutexes: MutexTable::new(),
            input: InputBuffer::new(),
            user_access: false,
        }
    }

    /// Bring the machine up and hand the CPU to the initial process.
    ///
    /// Panics through the HAL if the initial program cannot be loaded.
    pub fn boot(&mut self) {
        for vector in Interrupt::ALL {
            self.hal.route(vector);
        }
        self.hal.init_interrupt_controller();
        self.hal.init_clock(TICKS_PER_SECOND);
        self.hal.init_keyboard();
        info!("interrupts routed, clock at {} Hz", TICKS_PER_SECOND);

        if self.create_process(INIT_PROGRAM).is_err() {
            self.hal.panic("initial process not found");
        }
        self.dispatch(None);
    }

    /// Load `program` into a free slot and queue it as ready.
    ///
    /// # Returns
    /// * `Ok(Pid)` - Identifier of the new process
    /// * `Err(ProcessTableFull)` - Every slot is in use
    /// * `Err(ProgramNotFound)` - The HAL could not build the image
    pub fn create_process(&mut self, program: &str) -> SysResult<Pid> {
        let pid = self
            .procs
            .find_free()
            .ok_or(SyscallError::ProcessTableFull)?;
        let (image, entry) = self
            .hal
            .create_image(program)
            .ok_or(SyscallError::ProgramNotFound)?;
        let stack = self.hal.create_stack(STACK_SIZE);
        let context = self.hal.init_context(&image, &stack, STACK_SIZE, entry);

        let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
        self.procs[pid].activate(context, image, stack);
        self.ready.push_back(pid);
        info!("process {} created from {:?}", pid, program);
        Ok(pid)
    }

    /// End the current process and switch to the next one.
    ///
    /// Closes its mutex handles, releases its image and stack and returns
    /// the slot to the free pool.
    pub(crate) fn terminate_current(&mut self) {
        let pid = self.current_pid();
        self.close_all_mutexes(pid);

        {
            let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
            let pcb = &mut self.procs[pid];
            if let Some(image) = pcb.image.take() {
                self.hal.release_image(image);
            }
            pcb.state = ProcessState::Terminated;
            pcb.pending = None;
            self.ready.remove(pid);
            if self.soft_target == Some(pid) {
                self.soft_target = None;
            }
        }
        self.current = None;
        info!("process {} finished", pid);

        let next = self.schedule();
        let pcb = &mut self.procs[pid];
        if let Some(stack) = pcb.stack.take() {
            self.hal.release_stack(stack);
        }
        pcb.state = ProcessState::Unused;
        self.switch_to(None, next);
    }

    pub(crate) fn current_pid(&self) -> Pid {
        match self.current {
            Some(pid) => pid,
            None => self.hal.panic("no current process"),
        }
    }

    /// Process that owns the CPU.
    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    /// Clock ticks since boot.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn process(&self, pid: Pid) -> &Pcb<H> {
        &self.procs[pid]
    }

    pub fn processes(&self) -> impl Iterator<Item = &Pcb<H>> {
        self.procs.iter()
    }

    /// Ready queue from head to tail. The running process is at the head.
    pub fn ready_pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.ready.iter()
    }

    pub fn blocked_pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.blocked.iter()
    }

    pub fn mutex(&self, id: MutexId) -> &MutexDescriptor {
        &self.mutexes[id]
    }

    /// Bytes waiting in the terminal input buffer.
    pub fn input_len(&self) -> usize {
        self.input.len()
    }
}
