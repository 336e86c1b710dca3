//! Round-robin scheduler
//!
//! The ready queue is strict FIFO and the running process stays at its
//! head. Preemption rotates the head to the tail; blocking moves it to the
//! blocked queue. Every transition happens with the clock masked.

use core::task::Poll;

use log::{debug, trace};

use crate::config::{REG_RESULT, TICKS_PER_SLICE};
use crate::hal::{Hal, Interrupt, IrqGuard, IrqLevel};
use crate::proc::{PendingCall, Pid, ProcessState, WaitFlags};
use crate::syscall::encode;

use super::Kernel;

impl<'h, H: Hal> Kernel<'h, H> {
    /// Pick the next process to run, idling until one is ready.
    ///
    /// The pick is the head of the ready queue; it is not removed. Its
    /// time slice is refilled.
    pub(crate) fn schedule(&mut self) -> Pid {
        loop {
            {
                let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
                if let Some(pid) = self.ready.front() {
                    self.procs[pid].slice_left = TICKS_PER_SLICE;
                    return pid;
                }
            }
            self.idle();
        }
    }

    /// Wait for an interrupt with everything but software interrupts open,
    /// then service it.
    fn idle(&mut self) {
        let vector = {
            let _idle = IrqGuard::lower(self.hal, IrqLevel::Software);
            self.hal.halt()
        };
        match vector {
            Interrupt::Clock => self.clock_tick(),
            Interrupt::Terminal => self.terminal_input(),
            other => trace!("idle wakeup by {:?} ignored", other),
        }
    }

    /// Leave `outgoing` (if any) for the scheduler's pick.
    pub(crate) fn dispatch(&mut self, outgoing: Option<Pid>) {
        let next = self.schedule();
        self.switch_to(outgoing, next);
    }

    /// Make `next` current and finish any call it blocked in.
    ///
    /// A resumed call may block again, in which case the scheduler picks
    /// another process and the loop continues from there.
    pub(crate) fn switch_to(&mut self, mut outgoing: Option<Pid>, mut next: Pid) {
        loop {
            self.enter(outgoing, next);
            let Some(call) = self.procs[next].pending.take() else {
                return;
            };
            match self.resume(call) {
                Poll::Ready(result) => {
                    self.hal.write_register(REG_RESULT, encode(result));
                    return;
                }
                Poll::Pending => {
                    outgoing = Some(next);
                    next = self.schedule();
                }
            }
        }
    }

    fn enter(&mut self, outgoing: Option<Pid>, next: Pid) {
        self.current = Some(next);
        self.procs[next].state = ProcessState::Running;
        match outgoing {
            // preempted and picked again: the saved state is already live
            Some(prev) if prev == next => {}
            Some(prev) => {
                let (from, to) = self.procs.pair_mut(prev, next);
                self.hal.switch_context(Some(&mut from.context), &to.context);
            }
            None => self.hal.switch_context(None, &self.procs[next].context),
        }
        debug!("switch {:?} -> {}", outgoing, next);
    }

    /// Park the current process in the blocked queue until it is woken.
    ///
    /// `call` is re-run when the process is next dispatched.
    pub(crate) fn block_current(&mut self, reason: WaitFlags, call: PendingCall) {
        let pid = self.current_pid();
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
        let pcb = &mut self.procs[pid];
        pcb.state = ProcessState::Blocked;
        pcb.wait = reason;
        pcb.pending = Some(call);
        self.ready.remove(pid);
        self.blocked.push_back(pid);
        self.current = None;
        debug!("process {} blocked ({:?})", pid, reason);
    }

    /// Move a blocked process to the tail of the ready queue.
    pub(crate) fn wake(&mut self, pid: Pid) {
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
        if !self.blocked.remove(pid) {
            return;
        }
        let pcb = &mut self.procs[pid];
        pcb.state = ProcessState::Ready;
        pcb.wait = WaitFlags::empty();
        self.ready.push_back(pid);
        debug!("process {} ready", pid);
    }

    /// Wake the first blocked process waiting for `reason`.
    pub(crate) fn wake_first(&mut self, reason: WaitFlags) -> Option<Pid> {
        let procs = &self.procs;
        let pid = self
            .blocked
            .iter()
            .find(|pid| procs[*pid].wait.contains(reason))?;
        self.wake(pid);
        Some(pid)
    }

    /// Wake every sleeper whose deadline has passed, in blocked-queue order.
    pub(crate) fn wake_sleepers(&mut self) {
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
        let now = self.ticks;
        loop {
            let procs = &self.procs;
            let Some(pid) = self.blocked.iter().find(|pid| procs[*pid].sleep_due(now)) else {
                break;
            };
            self.wake(pid);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{MAX_PROC, TICKS_PER_SECOND, TICKS_PER_SLICE};
    use crate::hal::mock::{assert_consistent, syscall, tick, MockHal};
    use crate::hal::{Hal, Interrupt, IrqLevel};
    use crate::kernel::Kernel;
    use crate::proc::{Pid, ProcessState, WaitFlags};
    use crate::syscall::Syscall;

    fn pid(index: usize) -> Pid {
        Pid::new(index).unwrap()
    }

    fn booted(hal: &MockHal, extra: usize) -> Kernel<'_, MockHal> {
        let mut kernel = Kernel::new(hal);
        kernel.boot();
        for _ in 0..extra {
            kernel.create_process("worker").unwrap();
        }
        kernel
    }

    #[test]
    fn test_round_robin_order() {
        let hal = MockHal::with_programs(&["init", "worker"]);
        let mut kernel = booted(&hal, 2);

        let mut order = Vec::new();
        for _ in 0..6 {
            order.push(kernel.current().unwrap().index());
            for _ in 0..TICKS_PER_SLICE {
                tick(&mut kernel, &hal);
            }
        }
        assert_eq!(order, [0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_slice_runs_full_length() {
        let hal = MockHal::with_programs(&["init", "worker"]);
        let mut kernel = booted(&hal, 1);

        for _ in 0..TICKS_PER_SLICE - 1 {
            tick(&mut kernel, &hal);
            assert_eq!(kernel.current(), Some(pid(0)));
        }
        tick(&mut kernel, &hal);
        assert_eq!(kernel.current(), Some(pid(1)));
        assert_eq!(kernel.process(pid(1)).slice_left(), TICKS_PER_SLICE);
        assert_eq!(kernel.ready_pids().collect::<Vec<_>>(), [pid(1), pid(0)]);
    }

    #[test]
    fn test_lone_process_keeps_cpu_without_switch() {
        let hal = MockHal::with_programs(&["init"]);
        let mut kernel = booted(&hal, 0);

        for _ in 0..TICKS_PER_SLICE * 3 {
            tick(&mut kernel, &hal);
        }
        assert_eq!(kernel.current(), Some(pid(0)));
        assert_eq!(hal.switches().len(), 1);
    }

    #[test]
    fn test_sleep_wakes_at_deadline_not_before() {
        let hal = MockHal::with_programs(&["init", "worker"]);
        let mut kernel = booted(&hal, 1);

        syscall(&mut kernel, &hal, Syscall::Sleep, [1, 0, 0]);
        assert_eq!(kernel.process(pid(0)).state(), ProcessState::Blocked);
        assert_eq!(kernel.current(), Some(pid(1)));

        for _ in 0..TICKS_PER_SECOND - 1 {
            tick(&mut kernel, &hal);
            assert_eq!(kernel.process(pid(0)).state(), ProcessState::Blocked);
        }
        tick(&mut kernel, &hal);
        assert_ne!(kernel.process(pid(0)).state(), ProcessState::Blocked);
        assert!(kernel.ready_pids().any(|ready| ready == pid(0)));
    }

    #[test]
    fn test_sleep_zero_wakes_on_next_tick() {
        let hal = MockHal::with_programs(&["init", "worker"]);
        let mut kernel = booted(&hal, 1);

        syscall(&mut kernel, &hal, Syscall::Sleep, [0; 3]);
        assert_eq!(kernel.process(pid(0)).wait(), WaitFlags::SLEEP);
        tick(&mut kernel, &hal);
        assert_eq!(kernel.process(pid(0)).state(), ProcessState::Ready);
    }

    #[test]
    fn test_sleep_with_nothing_else_idles_then_returns_zero() {
        let hal = MockHal::with_programs(&["init"]);
        let mut kernel = booted(&hal, 0);

        hal.push_interrupts(Interrupt::Clock, TICKS_PER_SECOND as usize);
        let result = syscall(&mut kernel, &hal, Syscall::Sleep, [1, 0, 0]);

        assert_eq!(result, 0);
        assert_eq!(hal.pending_interrupts(), 0);
        assert_eq!(kernel.ticks(), u64::from(TICKS_PER_SECOND));
        assert_eq!(kernel.current(), Some(pid(0)));
        assert_eq!(hal.level(), IrqLevel::Open);
    }

    #[test]
    fn test_sleepers_wake_in_blocked_order() {
        let hal = MockHal::with_programs(&["init", "worker"]);
        let mut kernel = booted(&hal, MAX_PROC - 1);

        // three processes sleep for the same second, the last one keeps running
        for _ in 0..MAX_PROC - 1 {
            syscall(&mut kernel, &hal, Syscall::Sleep, [1, 0, 0]);
        }
        let sleepers: Vec<_> = kernel.blocked_pids().collect();
        for _ in 0..TICKS_PER_SECOND {
            tick(&mut kernel, &hal);
        }
        assert_eq!(kernel.blocked_pids().count(), 0);
        let woken: Vec<_> = kernel
            .ready_pids()
            .filter(|ready| sleepers.contains(ready))
            .collect();
        assert_eq!(woken, sleepers);
    }

    #[test]
    fn test_idle_services_terminal_and_ignores_others() {
        let hal = MockHal::with_programs(&["init"]);
        let mut kernel = booted(&hal, 0);

        hal.push_interrupt(Interrupt::Syscall);
        hal.push_key(b'x');
        hal.push_interrupt(Interrupt::Terminal);
        let result = syscall(&mut kernel, &hal, Syscall::ReadChar, [0; 3]);

        assert_eq!(result, i64::from(b'x'));
        assert_eq!(kernel.input_len(), 0);
        assert_consistent(&kernel);
    }

    #[test]
    fn test_ticks_credited_by_mode() {
        let hal = MockHal::with_programs(&["init"]);
        let mut kernel = booted(&hal, 0);

        tick(&mut kernel, &hal);
        hal.set_user_mode(false);
        tick(&mut kernel, &hal);
        tick(&mut kernel, &hal);

        let init = kernel.process(pid(0));
        assert_eq!(init.user_ticks(), 1);
        assert_eq!(init.system_ticks(), 2);
        assert_eq!(kernel.ticks(), 3);
    }
}
