//! Scripted HAL for host tests.
//!
//! Interrupts delivered through `halt` come from a queue the test fills
//! ahead of time. User memory is a sparse byte map; anything not mapped
//! faults.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use super::{Console, Hal, Interrupt, IrqLevel, UserFault};
use crate::config::{MAX_PROC, REG_ARGS, REG_CALL, REG_RESULT};
use crate::kernel::Kernel;
use crate::proc::ProcessState;
use crate::syscall::Syscall;

/// Saved state of a mock process: just the entry point it started at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockContext {
    pub entry: u64,
}

#[derive(Debug)]
pub struct MockImage {
    pub entry: u64,
}

#[derive(Debug)]
pub struct MockStack {
    pub size: usize,
}

pub struct MockHal {
    level: Cell<IrqLevel>,
    user_mode: Cell<bool>,
    pending: RefCell<VecDeque<Interrupt>>,
    soft_requests: Cell<usize>,
    registers: RefCell<[u64; 8]>,
    keys: RefCell<VecDeque<u8>>,
    memory: RefCell<HashMap<u64, u8>>,
    programs: RefCell<HashMap<String, u64>>,
    images: Cell<isize>,
    stacks: Cell<isize>,
    switches: RefCell<Vec<(Option<u64>, u64)>>,
    console: RefCell<Vec<u8>>,
    routed: RefCell<Vec<Interrupt>>,
    clock_hz: Cell<u32>,
}

impl MockHal {
    pub fn new() -> Self {
        Self {
            level: Cell::new(IrqLevel::Open),
            user_mode: Cell::new(true),
            pending: RefCell::new(VecDeque::new()),
            soft_requests: Cell::new(0),
            registers: RefCell::new([0; 8]),
            keys: RefCell::new(VecDeque::new()),
            memory: RefCell::new(HashMap::new()),
            programs: RefCell::new(HashMap::new()),
            images: Cell::new(0),
            stacks: Cell::new(0),
            switches: RefCell::new(Vec::new()),
            console: RefCell::new(Vec::new()),
            routed: RefCell::new(Vec::new()),
            clock_hz: Cell::new(0),
        }
    }

    /// HAL that knows `programs`, each with a distinct entry point.
    pub fn with_programs(programs: &[&str]) -> Self {
        let hal = Self::new();
        for (index, name) in programs.iter().enumerate() {
            hal.programs
                .borrow_mut()
                .insert(name.to_string(), 0x1000 * (index as u64 + 1));
        }
        hal
    }

    pub fn entry_of(&self, program: &str) -> u64 {
        self.programs.borrow()[program]
    }

    pub fn push_interrupt(&self, vector: Interrupt) {
        self.pending.borrow_mut().push_back(vector);
    }

    pub fn push_interrupts(&self, vector: Interrupt, count: usize) {
        for _ in 0..count {
            self.push_interrupt(vector);
        }
    }

    pub fn pending_interrupts(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn push_key(&self, byte: u8) {
        self.keys.borrow_mut().push_back(byte);
    }

    pub fn set_user_mode(&self, user: bool) {
        self.user_mode.set(user);
    }

    /// Consume one outstanding software interrupt request.
    pub fn take_soft_request(&self) -> bool {
        let requests = self.soft_requests.get();
        if requests == 0 {
            return false;
        }
        self.soft_requests.set(requests - 1);
        true
    }

    pub fn set_call(&self, call: Syscall, args: [u64; 3]) {
        let mut registers = self.registers.borrow_mut();
        registers[REG_CALL] = call as u64;
        for (slot, value) in REG_ARGS.iter().zip(args) {
            registers[*slot] = value;
        }
    }

    pub fn set_raw_call(&self, number: u64) {
        self.registers.borrow_mut()[REG_CALL] = number;
    }

    pub fn result(&self) -> i64 {
        self.registers.borrow()[REG_RESULT] as i64
    }

    /// Map `len` zeroed bytes of user memory at `addr`.
    pub fn map(&self, addr: u64, len: usize) {
        let mut memory = self.memory.borrow_mut();
        for offset in 0..len as u64 {
            memory.insert(addr + offset, 0);
        }
    }

    /// Store `bytes` in user memory at `addr`.
    pub fn poke(&self, addr: u64, bytes: &[u8]) {
        let mut memory = self.memory.borrow_mut();
        for (offset, byte) in bytes.iter().enumerate() {
            memory.insert(addr + offset as u64, *byte);
        }
    }

    /// Store a NUL-terminated string in user memory at `addr`.
    pub fn poke_str(&self, addr: u64, text: &str) {
        self.poke(addr, text.as_bytes());
        self.poke(addr + text.len() as u64, &[0]);
    }

    pub fn peek(&self, addr: u64, len: usize) -> Vec<u8> {
        let memory = self.memory.borrow();
        (0..len as u64).map(|offset| memory[&(addr + offset)]).collect()
    }

    pub fn console_output(&self) -> Vec<u8> {
        self.console.borrow().clone()
    }

    pub fn switches(&self) -> Vec<(Option<u64>, u64)> {
        self.switches.borrow().clone()
    }

    pub fn live_images(&self) -> isize {
        self.images.get()
    }

    pub fn live_stacks(&self) -> isize {
        self.stacks.get()
    }

    pub fn routed(&self) -> Vec<Interrupt> {
        self.routed.borrow().clone()
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz.get()
    }
}

impl Console for MockHal {
    fn write_bytes(&self, bytes: &[u8]) {
        self.console.borrow_mut().extend_from_slice(bytes);
    }
}

impl Hal for MockHal {
    type Context = MockContext;
    type Image = MockImage;
    type Stack = MockStack;

    fn route(&self, vector: Interrupt) {
        self.routed.borrow_mut().push(vector);
    }

    fn init_interrupt_controller(&self) {}

    fn init_clock(&self, ticks_per_second: u32) {
        self.clock_hz.set(ticks_per_second);
    }

    fn init_keyboard(&self) {}

    fn level(&self) -> IrqLevel {
        self.level.get()
    }

    fn set_level(&self, level: IrqLevel) -> IrqLevel {
        self.level.replace(level)
    }

    fn halt(&self) -> Interrupt {
        let vector = self
            .pending
            .borrow_mut()
            .pop_front()
            .expect("halted with no interrupt scripted");
        assert!(
            !self.level.get().masks(vector),
            "{:?} delivered while masked at {:?}",
            vector,
            self.level.get()
        );
        vector
    }

    fn raise_software_interrupt(&self) {
        self.soft_requests.set(self.soft_requests.get() + 1);
    }

    fn from_user_mode(&self) -> bool {
        self.user_mode.get()
    }

    fn switch_context(&self, from: Option<&mut MockContext>, to: &MockContext) {
        let saved = from.map(|context| context.entry);
        self.switches.borrow_mut().push((saved, to.entry));
    }

    fn init_context(
        &self,
        image: &MockImage,
        stack: &MockStack,
        stack_size: usize,
        entry: u64,
    ) -> MockContext {
        assert_eq!(image.entry, entry);
        assert_eq!(stack.size, stack_size);
        MockContext { entry }
    }

    fn read_register(&self, index: usize) -> u64 {
        self.registers.borrow()[index]
    }

    fn write_register(&self, index: usize, value: u64) {
        self.registers.borrow_mut()[index] = value;
    }

    fn read_port(&self, _port: u16) -> u8 {
        self.keys.borrow_mut().pop_front().unwrap_or(0)
    }

    fn read_user(&self, addr: u64, buf: &mut [u8]) -> Result<(), UserFault> {
        let memory = self.memory.borrow();
        for (offset, byte) in buf.iter_mut().enumerate() {
            let at = addr + offset as u64;
            *byte = *memory.get(&at).ok_or(UserFault { addr: at })?;
        }
        Ok(())
    }

    fn write_user(&self, addr: u64, bytes: &[u8]) -> Result<(), UserFault> {
        let mut memory = self.memory.borrow_mut();
        for offset in 0..bytes.len() as u64 {
            if !memory.contains_key(&(addr + offset)) {
                return Err(UserFault {
                    addr: addr + offset,
                });
            }
        }
        for (offset, byte) in bytes.iter().enumerate() {
            memory.insert(addr + offset as u64, *byte);
        }
        Ok(())
    }

    fn create_image(&self, program: &str) -> Option<(MockImage, u64)> {
        let entry = *self.programs.borrow().get(program)?;
        self.images.set(self.images.get() + 1);
        Some((MockImage { entry }, entry))
    }

    fn release_image(&self, _image: MockImage) {
        self.images.set(self.images.get() - 1);
    }

    fn create_stack(&self, size: usize) -> MockStack {
        self.stacks.set(self.stacks.get() + 1);
        MockStack { size }
    }

    fn release_stack(&self, _stack: MockStack) {
        self.stacks.set(self.stacks.get() - 1);
    }

    fn panic(&self, message: &str) -> ! {
        panic!("kernel panic: {}", message)
    }
}

/// Deliver one clock tick, followed by the software interrupt it requested.
pub fn tick(kernel: &mut Kernel<'_, MockHal>, hal: &MockHal) {
    kernel.handle_interrupt(Interrupt::Clock);
    if hal.take_soft_request() {
        kernel.handle_interrupt(Interrupt::Software);
    }
    assert_consistent(kernel);
}

/// Issue a system call from the current process and return register 0.
pub fn syscall(
    kernel: &mut Kernel<'_, MockHal>,
    hal: &MockHal,
    call: Syscall,
    args: [u64; 3],
) -> i64 {
    hal.set_call(call, args);
    kernel.handle_interrupt(Interrupt::Syscall);
    assert_consistent(kernel);
    hal.result()
}

/// Check the queue and state invariants that must hold between handlers.
pub fn assert_consistent<H: Hal>(kernel: &Kernel<'_, H>) {
    let ready: Vec<_> = kernel.ready_pids().collect();
    let blocked: Vec<_> = kernel.blocked_pids().collect();
    assert!(ready.len() <= MAX_PROC && blocked.len() <= MAX_PROC);

    for pid in ready.iter().chain(blocked.iter()) {
        let in_ready = ready.iter().filter(|p| *p == pid).count();
        let in_blocked = blocked.iter().filter(|p| *p == pid).count();
        assert_eq!(in_ready + in_blocked, 1, "process {} queued twice", pid);
    }

    for pcb in kernel.processes() {
        let pid = pcb.id();
        match pcb.state() {
            ProcessState::Ready => {
                assert!(ready.contains(&pid) && !blocked.contains(&pid));
                assert_ne!(kernel.current(), Some(pid));
            }
            ProcessState::Running => {
                assert_eq!(kernel.current(), Some(pid));
                assert_eq!(ready.first(), Some(&pid));
            }
            ProcessState::Blocked => {
                assert!(blocked.contains(&pid) && !ready.contains(&pid));
                assert!(!pcb.wait().is_empty());
            }
            ProcessState::Unused | ProcessState::Terminated => {
                assert!(!ready.contains(&pid) && !blocked.contains(&pid));
            }
        }
    }
}
