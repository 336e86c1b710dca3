//! Hardware Abstraction Layer boundary
//!
//! The kernel core never touches hardware directly. Everything it needs from
//! the machine (interrupt masking, context switching, device ports, user
//! memory, program images) goes through the [`Hal`] trait, which a platform
//! crate implements and a mock implements for host tests.
//!
//! # Execution model
//!
//! The HAL delivers every interrupt and exception by calling
//! [`Kernel::handle_interrupt`](crate::Kernel::handle_interrupt). Handlers run
//! to completion. A context switch does not transfer control inside the
//! handler: [`Hal::switch_context`] saves the interrupted state into `from`
//! and arranges for the trap exit to resume `to`.

mod level;
#[cfg(test)]
pub(crate) mod mock;

pub use level::{IrqGuard, IrqLevel};

/// Interrupt and exception vectors serviced by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Interrupt {
    /// Division by zero or arithmetic overflow.
    ArithmeticFault = 0,
    /// Access to an unmapped or protected address.
    MemoryFault = 1,
    /// Periodic clock tick.
    Clock = 2,
    /// A keystroke is waiting on the terminal port.
    Terminal = 3,
    /// A process trapped into the kernel.
    Syscall = 4,
    /// Deferred preemption request raised by the clock handler.
    Software = 5,
}

impl Interrupt {
    /// Every vector, in routing order.
    pub const ALL: [Interrupt; 6] = [
        Interrupt::ArithmeticFault,
        Interrupt::MemoryFault,
        Interrupt::Clock,
        Interrupt::Terminal,
        Interrupt::Syscall,
        Interrupt::Software,
    ];
}

/// A user-memory copy touched an address the process cannot access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserFault {
    /// First inaccessible address.
    pub addr: u64,
}

/// Byte sink used for program output and kernel logging.
pub trait Console {
    /// Write raw bytes to the console device.
    fn write_bytes(&self, bytes: &[u8]);
}

/// Machine services required by the kernel core.
///
/// All methods take `&self`; implementations use interior mutability for
/// device state so that the kernel can hold the HAL reference while it
/// mutates its own tables.
pub trait Hal: Console {
    /// Saved register state of a process.
    type Context: Default;
    /// Loaded program image.
    type Image;
    /// Process stack allocation.
    type Stack;

    /// Install the kernel entry point for `vector`.
    fn route(&self, vector: Interrupt);
    /// Program the interrupt controller.
    fn init_interrupt_controller(&self);
    /// Start the periodic clock at `ticks_per_second`.
    fn init_clock(&self, ticks_per_second: u32);
    /// Enable keyboard interrupts.
    fn init_keyboard(&self);

    /// Current interrupt mask level.
    fn level(&self) -> IrqLevel;
    /// Set the interrupt mask level, returning the previous one.
    fn set_level(&self, level: IrqLevel) -> IrqLevel;
    /// Wait with interrupts unmasked at the current level and report the
    /// vector that ended the wait.
    fn halt(&self) -> Interrupt;
    /// Request a software interrupt, delivered once the level allows it.
    fn raise_software_interrupt(&self);
    /// Whether the interrupted code was running in user mode.
    fn from_user_mode(&self) -> bool;

    /// Save the interrupted state into `from` (when present) and resume `to`
    /// on trap exit.
    fn switch_context(&self, from: Option<&mut Self::Context>, to: &Self::Context);
    /// Build the initial context of a process starting at `entry`.
    fn init_context(
        &self,
        image: &Self::Image,
        stack: &Self::Stack,
        stack_size: usize,
        entry: u64,
    ) -> Self::Context;

    /// Read a register of the interrupted context.
    fn read_register(&self, index: usize) -> u64;
    /// Write a register of the interrupted context.
    fn write_register(&self, index: usize, value: u64);
    /// Read one byte from a device port.
    fn read_port(&self, port: u16) -> u8;

    /// Copy `buf.len()` bytes from user address `addr`.
    fn read_user(&self, addr: u64, buf: &mut [u8]) -> Result<(), UserFault>;
    /// Copy `bytes` to user address `addr`.
    fn write_user(&self, addr: u64, bytes: &[u8]) -> Result<(), UserFault>;

    /// Load `program`, returning the image and its entry point.
    fn create_image(&self, program: &str) -> Option<(Self::Image, u64)>;
    /// Unload a program image.
    fn release_image(&self, image: Self::Image);
    /// Allocate a stack of `size` bytes.
    fn create_stack(&self, size: usize) -> Self::Stack;
    /// Free a stack.
    fn release_stack(&self, stack: Self::Stack);

    /// Halt the machine after an unrecoverable kernel error.
    fn panic(&self, message: &str) -> !;
}
