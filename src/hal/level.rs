//! Interrupt priority levels and scoped masking

use super::{Hal, Interrupt};

/// Interrupt mask levels, ordered from least to most restrictive.
///
/// Running at a level holds off every maskable source at or below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum IrqLevel {
    /// Nothing masked.
    Open = 0,
    /// Software interrupts masked.
    Software = 1,
    /// Terminal and software interrupts masked.
    Terminal = 2,
    /// Every maskable source masked.
    Clock = 3,
}

impl IrqLevel {
    /// Whether `vector` is held off at this level.
    ///
    /// Exceptions and system calls are synchronous and never masked.
    pub const fn masks(self, vector: Interrupt) -> bool {
        let needed = match vector {
            Interrupt::Software => IrqLevel::Software,
            Interrupt::Terminal => IrqLevel::Terminal,
            Interrupt::Clock => IrqLevel::Clock,
            _ => return false,
        };
        self as u8 >= needed as u8
    }
}

/// Exclusion region over kernel tables.
///
/// Holding a guard keeps the interrupt level at or above the level it was
/// created with. The previous level comes back when the guard drops, on
/// every exit path.
#[must_use = "the previous level is restored as soon as the guard drops"]
pub struct IrqGuard<'h, H: Hal + ?Sized> {
    hal: &'h H,
    restore: Option<IrqLevel>,
}

impl<'h, H: Hal + ?Sized> IrqGuard<'h, H> {
    /// Raise the level to at least `level`. Never lowers it.
    pub fn raise(hal: &'h H, level: IrqLevel) -> Self {
        let restore = if level > hal.level() {
            Some(hal.set_level(level))
        } else {
            None
        };
        Self { hal, restore }
    }

    /// Drop the level to `level` for an idle wait.
    pub fn lower(hal: &'h H, level: IrqLevel) -> Self {
        let previous = hal.set_level(level);
        Self {
            hal,
            restore: Some(previous),
        }
    }
}

impl<H: Hal + ?Sized> Drop for IrqGuard<'_, H> {
    fn drop(&mut self) {
        if let Some(level) = self.restore {
            self.hal.set_level(level);
        }
    }
}
