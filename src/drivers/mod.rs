//! Device-facing pieces of the kernel
//!
//! - `console`: kernel log backend and print macros over the HAL console
//! - `terminal`: keystroke buffer fed by the terminal interrupt

pub mod console;
pub mod terminal;
