//! Terminal input buffer
//!
//! Keystrokes arrive from the terminal interrupt and wait here until a
//! process reads them. When the buffer is full new keystrokes are dropped.

use crate::config::TERMINAL_BUFFER;

/// Bounded FIFO of input bytes.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    bytes: [u8; TERMINAL_BUFFER],
    len: usize,
}

impl InputBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; TERMINAL_BUFFER],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == TERMINAL_BUFFER
    }

    /// Append a byte. Returns false, leaving the buffer untouched, when full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.bytes[self.len] = byte;
        self.len += 1;
        true
    }

    /// Remove the oldest byte.
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.bytes[0];
        self.bytes.copy_within(1..self.len, 0);
        self.len -= 1;
        Some(byte)
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}
