//! Kernel console output
//!
//! Routes the `log` facade and the `kprint!`/`kprintln!` macros to the
//! console the platform registers at boot. Until a console is registered
//! all output is discarded.

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};
use spin::{Mutex, Once};

use crate::hal::Console;

static CONSOLE: Once<&'static (dyn Console + Sync)> = Once::new();

/// Held while a line is written so that lines from different callers do
/// not interleave. A handler that interrupts a writer on this CPU finds it
/// taken and writes unlocked, since spinning would never return.
static OUTPUT: Mutex<()> = Mutex::new(());

static LOGGER: KernelLogger = KernelLogger;

struct ConsoleWriter<'a>(&'a dyn Console);

impl Write for ConsoleWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut lines = s.split('\n');
        if let Some(first) = lines.next() {
            self.0.write_bytes(first.as_bytes());
        }
        for line in lines {
            self.0.write_bytes(b"\r\n");
            self.0.write_bytes(line.as_bytes());
        }
        Ok(())
    }
}

/// Register `console` and install the kernel logger at `level`.
///
/// Only the first call has any effect.
pub fn init(console: &'static (dyn Console + Sync), level: LevelFilter) {
    if CONSOLE.is_completed() {
        return;
    }
    CONSOLE.call_once(|| console);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    if let Some(console) = CONSOLE.get() {
        let _line = OUTPUT.try_lock();
        let _ = ConsoleWriter(*console).write_fmt(args);
    }
}

/// Print to the kernel console.
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {
        $crate::drivers::console::_print(format_args!($($arg)*))
    };
}

/// Print to the kernel console, with a newline.
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::kprint!("\n")
    };
    ($($arg:tt)*) => {
        $crate::kprint!("{}\n", format_args!($($arg)*))
    };
}

struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate::kprintln!("[{:<5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}
