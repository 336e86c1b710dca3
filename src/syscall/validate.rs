//! User Memory Access
//!
//! Every copy between the kernel and a process's memory goes through the
//! HAL with the user-access flag set. A copy that faults is charged to the
//! calling process, which is terminated; the kernel itself keeps running.
//!
//! # Contract
//! - The flag is raised for exactly one copy and cleared afterwards, even
//!   when the copy fails
//! - On failure the caller is already gone when these helpers return `Err`

use log::warn;

use crate::config::MAX_MUTEX_NAME;
use crate::hal::{Hal, IrqGuard, IrqLevel, UserFault};
use crate::kernel::Kernel;
use crate::mutex::MutexName;

use super::error::{SysResult, SyscallError};

impl<'h, H: Hal> Kernel<'h, H> {
    /// Run one user-memory copy with the user-access flag raised.
    pub(crate) fn with_user_access<T>(
        &mut self,
        copy: impl FnOnce(&H) -> Result<T, UserFault>,
    ) -> Result<T, UserFault> {
        self.set_user_access(true);
        let result = copy(self.hal);
        if let Err(fault) = &result {
            warn!("bad user address {:#x}", fault.addr);
            self.memory_fault();
        }
        self.set_user_access(false);
        result
    }

    fn set_user_access(&mut self, enabled: bool) {
        let _irq = IrqGuard::raise(self.hal, IrqLevel::Clock);
        self.user_access = enabled;
    }

    /// Copy the NUL-terminated string at `addr` into `buf`.
    ///
    /// # Returns
    /// * `Ok(Some(bytes))` - The string, terminator excluded
    /// * `Ok(None)` - No terminator within `buf.len()` bytes
    /// * `Err(UserFault)` - The string ran into unmapped memory
    pub(crate) fn read_user_str<'b>(
        &mut self,
        addr: u64,
        buf: &'b mut [u8],
    ) -> Result<Option<&'b [u8]>, UserFault> {
        let len = self.with_user_access(|hal| {
            for index in 0..buf.len() {
                let at = addr.wrapping_add(index as u64);
                hal.read_user(at, &mut buf[index..=index])?;
                if buf[index] == 0 {
                    return Ok(Some(index));
                }
            }
            Ok(None)
        })?;
        let buf: &'b [u8] = buf;
        Ok(len.map(move |len| &buf[..len]))
    }

    /// Read a mutex name argument. An unterminated or oversized name is
    /// reported as [`SyscallError::NameTooLong`].
    pub(crate) fn read_mutex_name(&mut self, addr: u64) -> Result<SysResult<MutexName>, UserFault> {
        let mut buf = [0; MAX_MUTEX_NAME + 1];
        Ok(match self.read_user_str(addr, &mut buf)? {
            Some(bytes) => MutexName::new(bytes),
            None => Err(SyscallError::NameTooLong),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MAX_MUTEX_NAME;
    use crate::hal::mock::MockHal;
    use crate::kernel::Kernel;
    use crate::syscall::SyscallError;

    #[test]
    fn test_read_user_str() {
        let hal = MockHal::with_programs(&["init"]);
        let mut kernel = Kernel::new(&hal);
        kernel.boot();
        hal.poke_str(0x10, "abc");

        let mut buf = [0; 8];
        assert_eq!(kernel.read_user_str(0x10, &mut buf), Ok(Some(&b"abc"[..])));
        let mut short = [0; 3];
        assert_eq!(kernel.read_user_str(0x10, &mut short), Ok(None));
        assert!(!kernel.user_access);
    }

    #[test]
    fn test_mutex_name_limits() {
        let hal = MockHal::with_programs(&["init"]);
        let mut kernel = Kernel::new(&hal);
        kernel.boot();
        hal.poke_str(0x10, &"n".repeat(MAX_MUTEX_NAME));
        hal.poke_str(0x40, &"n".repeat(MAX_MUTEX_NAME + 1));

        let fits = kernel.read_mutex_name(0x10).unwrap().unwrap();
        assert_eq!(fits.as_bytes().len(), MAX_MUTEX_NAME);
        assert_eq!(
            kernel.read_mutex_name(0x40),
            Ok(Err(SyscallError::NameTooLong))
        );
    }
}
