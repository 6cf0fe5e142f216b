use core::fmt;
use std::{io, ops};

use crate::cutils::*;
use interface::ProcessId;

use self::signal::SignalNumber;

pub mod file;
// generalized traits for when we want to hide implementations
pub mod interface;

pub mod signal;

pub mod wait;

pub(crate) fn _exit(status: libc::c_int) -> ! {
    unsafe { libc::_exit(status) }
}

pub(crate) enum ForkResult {
    // Parent process branch with the child process' PID.
    Parent(ProcessId),
    // Child process branch.
    Child,
}

unsafe fn inner_fork() -> io::Result<ForkResult> {
    let pid = cerr(unsafe { libc::fork() })?;
    if pid == 0 {
        Ok(ForkResult::Child)
    } else {
        Ok(ForkResult::Parent(ProcessId::new(pid)))
    }
}

#[cfg(target_os = "linux")]
/// Create a new process.
pub(crate) fn fork() -> io::Result<ForkResult> {
    // SAFETY: `fork` is implemented using `clone` in linux so we don't need to worry about signal
    // safety.
    unsafe { inner_fork() }
}

#[cfg(not(target_os = "linux"))]
/// Create a new process.
///
/// # Safety
///
/// In a multithreaded program, only async-signal-safe functions are guaranteed to work in the
/// child process until a call to `execve` or a similar function is done.
pub(crate) unsafe fn fork() -> io::Result<ForkResult> {
    inner_fork()
}

/// Get the PID of the current process.
#[cfg(test)]
pub(crate) fn getpid() -> ProcessId {
    ProcessId::new(unsafe { libc::getpid() })
}

/// Send a signal to a process with the specified ID.
pub fn kill(pid: ProcessId, signal: SignalNumber) -> io::Result<()> {
    // SAFETY: This function cannot cause UB even if `pid` is not a valid process ID or if
    // `signal` is not a valid signal code.
    cerr(unsafe { libc::kill(pid.get(), signal) }).map(|_| ())
}

/// Queue a signal carrying an integer payload to a process with the specified ID.
///
/// The receiver finds the payload in `si_value.sival_int` of its `siginfo_t`.
pub fn sigqueue(pid: ProcessId, signal: SignalNumber, payload: u32) -> io::Result<()> {
    let value = sigval_from_int(payload);
    // SAFETY: This function cannot cause UB even if `pid` is not a valid process ID or if
    // `signal` is not a valid signal code.
    cerr(unsafe { libc::sigqueue(pid.get(), signal, value) }).map(|_| ())
}

// `sigval` is a union of an int and a pointer, and libc only exposes the pointer member. The int
// overlaps the first bytes of the pointer: its low bits on little-endian targets, its high bits
// on big-endian ones.
const SIVAL_INT_SHIFT: u32 = if cfg!(target_endian = "big") {
    usize::BITS - libc::c_int::BITS
} else {
    0
};

/// Build a `sigval` whose `sival_int` member is `payload`.
pub(crate) fn sigval_from_int(payload: u32) -> libc::sigval {
    libc::sigval {
        sival_ptr: ((payload as usize) << SIVAL_INT_SHIFT) as *mut libc::c_void,
    }
}

/// Read the `sival_int` member of `value`.
pub(crate) fn sigval_to_int(value: libc::sigval) -> u32 {
    ((value.sival_ptr as usize) >> SIVAL_INT_SHIFT) as u32
}

pub(crate) fn make_zeroed_sigaction() -> libc::sigaction {
    // SAFETY: since sigaction is a C struct, all-zeroes is a valid representation
    unsafe { std::mem::zeroed() }
}

#[derive(Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Hostname {
    inner: String,
}

impl fmt::Debug for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hostname").field(&self.inner).finish()
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl ops::Deref for Hostname {
    type Target = str;

    fn deref(&self) -> &str {
        &self.inner
    }
}

impl Hostname {
    #[cfg(test)]
    pub fn fake(hostname: &str) -> Self {
        Self {
            inner: hostname.to_string(),
        }
    }

    pub fn resolve() -> io::Result<Self> {
        // see `man 2 gethostname`
        const MAX_HOST_NAME_SIZE_ACCORDING_TO_SUSV2: libc::c_long = 255;

        // POSIX.1 systems limit hostnames to `HOST_NAME_MAX` bytes
        // not including null-byte in the count
        let max_hostname_size = sysconf(libc::_SC_HOST_NAME_MAX)
            .unwrap_or(MAX_HOST_NAME_SIZE_ACCORDING_TO_SUSV2)
            as usize;

        let buffer_size = max_hostname_size + 1 /* null byte delimiter */ ;
        let mut buf = vec![0; buffer_size];

        cerr(unsafe { libc::gethostname(buf.as_mut_ptr(), buffer_size) })?;

        Ok(Self {
            inner: unsafe { string_from_ptr(buf.as_ptr()) },
        })
    }
}
