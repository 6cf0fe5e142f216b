use std::{
    io::Result,
    os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
};

use crate::cutils::cerr;

/// Create a pipe, returning its `(read, write)` ends.
///
/// Both ends are close-on-exec; `dup2` clears that flag on the copies that become a process'
/// stdin or stdout, so only those survive an `exec`.
pub(crate) fn pipe() -> Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [-1; 2];
    cerr(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) })?;

    // SAFETY: `pipe2` succeeded, so both descriptors are open and owned by nobody else.
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

/// Make `target` refer to the same open file as `fd`, closing whatever `target` referred to.
pub(crate) fn dup2<F: AsRawFd>(fd: &F, target: RawFd) -> Result<()> {
    cerr(unsafe { libc::dup2(fd.as_raw_fd(), target) })?;
    Ok(())
}

/// Duplicate `fd` into a new close-on-exec descriptor.
pub(crate) fn dup_cloexec(fd: RawFd) -> Result<OwnedFd> {
    let new_fd = cerr(unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 0) })?;

    // SAFETY: `fcntl` succeeded, so `new_fd` is a fresh open descriptor.
    Ok(unsafe { OwnedFd::from_raw_fd(new_fd) })
}
