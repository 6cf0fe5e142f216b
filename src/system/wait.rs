//! Collecting the children the shell forked.
use std::io;

use libc::{c_int, WEXITSTATUS, WIFEXITED, WIFSIGNALED, WNOHANG, WTERMSIG};

use crate::cutils::cerr;
use crate::system::{
    interface::ProcessId,
    signal::{signal_name, SignalNumber},
};

#[derive(Debug)]
pub(crate) enum WaitError {
    /// The child is still running. Only returned by [`wait_no_hang`].
    NotReady,
    Io(io::Error),
}

/// How a child terminated.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaitStatus {
    status: c_int,
}

impl std::fmt::Debug for WaitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.exit_status(), self.term_signal()) {
            (Some(code), _) => write!(f, "ExitStatus({code})"),
            (None, Some(signal)) => write!(f, "TermSignal({})", signal_name(signal)),
            (None, None) => write!(f, "Unknown"),
        }
    }
}

impl WaitStatus {
    /// The code passed to `exit`, if the child exited normally.
    pub(crate) const fn exit_status(&self) -> Option<c_int> {
        if WIFEXITED(self.status) {
            Some(WEXITSTATUS(self.status))
        } else {
            None
        }
    }

    /// The signal that killed the child, if any.
    pub(crate) const fn term_signal(&self) -> Option<SignalNumber> {
        if WIFSIGNALED(self.status) {
            Some(WTERMSIG(self.status))
        } else {
            None
        }
    }
}

fn waitpid(pid: ProcessId, flags: c_int) -> Result<WaitStatus, WaitError> {
    let mut status: c_int = 0;

    let collected = cerr(unsafe { libc::waitpid(pid.get(), &mut status, flags) })
        .map_err(WaitError::Io)?;

    if collected == 0 && flags & WNOHANG != 0 {
        return Err(WaitError::NotReady);
    }

    Ok(WaitStatus { status })
}

/// Collect `pid` if it already terminated, without blocking.
pub(crate) fn wait_no_hang(pid: ProcessId) -> Result<WaitStatus, WaitError> {
    waitpid(pid, WNOHANG)
}

/// Block until `pid` terminates, retrying if the call is interrupted by a signal handler.
pub(crate) fn wait_retrying(pid: ProcessId) -> Result<WaitStatus, WaitError> {
    loop {
        match waitpid(pid, 0) {
            Err(WaitError::Io(err)) if err.kind() == io::ErrorKind::Interrupted => {}
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use pretty_assertions::assert_eq;

    use super::{wait_no_hang, wait_retrying, WaitError};
    use crate::system::{interface::ProcessId, kill, signal::consts::SIGTERM};

    fn spawn_sh(script: &str) -> ProcessId {
        let child = Command::new("sh").args(["-c", script]).spawn().unwrap();
        ProcessId::new(child.id() as i32)
    }

    #[test]
    fn exit_code_is_reported() {
        let pid = spawn_sh("exit 42");

        let status = wait_retrying(pid).unwrap();
        assert_eq!(status.exit_status(), Some(42));
        assert_eq!(status.term_signal(), None);
        assert_eq!(format!("{status:?}"), "ExitStatus(42)");

        // nothing left to collect
        let WaitError::Io(err) = wait_retrying(pid).unwrap_err() else {
            panic!("a blocking wait is never `NotReady`");
        };
        assert_eq!(err.raw_os_error(), Some(libc::ECHILD));
    }

    #[test]
    fn terminating_signal_is_reported() {
        let pid = spawn_sh("sleep 5");
        kill(pid, SIGTERM).unwrap();

        let status = wait_retrying(pid).unwrap();
        assert_eq!(status.term_signal(), Some(SIGTERM));
        assert_eq!(status.exit_status(), None);
        assert_eq!(format!("{status:?}"), "TermSignal(SIGTERM)");
    }

    #[test]
    fn running_child_is_not_ready() {
        let pid = spawn_sh("sleep 0.1; exit 3");

        let mut polls = 0;
        let status = loop {
            match wait_no_hang(pid) {
                Ok(status) => break status,
                Err(WaitError::NotReady) => polls += 1,
                Err(WaitError::Io(err)) => panic!("{err}"),
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };

        assert_eq!(status.exit_status(), Some(3));
        assert!(polls > 0);
    }
}
