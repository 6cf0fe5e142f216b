use crate::system::{interface::ProcessId, sigval_to_int};

use super::SignalNumber;

/// Information related to the arrival of a signal.
#[repr(transparent)]
pub(crate) struct SignalInfo {
    info: libc::siginfo_t,
}

impl SignalInfo {
    /// Gets the PID that sent the signal.
    pub(crate) fn pid(&self) -> ProcessId {
        // SAFETY: every signal queued with `sigqueue` or sent with `kill` sets `si_pid`.
        unsafe { ProcessId::new(self.info.si_pid()) }
    }

    /// Gets the signal number.
    pub(crate) fn signal(&self) -> SignalNumber {
        self.info.si_signo
    }

    /// Gets the integer payload attached by `sigqueue`.
    pub(crate) fn payload(&self) -> u32 {
        // SAFETY: `si_value` is always readable; it is zero for signals without a payload.
        sigval_to_int(unsafe { self.info.si_value() })
    }
}
