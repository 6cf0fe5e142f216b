use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use crate::system::interface::ProcessId;

use super::{info::SignalInfo, SignalNumber};

static LATCH: SignalLatch = SignalLatch::new();

/// What the last latched signal carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Latched {
    pub signal: SignalNumber,
    pub sender: ProcessId,
    pub payload: u32,
}

/// A single-slot mailbox filled by [`super::SignalHandlerBehavior::Latch`] handlers.
///
/// The signal handler is the only writer of the slot and raises the flag last with release
/// ordering; the reader takes the flag with acquire ordering before reading the slot.
pub(crate) struct SignalLatch {
    raised: AtomicBool,
    signal: AtomicI32,
    sender: AtomicI32,
    payload: AtomicU32,
}

impl SignalLatch {
    const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
            signal: AtomicI32::new(0),
            sender: AtomicI32::new(0),
            payload: AtomicU32::new(0),
        }
    }

    /// The process-wide latch written by every latching handler.
    pub(crate) fn global() -> &'static Self {
        &LATCH
    }

    fn raise(&self, info: &SignalInfo) {
        self.signal.store(info.signal(), Ordering::Relaxed);
        self.sender.store(info.pid().get(), Ordering::Relaxed);
        self.payload.store(info.payload(), Ordering::Relaxed);
        self.raised.store(true, Ordering::Release);
    }

    /// Lower the flag, discarding whatever was latched.
    pub(crate) fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }

    /// Lower the flag and return what was latched, if the flag was raised.
    pub(crate) fn take(&self) -> Option<Latched> {
        if !self.raised.swap(false, Ordering::AcqRel) {
            return None;
        }

        Some(Latched {
            signal: self.signal.load(Ordering::Relaxed),
            sender: ProcessId::new(self.sender.load(Ordering::Relaxed)),
            payload: self.payload.load(Ordering::Relaxed),
        })
    }
}

// Only async-signal-safe operations are allowed here: plain atomic stores.
pub(super) extern "C" fn latch_siginfo(
    _signal: SignalNumber,
    info: *const SignalInfo,
    _context: *const libc::c_void,
) {
    // SAFETY: the kernel passes a valid `siginfo_t` to `SA_SIGINFO` handlers.
    if let Some(info) = unsafe { info.as_ref() } {
        LATCH.raise(info);
    }
}
