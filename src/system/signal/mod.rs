//! Utilities to handle signals.
use std::borrow::Cow;

mod handler;
mod info;
mod latch;
mod set;

pub(crate) use handler::{SignalHandler, SignalHandlerBehavior};
pub(crate) use latch::SignalLatch;
#[cfg(test)]
pub(crate) use latch::tests::LATCH_TEST_LOCK;

pub(crate) type SignalNumber = libc::c_int;

macro_rules! define_consts {
    ($($signal:ident,)*) => {
        pub(crate) mod consts {
            pub(crate) use libc::{$($signal,)*};
        }

        /// Name of a signal, including the real-time ones relative to `SIGRTMIN`.
        pub(crate) fn signal_name(signal: SignalNumber) -> Cow<'static, str> {
            match signal {
                $(consts::$signal => stringify!($signal).into(),)*
                _ if signal == libc::SIGRTMIN() => "SIGRTMIN".into(),
                _ if signal > libc::SIGRTMIN() && signal <= libc::SIGRTMAX() => {
                    format!("SIGRTMIN+{}", signal - libc::SIGRTMIN()).into()
                }
                _ => format!("unknown signal #{signal}").into(),
            }
        }
    };
}

define_consts! {
    SIGINT,
    SIGQUIT,
    SIGTSTP,
    SIGTERM,
    SIGKILL,
    SIGSTOP,
}
