//! Control of the external metrics monitor.
//!
//! The shell talks to the monitor with real-time signals: a status request is a
//! [`request_signal`] carrying [`GET_STATUS`], and the monitor answers with a [`response_signal`]
//! whose payload packs four one-byte metrics.
use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::{
    common::Error,
    log::{dev_info, dev_warn},
    system::{
        interface::ProcessId,
        kill, sigqueue,
        signal::{consts::SIGTERM, SignalHandler, SignalHandlerBehavior, SignalLatch, SignalNumber},
    },
};

pub(crate) mod config;

/// Payload of a status request.
pub(crate) const GET_STATUS: u32 = 1;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// The signal the shell sends to ask the monitor for its status.
pub(crate) fn request_signal() -> SignalNumber {
    libc::SIGRTMIN()
}

/// The signal the monitor answers with.
pub(crate) fn response_signal() -> SignalNumber {
    libc::SIGRTMIN() + 1
}

/// The metrics reported by the monitor, each one byte wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MonitorStatus {
    pub cpu: u8,
    pub ram: u8,
    pub disk_read: u8,
    pub disk_write: u8,
}

impl MonitorStatus {
    /// Unpack a response payload, least significant byte first.
    pub(crate) fn from_payload(payload: u32) -> Self {
        let [cpu, ram, disk_read, disk_write] = payload.to_le_bytes();
        Self {
            cpu,
            ram,
            disk_read,
            disk_write,
        }
    }

    /// The packing a monitor uses to answer.
    #[cfg(test)]
    pub(crate) fn to_payload(self) -> u32 {
        u32::from_le_bytes([self.cpu, self.ram, self.disk_read, self.disk_write])
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CPU: {}%\nRAM: {}%\nDisk read: {}\nDisk write: {}",
            self.cpu, self.ram, self.disk_read, self.disk_write
        )
    }
}

/// Outcome of a status query that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusReply {
    NotRunning,
    TimedOut,
    Status(MonitorStatus),
}

/// The monitor started by this shell, if any.
#[derive(Debug, Default)]
pub(crate) struct MonitorSession {
    pid: Option<ProcessId>,
}

impl MonitorSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn started(&mut self, pid: ProcessId) {
        dev_info!("monitor session started with pid {pid}");
        self.pid = Some(pid);
    }

    pub(crate) fn clear(&mut self) {
        if let Some(pid) = self.pid.take() {
            dev_info!("monitor session {pid} cleared");
        }
    }

    pub(crate) fn pid(&self) -> Option<ProcessId> {
        self.pid
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self) -> bool {
        self.pid.is_some()
    }

    /// Ask the monitor to terminate and forget about it. Returns the pid it had, if any.
    pub(crate) fn stop(&mut self) -> Result<Option<ProcessId>, Error> {
        let Some(pid) = self.pid else {
            return Ok(None);
        };

        match kill(pid, SIGTERM) {
            Ok(()) => {}
            // already gone
            Err(err) if err.raw_os_error() == Some(libc::ESRCH) => {
                dev_warn!("monitor {pid} was not running anymore");
            }
            Err(err) => {
                return Err(Error::Monitor(format!("cannot stop process {pid}: {err}")));
            }
        }
        self.clear();

        Ok(Some(pid))
    }

    /// Request the status of the monitor and wait at most `timeout` for the answer.
    ///
    /// The latching handler for the response signal only lives for the duration of the query;
    /// it is restored on every return path.
    pub(crate) fn query_status(&mut self, timeout: Duration) -> Result<StatusReply, Error> {
        let Some(monitor) = self.pid else {
            return Ok(StatusReply::NotRunning);
        };

        let latch = SignalLatch::global();
        latch.clear();
        let handler = SignalHandler::register(response_signal(), SignalHandlerBehavior::Latch)
            .map_err(|err| Error::Monitor(format!("cannot subscribe to the response: {err}")))?;

        if let Err(err) = sigqueue(monitor, request_signal(), GET_STATUS) {
            drop(handler);
            if err.raw_os_error() == Some(libc::ESRCH) {
                self.clear();
            }
            return Err(Error::Monitor(format!(
                "cannot send the status request to process {monitor}: {err}"
            )));
        }
        dev_info!("status requested from monitor {monitor}");

        let reply = await_response(latch, monitor, timeout);

        drop(handler);
        latch.clear();

        Ok(reply)
    }
}

fn await_response(latch: &SignalLatch, monitor: ProcessId, timeout: Duration) -> StatusReply {
    let start = Instant::now();
    loop {
        if let Some(latched) = latch.take() {
            if latched.signal == response_signal() && latched.sender == monitor {
                return StatusReply::Status(MonitorStatus::from_payload(latched.payload));
            }
            dev_warn!(
                "ignoring signal {} from process {}",
                latched.signal,
                latched.sender
            );
        }

        if start.elapsed() >= timeout {
            return StatusReply::TimedOut;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
