use crate::{
    common::Error,
    log::{dev_info, dev_warn, user_error},
    system::{
        interface::ProcessId,
        wait::{wait_no_hang, wait_retrying, WaitError, WaitStatus},
    },
};

/// The bookkeeping unit for one launched process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Job {
    pub id: u64,
    pub pid: ProcessId,
    pub background: bool,
}

/// Hands out job ids and remembers the background jobs that were not reaped yet.
#[derive(Debug, Default)]
pub(crate) struct JobTracker {
    last_id: u64,
    background: Vec<Job>,
}

impl JobTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a freshly forked child. Background jobs are announced right away as
    /// `[<job_id>] <pid>`.
    pub(crate) fn launch(&mut self, pid: ProcessId, background: bool) -> Job {
        self.last_id += 1;
        let job = Job {
            id: self.last_id,
            pid,
            background,
        };

        if background {
            println_ignore_io_error!("[{}] {}", job.id, job.pid);
            self.background.push(job);
        }
        dev_info!("launched job {} with pid {pid} (background: {background})", job.id);

        job
    }

    /// The background jobs that are still running, as far as the tracker knows.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> &[Job] {
        &self.background
    }

    /// Collect every background job that already exited, without blocking.
    pub(crate) fn reap_finished(&mut self) -> Vec<Job> {
        let mut finished = Vec::new();

        self.background.retain(|job| {
            match wait_no_hang(job.pid) {
                Err(WaitError::NotReady) => true,
                Ok(status) => {
                    dev_info!("job {} ({}) finished: {status:?}", job.id, job.pid);
                    finished.push(*job);
                    false
                }
                // someone else already collected it
                Err(WaitError::Io(err)) => {
                    dev_warn!("cannot reap job {} ({}): {err}", job.id, job.pid);
                    finished.push(*job);
                    false
                }
            }
        });

        finished
    }
}

/// Block until the foreground child `pid` terminates.
pub(crate) fn wait_foreground(pid: ProcessId) -> Result<WaitStatus, Error> {
    let status = wait_retrying(pid).map_err(|err| match err {
        WaitError::Io(err) => Error::Io(None, err),
        WaitError::NotReady => Error::Silent,
    })?;
    dev_info!("foreground child {pid} finished: {status:?}");

    Ok(status)
}

/// The foreground children of a pipeline.
#[derive(Debug, Default)]
pub(crate) struct WaitSet(Vec<ProcessId>);

impl WaitSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, pid: ProcessId) {
        self.0.push(pid)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// Wait for every child in the set. A failure is reported and does not stop the other waits.
    pub(crate) fn wait_all(self) -> usize {
        let mut failures = 0;
        for pid in self.0 {
            if let Err(err) = wait_foreground(pid) {
                user_error!("cannot wait for process {pid}: {err}");
                failures += 1;
            }
        }
        failures
    }
}
