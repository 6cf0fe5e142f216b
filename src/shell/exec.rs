//! Turning a parsed pipeline into running processes.
use std::{
    ffi::OsStr,
    fs::{File, OpenOptions},
    io::{self, Write},
    mem,
    os::{
        fd::OwnedFd,
        unix::{fs::OpenOptionsExt, process::CommandExt},
    },
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    common::Error,
    log::{dev_info, dev_warn, user_error},
    system::{
        _exit,
        file::{dup2, dup_cloexec, pipe},
        fork,
        interface::ProcessId,
        signal::{consts::*, SignalHandler, SignalHandlerBehavior, SignalNumber},
        ForkResult,
    },
};

use super::{
    builtin::Builtin,
    jobs::{wait_foreground, WaitSet},
    monitor::{config::ConfigSource, response_signal},
    parser::{Pipeline, Redirections, SingleCommand},
    Shell,
};

const START_MONITOR: &str = "start_monitor";

/// Signals the shell ignores and a foreground child must handle the default way.
pub(crate) const JOB_CONTROL_SIGNALS: &[SignalNumber] = &[SIGINT, SIGQUIT, SIGTSTP, SIGTERM];

/// What a stage turns into once it runs.
#[derive(Debug, PartialEq, Eq)]
enum Dispatch {
    Builtin(Builtin),
    /// The monitor, started with the configuration file at this path.
    StartMonitor(PathBuf),
    External,
}

impl Dispatch {
    /// Decide how `command` runs. For `start_monitor` this writes the configuration file, so a
    /// bad option rejects the command before anything is forked.
    fn prepare(command: &SingleCommand, shell: &Shell) -> Result<Self, Error> {
        if let Some(builtin) = Builtin::lookup(command.name()) {
            return Ok(Dispatch::Builtin(builtin));
        }

        if command.name() == START_MONITOR {
            if let Some(pid) = shell.monitor.pid() {
                return Err(Error::Monitor(format!("already running with pid {pid}")));
            }
            let config = ConfigSource::from_args(command.args())?
                .materialize(&shell.config.monitor_config)?;
            return Ok(Dispatch::StartMonitor(config));
        }

        Ok(Dispatch::External)
    }
}

/// Run every stage of `pipeline`, waiting for its foreground processes.
pub(crate) fn execute(shell: &mut Shell, pipeline: &Pipeline) -> Result<(), Error> {
    match &pipeline.stages[..] {
        [] => Ok(()),
        [command] => run_single(shell, command),
        stages => run_pipeline(shell, stages, pipeline.is_background()),
    }
}

fn run_single(shell: &mut Shell, command: &SingleCommand) -> Result<(), Error> {
    let files = RedirectFiles::open(&command.redirections)?;
    let _restore = if files.is_empty() {
        None
    } else {
        let restore = StdioRestore::save()?;
        files.install()?;
        Some(restore)
    };
    drop(files);

    match Dispatch::prepare(command, shell)? {
        Dispatch::Builtin(builtin) => builtin.run(command, shell),
        Dispatch::StartMonitor(config) => {
            let pid = spawn(|| start_monitor(shell, &config))?;
            shell.monitor.started(pid);
            shell.jobs.launch(pid, true);
            Ok(())
        }
        Dispatch::External => {
            let foreground = !command.background;
            let pid = spawn(|| exec_external(command, foreground))?;
            let job = shell.jobs.launch(pid, command.background);
            if !job.background {
                wait_foreground(pid)?;
            }
            Ok(())
        }
    }
}

fn run_pipeline(shell: &mut Shell, stages: &[SingleCommand], background: bool) -> Result<(), Error> {
    let dispatches = stages
        .iter()
        .map(|command| Dispatch::prepare(command, shell))
        .collect::<Result<Vec<_>, _>>()?;

    let mut pipes = (1..stages.len())
        .map(|_| pipe())
        .collect::<io::Result<Vec<_>>>()
        .map_err(|err| Error::Io(None, err))?;

    let mut wait_set = WaitSet::new();
    for (index, (command, dispatch)) in stages.iter().zip(dispatches).enumerate() {
        let _ = io::stdout().flush();
        let pid = match fork() {
            Ok(ForkResult::Parent(pid)) => pid,
            Ok(ForkResult::Child) => {
                let pipes = mem::take(&mut pipes);
                let status = match run_stage(shell, command, dispatch, index, pipes, background) {
                    Ok(()) => 0,
                    Err(err) => {
                        if !err.is_silent() {
                            user_error!("{err}");
                        }
                        1
                    }
                };
                let _ = io::stdout().flush();
                _exit(status);
            }
            Err(err) => {
                user_error!("cannot start `{}`: {err}", command.name());
                break;
            }
        };

        if let Dispatch::StartMonitor(_) = dispatch {
            shell.monitor.started(pid);
            shell.jobs.launch(pid, true);
            continue;
        }

        let job = shell.jobs.launch(pid, background);
        if !job.background {
            wait_set.push(pid);
        }
    }

    // the parent plays no part in the pipeline
    drop(pipes);

    let launched = wait_set.len();
    let failures = wait_set.wait_all();
    dev_info!("pipeline finished, {failures} of {launched} waits failed");

    Ok(())
}

/// Wire the stage to its neighbours and run it. Only returns if the stage did not `exec`.
fn run_stage(
    shell: &mut Shell,
    command: &SingleCommand,
    dispatch: Dispatch,
    index: usize,
    pipes: Vec<(OwnedFd, OwnedFd)>,
    background: bool,
) -> Result<(), Error> {
    if index > 0 {
        dup2(&pipes[index - 1].0, libc::STDIN_FILENO)?;
    }
    if index < pipes.len() {
        dup2(&pipes[index].1, libc::STDOUT_FILENO)?;
    }
    // close every pipe end this stage does not occupy stdin or stdout with
    drop(pipes);

    RedirectFiles::open(&command.redirections)?.install()?;

    match dispatch {
        // leaving the pipeline is all `quit` can do from here
        Dispatch::Builtin(Builtin::Quit) => Ok(()),
        Dispatch::Builtin(builtin) => builtin.run(command, shell),
        Dispatch::StartMonitor(config) => {
            start_monitor(shell, &config);
            Err(Error::Silent)
        }
        Dispatch::External => {
            exec_external(command, !background);
            Err(Error::Silent)
        }
    }
}

/// Fork a child that runs `child` and exits with its status.
fn spawn(child: impl FnOnce() -> i32) -> Result<ProcessId, Error> {
    // the child must not write out what the parent has buffered
    let _ = io::stdout().flush();

    let ForkResult::Parent(pid) = fork().map_err(|err| {
        dev_warn!("unable to fork: {err}");
        Error::Io(None, err)
    })?
    else {
        let status = child();
        let _ = io::stdout().flush();
        _exit(status);
    };

    Ok(pid)
}

/// Replace the current process with the program named by `command`. Returns the exit status to
/// use if that fails.
fn exec_external(command: &SingleCommand, foreground: bool) -> i32 {
    restore_default_signals(foreground);
    let err = exec_program(command.name(), command.args());
    report_exec_failure(command.name(), &err);
    1
}

fn start_monitor(shell: &Shell, config: &Path) -> i32 {
    // the monitor is stopped with SIGTERM, so it needs the default dispositions back
    restore_default_signals(true);
    let binary = &shell.config.monitor_binary;
    let err = exec_program(binary, [config]);
    report_exec_failure(&binary.to_string_lossy(), &err);
    1
}

fn exec_program<S: AsRef<OsStr>>(
    program: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = S>,
) -> io::Error {
    let mut command = Command::new(program);
    command.args(args);
    dev_info!("executing {command:?}");
    command.exec()
}

fn report_exec_failure(program: &str, err: &io::Error) {
    if err.kind() == io::ErrorKind::NotFound {
        user_error!("{program}: command not found");
    } else {
        user_error!("{program}: {err}");
    }
}

/// Undo the dispositions the shell set up for itself, in a child about to `exec`.
fn restore_default_signals(job_control: bool) {
    let mut signals = vec![response_signal()];
    if job_control {
        signals.extend_from_slice(JOB_CONTROL_SIGNALS);
    }

    for signal in signals {
        match SignalHandler::register(signal, SignalHandlerBehavior::Default) {
            Ok(handler) => handler.forget(),
            Err(err) => dev_warn!("cannot reset signal {signal}: {err}"),
        }
    }
}

/// The files a command reads from and writes to instead of stdin and stdout.
struct RedirectFiles {
    input: Option<File>,
    output: Option<File>,
}

impl RedirectFiles {
    fn open(redirections: &Redirections) -> Result<Self, Error> {
        let input = match &redirections.input {
            Some(path) => {
                Some(File::open(path).map_err(|err| Error::Redirect(path.clone(), err))?)
            }
            None => None,
        };
        let output = match &redirections.output {
            Some(path) => Some(
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .mode(0o644)
                    .open(path)
                    .map_err(|err| Error::Redirect(path.clone(), err))?,
            ),
            None => None,
        };

        Ok(Self { input, output })
    }

    fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none()
    }

    /// Make the files the stdin and stdout of this process.
    fn install(&self) -> Result<(), Error> {
        if let Some(input) = &self.input {
            dup2(input, libc::STDIN_FILENO)?;
        }
        if let Some(output) = &self.output {
            let _ = io::stdout().flush();
            dup2(output, libc::STDOUT_FILENO)?;
        }
        Ok(())
    }
}

/// Copies of the original stdin and stdout, put back in place on drop.
struct StdioRestore {
    stdin: OwnedFd,
    stdout: OwnedFd,
}

impl StdioRestore {
    fn save() -> Result<Self, Error> {
        Ok(Self {
            stdin: dup_cloexec(libc::STDIN_FILENO)?,
            stdout: dup_cloexec(libc::STDOUT_FILENO)?,
        })
    }
}

impl Drop for StdioRestore {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        if let Err(err) = dup2(&self.stdin, libc::STDIN_FILENO) {
            dev_warn!("cannot restore stdin: {err}");
        }
        if let Err(err) = dup2(&self.stdout, libc::STDOUT_FILENO) {
            dev_warn!("cannot restore stdout: {err}");
        }
    }
}
