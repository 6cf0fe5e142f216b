use std::{
    env,
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

use crate::{
    common::Error,
    log::{dev_info, dev_warn, user_error, ShellLogger},
    system::{
        signal::{SignalHandler, SignalHandlerBehavior},
        Hostname,
    },
};

use self::{
    builtin::WorkingDirectory,
    cli::ShellAction,
    exec::JOB_CONTROL_SIGNALS,
    input::{render_prompt, LineSource},
    jobs::JobTracker,
    monitor::{config::delete_owned_config, response_signal, MonitorSession},
    parser::parse_line,
};

mod builtin;
mod cli;
mod exec;
mod explore;
mod input;
mod jobs;
mod monitor;
pub(crate) mod parser;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long `status_monitor` waits for the monitor to answer.
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Settings of a shell session.
#[derive(Debug, Clone)]
pub(crate) struct ShellConfig {
    /// The monitor program, looked up in `PATH` when it is a bare name.
    pub monitor_binary: PathBuf,
    /// Where `start_monitor` writes the configuration it generates.
    pub monitor_config: PathBuf,
    pub status_timeout: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            monitor_binary: PathBuf::from(env!("MSHELL_MONITOR_BIN")),
            monitor_config: PathBuf::from(env!("MSHELL_MONITOR_CONFIG")),
            status_timeout: STATUS_TIMEOUT,
        }
    }
}

pub(crate) struct Shell {
    config: ShellConfig,
    cwd: WorkingDirectory,
    hostname: Option<Hostname>,
    jobs: JobTracker,
    monitor: MonitorSession,
}

impl Shell {
    pub(crate) fn new(config: ShellConfig) -> Result<Self, Error> {
        let cwd = WorkingDirectory::from_process()
            .map_err(|err| Error::Fatal(format!("cannot determine the current directory: {err}")))?;

        Ok(Self {
            config,
            cwd,
            hostname: Hostname::resolve().ok(),
            jobs: JobTracker::new(),
            monitor: MonitorSession::new(),
        })
    }

    /// Parse and run one command line.
    pub(crate) fn execute(&mut self, line: &str) -> Result<(), Error> {
        let Some(pipeline) = parse_line(line)? else {
            return Ok(());
        };

        exec::execute(self, &pipeline)
    }

    /// Announce the background jobs that finished since the last prompt.
    pub(crate) fn reap_background(&mut self) {
        for job in self.jobs.reap_finished() {
            println_ignore_io_error!("[{}] Done {}", job.id, job.pid);
            if self.monitor.pid() == Some(job.pid) {
                self.monitor.clear();
            }
        }
    }

    fn prompt(&self) -> String {
        let user = env::var("USER").ok();
        render_prompt(user.as_deref(), self.hostname.as_ref(), self.cwd.current())
    }

    /// Leave the shell. Children that are still running are left alone.
    pub(crate) fn quit(&mut self) -> ! {
        self.shut_down();
        std::process::exit(0)
    }

    /// Everything `quit` does before the process exits.
    fn shut_down(&mut self) {
        self.reap_background();
        if let Err(err) = delete_owned_config(&self.config.monitor_config) {
            dev_warn!(
                "cannot remove {}: {err}",
                self.config.monitor_config.display()
            );
        }

        let _ = io::stdout().flush();
    }

    /// Read and execute command lines until the input ends or `quit` is run.
    fn run(&mut self, mut source: LineSource) -> Result<(), Error> {
        let _signal_handlers = ignore_shell_signals()?;

        loop {
            self.reap_background();

            let line = match source.next_line(|| self.prompt()) {
                Ok(Some(line)) => line,
                Ok(None) => self.quit(),
                Err(err) => return Err(Error::Fatal(format!("cannot read input: {err}"))),
            };

            if let Err(err) = self.execute(&line) {
                if err.is_fatal() {
                    return Err(err);
                }
                if !err.is_silent() {
                    user_error!("{err}");
                }
            }
        }
    }
}

// The shell itself survives ^C and friends; foreground children get them back. A status
// response arriving after its query timed out is dropped.
fn ignore_shell_signals() -> Result<Vec<SignalHandler>, Error> {
    JOB_CONTROL_SIGNALS
        .iter()
        .copied()
        .chain([response_signal()])
        .map(|signal| {
            SignalHandler::register(signal, SignalHandlerBehavior::Ignore).map_err(|err| {
                Error::Fatal(format!(
                    "cannot set up {}: {err}",
                    crate::system::signal::signal_name(signal)
                ))
            })
        })
        .collect()
}

fn shell_process() -> Result<(), Error> {
    ShellLogger::new("mshell: ").into_global_logger();

    dev_info!("development logs are enabled");

    let source = match ShellAction::from_env() {
        Ok(ShellAction::Help) => {
            println_ignore_io_error!("{}", cli::long_help_message());
            std::process::exit(0);
        }
        Ok(ShellAction::Version) => {
            println_ignore_io_error!("mshell {VERSION}");
            std::process::exit(0);
        }
        Ok(ShellAction::Interactive) => LineSource::Interactive,
        Ok(ShellAction::Batch(path)) => {
            LineSource::open_batch(&path).map_err(|err| Error::Io(Some(path.clone()), err))?
        }
        Err(e) => {
            eprintln_ignore_io_error!("{e}\n{}", cli::USAGE_MSG);
            std::process::exit(1);
        }
    };

    Shell::new(ShellConfig::default())?.run(source)
}

pub fn main() {
    match shell_process() {
        Ok(()) => (),
        Err(error) => {
            if !error.is_silent() {
                user_error!("{error}");
            }
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        os::unix::fs::PermissionsExt,
        path::PathBuf,
        process::Command,
        time::{Duration, Instant},
    };

    use pretty_assertions::assert_eq;

    use super::{Shell, ShellConfig};
    use crate::{
        common::Error,
        shell::parser::ParseError,
        system::{interface::ProcessId, signal::consts::SIGTERM, wait::wait_retrying},
    };

    fn temp_path(tag: &str) -> PathBuf {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("Failed to get system time")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "mshell_test_{tag}_{}_{timestamp}",
            std::process::id()
        ))
    }

    fn test_shell() -> Shell {
        Shell::new(ShellConfig::default()).unwrap()
    }

    #[test]
    fn default_config() {
        let config = ShellConfig::default();
        assert_eq!(config.status_timeout.as_secs(), 3);
        assert!(!config.monitor_binary.as_os_str().is_empty());
        assert!(!config.monitor_config.as_os_str().is_empty());
    }

    #[test]
    fn blank_lines_do_nothing() {
        let mut shell = test_shell();
        shell.execute("").unwrap();
        shell.execute("   \t  \n").unwrap();
        assert!(shell.jobs.pending().is_empty());
    }

    #[test]
    fn parse_errors_reach_the_caller() {
        let mut shell = test_shell();
        assert!(matches!(
            shell.execute("ls | | wc"),
            Err(Error::Parse(ParseError::EmptyStage))
        ));
        assert!(matches!(
            shell.execute("cat < a | sort > b | wc"),
            Err(Error::Parse(ParseError::MisplacedRedirect { .. }))
        ));
    }

    #[test]
    fn reaping_the_monitor_ends_the_session() {
        let mut shell = test_shell();
        let child = Command::new("true").spawn().unwrap();
        let pid = ProcessId::new(child.id() as i32);

        shell.monitor.started(pid);
        shell.jobs.launch(pid, true);

        let start = std::time::Instant::now();
        while shell.monitor.is_active() && start.elapsed().as_secs() < 2 {
            shell.reap_background();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert!(!shell.monitor.is_active());
        assert!(shell.jobs.pending().is_empty());
        // already collected
        assert!(wait_retrying(pid).is_err());
    }

    #[test]
    fn monitor_lifecycle_through_a_script() {
        let config_path = temp_path("monitor.json");
        let args_path = temp_path("monitor.args");
        let script = temp_path("monitor.sh");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" > {args}.part && mv {args}.part {args}\nexec sleep 30\n",
                args = args_path.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let mut shell = Shell::new(ShellConfig {
            monitor_binary: script.clone(),
            monitor_config: config_path.clone(),
            ..ShellConfig::default()
        })
        .unwrap();

        shell
            .execute("start_monitor --cpu=false --update_interval=5")
            .unwrap();
        let monitor = shell.monitor.pid().expect("monitor session was not recorded");

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap();
        assert_eq!(written["update_interval"], 5);
        assert_eq!(written["metrics"]["cpu"], false);

        // the monitor is invoked as `<binary> <config path>`
        let start = Instant::now();
        while !args_path.exists() && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(
            fs::read_to_string(&args_path).unwrap(),
            format!("{}\n", config_path.display())
        );

        assert!(matches!(
            shell.execute("start_monitor"),
            Err(Error::Monitor(_))
        ));
        assert_eq!(shell.monitor.pid(), Some(monitor));

        shell.execute("stop_monitor").unwrap();
        assert_eq!(shell.monitor.pid(), None);
        let status = wait_retrying(monitor).unwrap();
        assert_eq!(status.term_signal(), Some(SIGTERM));

        shell.shut_down();
        assert!(!config_path.exists());

        fs::remove_file(&script).unwrap();
        fs::remove_file(&args_path).unwrap();
    }
}
