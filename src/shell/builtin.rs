//! Commands the shell executes itself.
use std::{
    env, io, mem,
    path::{Path, PathBuf},
};

use crate::{
    common::Error,
    log::{dev_info, user_warn},
};

use super::{
    explore::explore,
    monitor::StatusReply,
    parser::SingleCommand,
    Shell,
};

const CLEAR_SCREEN: &str = "\x1b[H\x1b[J";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Cd,
    Clr,
    Echo,
    Quit,
    StopMonitor,
    StatusMonitor,
    ExploreFilesystem,
}

impl Builtin {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        let builtin = match name {
            "cd" => Builtin::Cd,
            "clr" => Builtin::Clr,
            "echo" => Builtin::Echo,
            "quit" => Builtin::Quit,
            "stop_monitor" => Builtin::StopMonitor,
            "status_monitor" => Builtin::StatusMonitor,
            "explore_filesystem" => Builtin::ExploreFilesystem,
            _ => return None,
        };

        Some(builtin)
    }

    /// Run the builtin in the current process. Its output goes to whatever stdout currently is.
    pub(crate) fn run(self, command: &SingleCommand, shell: &mut Shell) -> Result<(), Error> {
        dev_info!("running builtin {self:?}");
        match self {
            Builtin::Cd => shell.cwd.cd(command.args()),
            Builtin::Clr => {
                print_ignore_io_error!("{CLEAR_SCREEN}");
                Ok(())
            }
            Builtin::Echo => echo(command),
            Builtin::Quit => shell.quit(),
            Builtin::StopMonitor => {
                shell.monitor.stop()?;
                Ok(())
            }
            Builtin::StatusMonitor => status_monitor(shell),
            Builtin::ExploreFilesystem => explore_filesystem(command.args()),
        }
    }
}

fn echo(command: &SingleCommand) -> Result<(), Error> {
    match command.args().first() {
        None => println_ignore_io_error!(),
        Some(arg) if arg.starts_with('$') => {
            let value = lookup_variable(&arg[1..])?;
            println_ignore_io_error!("{value}");
        }
        Some(_) => println_ignore_io_error!("{}", command.raw_args()),
    }

    Ok(())
}

fn lookup_variable(name: &str) -> Result<String, Error> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::usage(format!(
            "echo: environment variable '{name}' is not set"
        ))),
    }
}

fn status_monitor(shell: &mut Shell) -> Result<(), Error> {
    match shell.monitor.query_status(shell.config.status_timeout)? {
        StatusReply::NotRunning => {
            user_warn!("monitor is not initialized; use `start_monitor` first")
        }
        StatusReply::TimedOut => user_warn!(
            "monitor did not answer within {} seconds",
            shell.config.status_timeout.as_secs_f32()
        ),
        StatusReply::Status(status) => println_ignore_io_error!("{status}"),
    }

    Ok(())
}

fn explore_filesystem(args: &[String]) -> Result<(), Error> {
    let [dir] = args else {
        return Err(Error::usage("usage: explore_filesystem <directory>"));
    };

    let dir = Path::new(dir);
    if !dir.is_dir() {
        return Err(Error::usage(format!(
            "explore_filesystem: '{}' is not a directory",
            dir.display()
        )));
    }

    let mut stdout = io::stdout().lock();
    explore(dir, &mut stdout).map_err(|err| Error::Io(None, err))
}

/// The current directory of the shell and the one it was in before the last change.
#[derive(Debug)]
pub(crate) struct WorkingDirectory {
    current: PathBuf,
    previous: Option<PathBuf>,
}

impl WorkingDirectory {
    pub(crate) fn from_process() -> io::Result<Self> {
        Ok(Self {
            current: env::current_dir()?,
            previous: None,
        })
    }

    pub(crate) fn current(&self) -> &Path {
        &self.current
    }

    #[cfg(test)]
    pub(crate) fn previous(&self) -> Option<&Path> {
        self.previous.as_deref()
    }

    /// `cd` prints the current directory, `cd -` goes back to the previous one and `cd <path>`
    /// changes to `path`.
    pub(crate) fn cd(&mut self, args: &[String]) -> Result<(), Error> {
        match args {
            [] => {
                println_ignore_io_error!("{}", self.current.display());
                Ok(())
            }
            [target] if target == "-" => {
                let Some(previous) = self.previous.clone() else {
                    return Err(Error::usage("cd: no previous directory"));
                };
                self.change(&previous)
            }
            [target] => self.change(Path::new(target)),
            _ => Err(Error::usage("cd: too many arguments")),
        }
    }

    pub(crate) fn change(&mut self, target: &Path) -> Result<(), Error> {
        env::set_current_dir(target).map_err(|err| Error::Io(Some(target.to_path_buf()), err))?;
        let current = env::current_dir().map_err(|err| Error::Io(None, err))?;

        let previous = mem::replace(&mut self.current, current);
        env::set_var("OLDPWD", &previous);
        env::set_var("PWD", &self.current);
        dev_info!(
            "changed directory from {} to {}",
            previous.display(),
            self.current.display()
        );
        self.previous = Some(previous);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{lookup_variable, Builtin, WorkingDirectory};
    use crate::common::Error;

    #[test]
    fn lookup_names() {
        assert_eq!(Builtin::lookup("cd"), Some(Builtin::Cd));
        assert_eq!(
            Builtin::lookup("explore_filesystem"),
            Some(Builtin::ExploreFilesystem)
        );
        assert_eq!(Builtin::lookup("status_monitor"), Some(Builtin::StatusMonitor));
        // launched like an external program
        assert_eq!(Builtin::lookup("start_monitor"), None);
        assert_eq!(Builtin::lookup("ls"), None);
    }

    #[test]
    fn variables_must_be_set() {
        std::env::set_var("MSHELL_TEST_ECHO", "some value");
        assert_eq!(lookup_variable("MSHELL_TEST_ECHO").unwrap(), "some value");

        std::env::set_var("MSHELL_TEST_EMPTY", "");
        assert!(matches!(
            lookup_variable("MSHELL_TEST_EMPTY"),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            lookup_variable("MSHELL_TEST_SURELY_UNSET"),
            Err(Error::Usage(_))
        ));
    }

    // The working directory is process-wide, so all directory changes happen in this one test.
    #[test]
    fn change_directory_and_back() {
        let mut cwd = WorkingDirectory::from_process().unwrap();
        let start = cwd.current().to_path_buf();

        assert!(matches!(
            cwd.cd(&["-".to_string()]),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            cwd.cd(&["/".to_string(), "/tmp".to_string()]),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            cwd.cd(&["/surely/not/a/directory".to_string()]),
            Err(Error::Io(Some(_), _))
        ));
        assert_eq!(cwd.current(), start);
        assert_eq!(cwd.previous(), None);

        cwd.cd(&["/".to_string()]).unwrap();
        assert_eq!(cwd.current(), std::path::Path::new("/"));
        assert_eq!(cwd.previous(), Some(start.as_path()));
        assert_eq!(std::env::var_os("PWD").unwrap(), "/");
        assert_eq!(std::env::var_os("OLDPWD").unwrap(), start.as_os_str());

        cwd.cd(&["-".to_string()]).unwrap();
        assert_eq!(cwd.current(), start);
        assert_eq!(cwd.previous(), Some(std::path::Path::new("/")));
        assert_eq!(std::env::current_dir().unwrap(), start);
    }
}
