use std::path::PathBuf;

pub(crate) const USAGE_MSG: &str = "usage: mshell [-h | -V] [batch_file]";

const DESCRIPTOR: &str = "mshell - a small shell with pipelines and a metrics monitor";

const HELP_MSG: &str = "Arguments:
  batch_file                    run the commands of this file instead of reading them interactively

Options:
  -h, --help                    display help message and exit
  -V, --version                 display version information and exit";

pub(crate) fn long_help_message() -> String {
    format!("{DESCRIPTOR}\n{USAGE_MSG}\n\n{HELP_MSG}")
}

#[derive(Debug, PartialEq)]
pub(crate) enum ShellAction {
    Interactive,
    Batch(PathBuf),
    Help,
    Version,
}

impl ShellAction {
    pub(crate) fn from_env() -> Result<ShellAction, String> {
        let args = std::env::args().collect();

        Self::parse_arguments(args)
    }

    /// Parse the command line of the shell; the first argument is the program name.
    pub(crate) fn parse_arguments(arguments: Vec<String>) -> Result<ShellAction, String> {
        let mut action = ShellAction::Interactive;
        let mut only_positional = false;

        for arg in arguments.into_iter().skip(1) {
            let next = if only_positional || !arg.starts_with('-') || arg == "-" {
                ShellAction::Batch(PathBuf::from(arg))
            } else {
                match arg.as_str() {
                    "-h" | "--help" => return Ok(ShellAction::Help),
                    "-V" | "--version" => return Ok(ShellAction::Version),
                    "--" => {
                        only_positional = true;
                        continue;
                    }
                    _ if arg.starts_with("--") => {
                        return Err(format!("invalid option '{}'", &arg[2..]));
                    }
                    _ => {
                        return Err(format!("invalid option -- '{}'", &arg[1..]));
                    }
                }
            };

            if action != ShellAction::Interactive {
                return Err("too many arguments".to_string());
            }
            action = next;
        }

        Ok(action)
    }
}
