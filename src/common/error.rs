use crate::shell::parser::ParseError;
use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub enum Error {
    Silent,
    Parse(ParseError),
    Usage(String),
    Config(String),
    Redirect(PathBuf, std::io::Error),
    Io(Option<PathBuf>, std::io::Error),
    Monitor(String),
    Fatal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Silent => Ok(()),
            Error::Parse(e) => write!(f, "{e}"),
            Error::Usage(e) => write!(f, "{e}"),
            Error::Config(e) => write!(f, "invalid monitor configuration: {e}"),
            Error::Redirect(path, e) => {
                write!(f, "cannot redirect to '{}': {e}", path.display())
            }
            Error::Io(location, e) => {
                if let Some(path) = location {
                    write!(f, "'{}': {e}", path.display())
                } else {
                    write!(f, "IO error: {e}")
                }
            }
            Error::Monitor(e) => write!(f, "monitor: {e}"),
            Error::Fatal(e) => write!(f, "fatal: {e}"),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(None, err)
    }
}

impl Error {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Returns `true` if the error is [`Silent`].
    ///
    /// [`Silent`]: Error::Silent
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Silent)
    }

    /// Returns `true` if the shell cannot keep running after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}
