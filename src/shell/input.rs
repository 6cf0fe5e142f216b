//! Where command lines come from, and the interactive prompt.
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use crate::{cutils::safe_isatty, system::Hostname};

pub(crate) enum LineSource<R = BufReader<File>> {
    Interactive,
    Batch(R),
}

impl LineSource {
    pub(crate) fn open_batch(path: &Path) -> io::Result<Self> {
        Ok(LineSource::Batch(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> LineSource<R> {
    /// Read the next command line, without its line terminator. `None` means end of input.
    ///
    /// `prompt` is only called when reading interactively from a terminal. Batch lines whose
    /// first non-blank character is `#` are comments and are skipped.
    pub(crate) fn next_line(&mut self, prompt: impl Fn() -> String) -> io::Result<Option<String>> {
        match self {
            LineSource::Interactive => {
                if safe_isatty(libc::STDIN_FILENO) {
                    print_ignore_io_error!("{}", prompt());
                }
                read_line(&mut io::stdin().lock())
            }
            LineSource::Batch(reader) => loop {
                match read_line(reader)? {
                    Some(line) if line.trim_start().starts_with('#') => continue,
                    line => return Ok(line),
                }
            },
        }
    }
}

// Bytes that are not valid UTF-8 become U+FFFD; only a failing read is an error.
fn read_line(reader: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut bytes = Vec::new();
    if reader.read_until(b'\n', &mut bytes)? == 0 {
        return Ok(None);
    }

    let mut line = String::from_utf8_lossy(&bytes).into_owned();
    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);

    Ok(Some(line))
}

/// Render `<user>@<host>:<cwd>$ `.
pub(crate) fn render_prompt(user: Option<&str>, host: Option<&Hostname>, cwd: &Path) -> String {
    format!(
        "{}@{}:{}$ ",
        user.unwrap_or("?"),
        host.map(|host| &**host).unwrap_or("?"),
        cwd.display()
    )
}
