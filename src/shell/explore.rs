//! Recursive search for configuration files.
use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use glob::Pattern;

use crate::log::{dev_debug, user_warn};

const CONFIG_PATTERNS: &[&str] = &["*.config", "*.json"];

fn config_patterns() -> Vec<Pattern> {
    CONFIG_PATTERNS
        .iter()
        .filter_map(|pattern| Pattern::new(pattern).ok())
        .collect()
}

/// Print the path and content of every configuration file below `dir` to `out`.
///
/// Entries that cannot be read are reported and skipped; only a failure to write to `out` is
/// returned.
pub(crate) fn explore(dir: &Path, out: &mut impl Write) -> io::Result<()> {
    let patterns = config_patterns();
    visit(dir, &patterns, out)
}

fn visit(dir: &Path, patterns: &[Pattern], out: &mut impl Write) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            user_warn!("cannot open directory '{}': {err}", dir.display());
            return Ok(());
        }
    };

    let mut paths = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect::<Vec<_>>();
    paths.sort();

    for path in paths {
        // symlinked directories are not followed, so a link cycle cannot trap us
        let Ok(metadata) = fs::symlink_metadata(&path) else {
            continue;
        };

        if metadata.is_dir() {
            visit(&path, patterns, out)?;
        } else if is_config_file(&path, patterns) {
            match fs::read(&path) {
                Ok(content) => print_file(&path, &content, out)?,
                Err(err) => user_warn!("cannot read '{}': {err}", path.display()),
            }
        } else {
            dev_debug!("skipping {}", path.display());
        }
    }

    Ok(())
}

fn is_config_file(path: &Path, patterns: &[Pattern]) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    patterns.iter().any(|pattern| pattern.matches(name))
}

fn print_file(path: &Path, content: &[u8], out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", path.display())?;
    out.write_all(content)?;
    if !content.ends_with(b"\n") {
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use pretty_assertions::assert_eq;

    use super::explore;

    fn temp_dir(tag: &str) -> PathBuf {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("Failed to get system time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "mshell_test_{tag}_{}_{timestamp}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn finds_config_files_recursively() {
        let root = temp_dir("explore");
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::write(root.join("a.json"), "{}\n").unwrap();
        fs::write(root.join("notes.txt"), "ignored").unwrap();
        fs::write(root.join("nested/app.config"), "key=value").unwrap();
        fs::write(root.join("nested/deeper/z.json"), "[1, 2]\n").unwrap();
        fs::write(root.join("nested/deeper/json"), "not matched").unwrap();

        let mut out = Vec::new();
        explore(&root, &mut out).unwrap();

        let expected = format!(
            "{}\n{{}}\n{}\nkey=value\n{}\n[1, 2]\n",
            root.join("a.json").display(),
            root.join("nested/app.config").display(),
            root.join("nested/deeper/z.json").display(),
        );
        assert_eq!(String::from_utf8(out).unwrap(), expected);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn empty_directory_prints_nothing() {
        let root = temp_dir("explore_empty");

        let mut out = Vec::new();
        explore(&root, &mut out).unwrap();
        assert!(out.is_empty());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn symlinked_directories_are_not_followed() {
        let root = temp_dir("explore_links");
        fs::write(root.join("x.json"), "x\n").unwrap();
        std::os::unix::fs::symlink(&root, root.join("loop")).unwrap();

        let mut out = Vec::new();
        explore(&root, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{}\nx\n", root.join("x.json").display())
        );

        fs::remove_dir_all(&root).unwrap();
    }
}
