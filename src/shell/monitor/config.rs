//! The JSON configuration handed to the monitor when it is started.
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{common::Error, log::dev_info};

const CONFIG_OPTION: &str = "--config=";
const INTERVAL_OPTION: &str = "--update_interval=";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct Metrics {
    pub cpu: bool,
    pub mem: bool,
    pub hdd: bool,
    pub net: bool,
    pub procs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct MonitorConfig {
    /// Seconds between two samples.
    pub update_interval: u8,
    pub metrics: Metrics,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            update_interval: 1,
            metrics: Metrics {
                cpu: true,
                mem: true,
                hdd: true,
                net: true,
                procs: true,
            },
        }
    }
}

/// Where the monitor gets its configuration from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConfigSource {
    /// A file given with `--config=`; every other option is ignored.
    Provided(PathBuf),
    Generated(MonitorConfig),
}

impl ConfigSource {
    /// Interpret the `--name=value` arguments of `start_monitor`.
    pub(crate) fn from_args(args: &[String]) -> Result<Self, Error> {
        let mut config = MonitorConfig::default();

        for arg in args {
            if let Some(path) = arg.strip_prefix(CONFIG_OPTION) {
                if !path.is_empty() {
                    return Ok(ConfigSource::Provided(PathBuf::from(path)));
                }
            } else if let Some(value) = arg.strip_prefix(INTERVAL_OPTION) {
                config.update_interval = parse_interval(value)?;
            } else if let Some((name, value)) = arg.split_once('=') {
                let metric = match name {
                    "--cpu" => &mut config.metrics.cpu,
                    "--mem" => &mut config.metrics.mem,
                    "--hdd" => &mut config.metrics.hdd,
                    "--net" => &mut config.metrics.net,
                    "--procs" => &mut config.metrics.procs,
                    _ => {
                        dev_info!("ignoring unknown monitor option {arg}");
                        continue;
                    }
                };
                *metric = parse_switch(name, value)?;
            } else {
                dev_info!("ignoring unknown monitor option {arg}");
            }
        }

        Ok(ConfigSource::Generated(config))
    }

    /// Produce the path the monitor must be started with, writing the file to `default_path`
    /// when it has to be generated.
    pub(crate) fn materialize(self, default_path: &Path) -> Result<PathBuf, Error> {
        match self {
            ConfigSource::Provided(path) => Ok(path),
            ConfigSource::Generated(config) => {
                config.write_to(default_path)?;
                Ok(default_path.to_path_buf())
            }
        }
    }
}

fn parse_interval(value: &str) -> Result<u8, Error> {
    value
        .parse::<i64>()
        .ok()
        .and_then(|seconds| u8::try_from(seconds).ok())
        .filter(|seconds| *seconds >= 1)
        .ok_or_else(|| {
            Error::Config(format!(
                "`--update_interval` value must be an integer between 1 and 255, not '{value}'"
            ))
        })
}

fn parse_switch(name: &str, value: &str) -> Result<bool, Error> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::Config(format!(
            "`{name}` value must be either \"true\" or \"false\", not '{value}'"
        ))),
    }
}

impl MonitorConfig {
    pub(crate) fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|err| Error::Config(err.to_string()))
    }

    pub(crate) fn write_to(&self, path: &Path) -> Result<(), Error> {
        let json = self.to_json()?;
        let mut file =
            fs::File::create(path).map_err(|err| Error::Io(Some(path.to_path_buf()), err))?;
        writeln!(file, "{json}").map_err(|err| Error::Io(Some(path.to_path_buf()), err))?;
        dev_info!("wrote monitor configuration to {}", path.display());

        Ok(())
    }
}

/// Remove the configuration file this shell generated, if there is one.
pub(crate) fn delete_owned_config(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}
