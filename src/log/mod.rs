#![allow(unused_macros)]
use self::simple_logger::SimpleLogger;
use std::ops::Deref;

mod simple_logger;

macro_rules! logger_macro {
    ($name:ident is $rule_level:ident to $target:expr, $d:tt) => {
        macro_rules! $name {
            ($d($d arg:tt)+) => (::log::log!(target: $target, ::log::Level::$rule_level, $d($d arg)+));
        }

        #[allow(unused_imports)]
        pub(crate) use $name;
    };
    ($name:ident is $rule_level:ident to $target:expr) => {
        logger_macro!($name is $rule_level to $target, $);
    };
}

logger_macro!(user_error is Error to "mshell::user");
logger_macro!(user_warn is Warn to "mshell::user");
logger_macro!(user_info is Info to "mshell::user");

macro_rules! dev_logger_macro {
    ($name:ident is $rule_level:ident to $target:expr, $d:tt) => {
        macro_rules! $name {
            ($d($d arg:tt)+) => {
                if std::cfg!(feature = "dev") {
                    (::log::log!(
                        target: $target,
                        ::log::Level::$rule_level,
                        "{}: {}",
                        std::panic::Location::caller(),
                        format_args!($d($d arg)+)
                    ));
                }
            };
        }

        #[allow(unused_imports)]
        pub(crate) use $name;
    };
    ($name:ident is $rule_level:ident to $target:expr) => {
        dev_logger_macro!($name is $rule_level to $target, $);
    };
}

dev_logger_macro!(dev_error is Error to "mshell::dev");
dev_logger_macro!(dev_warn is Warn to "mshell::dev");
dev_logger_macro!(dev_info is Info to "mshell::dev");
dev_logger_macro!(dev_debug is Debug to "mshell::dev");

#[derive(Default)]
pub struct ShellLogger(Vec<(String, Box<dyn log::Log>)>);

impl ShellLogger {
    pub fn new(prefix: &'static str) -> Self {
        let mut logger: Self = Default::default();

        logger.add_logger("mshell::user", SimpleLogger::to_stderr(prefix));

        #[cfg(feature = "dev")]
        {
            let path = option_env!("MSHELL_DEV_LOGS")
                .map(|s| s.into())
                .unwrap_or_else(|| {
                    std::env::temp_dir().join(format!("mshell-dev-{}.log", std::process::id()))
                });
            if let Ok(file_logger) = SimpleLogger::to_file(path, "") {
                logger.add_logger("mshell::dev", file_logger);
            }
        }

        logger
    }

    /// Install this logger as the global one. Calling it a second time is a no-op, which
    /// only happens when several shells are constructed in the same process.
    pub fn into_global_logger(self) {
        if log::set_boxed_logger(Box::new(self)).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    }

    /// Add a logger for a specific prefix to the stack
    fn add_logger(
        &mut self,
        prefix: impl ToString + Deref<Target = str>,
        logger: impl log::Log + 'static,
    ) {
        let prefix = if prefix.ends_with("::") {
            prefix.to_string()
        } else {
            // given a prefix `my::prefix`, we want to match `my::prefix::somewhere`
            // but not `my::prefix_to_somewhere`
            format!("{}::", prefix.to_string())
        };
        self.0.push((prefix, Box::new(logger)))
    }
}

impl log::Log for ShellLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.level() <= log::STATIC_MAX_LEVEL
    }

    fn log(&self, record: &log::Record) {
        for (prefix, l) in self.0.iter() {
            if record.target() == &prefix[..prefix.len() - 2] || record.target().starts_with(prefix)
            {
                l.log(record);
            }
        }
    }

    fn flush(&self) {
        for (_, l) in self.0.iter() {
            l.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ShellLogger;

    #[test]
    fn can_construct_logger() {
        let logger = ShellLogger::new("mshell: ");
        let len = if cfg!(feature = "dev") { 2 } else { 1 };
        assert_eq!(logger.0.len(), len);
    }

    #[test]
    fn prefixes_are_normalized() {
        let logger = ShellLogger::new("mshell: ");
        assert_eq!(logger.0[0].0, "mshell::user::");
    }
}
