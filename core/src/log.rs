//! Logger and logging macros
//!
//! Log levels can be configured per module through a filter expression such as
//! `info,tangle_consensus=debug`. The `RUST_LOG` environment variable is parsed first
//! and the explicit expression overrides it.

use log4rs::{
    Config,
    config::{Appender, Root},
};
use std::iter::once;

mod appender;
mod consts;
mod logger;

pub use logger::LogError;

use appender::AppenderSpec;
use consts::*;
use logger::Builder;

const CONSOLE_APPENDER: &str = "stdout";
const LOG_FILE_APPENDER: &str = "log_file";
const ERR_LOG_FILE_APPENDER: &str = "err_log_file";

/// Initializes the global logger with a console appender and, when `log_dir` is provided,
/// a rolling log file plus a rolling error log file.
pub fn init_logger(log_dir: Option<&str>, filters: &str) -> Result<(), LogError> {
    let loggers = Builder::new().root_level(DEFAULT_LOG_LEVEL).parse_env(DEFAULT_LOGGER_ENV).parse_expression(filters).build();

    let mut stdout_appender = AppenderSpec::console(CONSOLE_APPENDER, None);
    let mut file_appender = log_dir.map(|x| AppenderSpec::roller(LOG_FILE_APPENDER, None, x, LOG_FILE_NAME)).transpose()?;
    let mut err_file_appender = log_dir
        .map(|x| AppenderSpec::roller(ERR_LOG_FILE_APPENDER, Some(log::LevelFilter::Warn), x, ERR_LOG_FILE_NAME))
        .transpose()?;

    let appenders = once(&mut stdout_appender).chain(file_appender.iter_mut()).chain(err_file_appender.iter_mut()).collect::<Vec<_>>();
    let names = appenders.iter().map(|x| x.name).collect::<Vec<_>>();
    let appenders: Vec<Appender> = appenders.into_iter().map(|x| x.appender()).collect::<Result<_, _>>()?;

    let config = Config::builder()
        .appenders(appenders)
        .loggers(loggers.items())
        .build(Root::builder().appenders(names).build(loggers.root_level()))
        .map_err(|err| LogError::ConfigError(err.to_string()))?;

    log4rs::init_config(config).map_err(|err| LogError::AlreadyInitialized(err.to_string()))?;
    Ok(())
}

/// Tries to init the global logger, but does not fail if it was already initialized.
/// Meant to be called from tests.
pub fn try_init_logger(filters: &str) {
    let _ = init_logger(None, filters);
}

#[macro_export]
macro_rules! trace {
    ($($t:tt)*) => {
        $crate::__log::trace!($($t)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => {
        $crate::__log::debug!($($t)*)
    };
}

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => {
        $crate::__log::info!($($t)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => {
        $crate::__log::warn!($($t)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($t:tt)*) => {
        $crate::__log::error!($($t)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_with_files() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().to_str().unwrap();
        init_logger(Some(log_dir), "info,tangle_core=trace").unwrap();
        crate::info!("logger initialized at {}", log_dir);
        crate::warn!("this line also lands in the error log");
        // A second init is reported instead of panicking
        assert!(matches!(init_logger(None, "debug"), Err(LogError::AlreadyInitialized(_))));
        assert!(dir.path().join(LOG_FILE_NAME).exists());
    }
}
