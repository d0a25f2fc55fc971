use log::LevelFilter;
use log4rs::config::Logger;
use std::{collections::BTreeMap, env};
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum LogError {
    #[error("logger spec parsing error: {0}")]
    ParseLoggerSpecError(String),

    #[error("log appender error: {0}")]
    AppenderError(String),

    #[error("log config error: {0}")]
    ConfigError(String),

    #[error("logger already initialized: {0}")]
    AlreadyInitialized(String),
}

pub(super) struct Loggers {
    loggers: Vec<(String, LevelFilter)>,
    root_level: LevelFilter,
}

impl Loggers {
    pub fn root_level(&self) -> LevelFilter {
        self.root_level
    }

    pub fn items(&self) -> impl IntoIterator<Item = Logger> + '_ {
        self.loggers.iter().map(|(name, level)| Logger::builder().build(name.clone(), *level))
    }
}

/// Collects per-module log levels from `RUST_LOG` style expressions
pub(super) struct Builder {
    loggers: BTreeMap<String, LevelFilter>,
    root_level: LevelFilter,
}

impl Builder {
    pub fn new() -> Builder {
        Builder { loggers: BTreeMap::new(), root_level: LevelFilter::Error }
    }

    pub fn parse_env(&mut self, env: &str) -> &mut Self {
        self.parse_expression(&env::var(env).unwrap_or_default())
    }

    /// Parses a comma separated list of `level` or `module=level` specs.
    /// Invalid specs are reported on stdout and skipped since the logger itself is not available yet.
    pub fn parse_expression(&mut self, expression: &str) -> &mut Self {
        for spec in expression.split(',').map(str::trim).filter(|x| !x.is_empty()) {
            match parse_spec(spec) {
                Ok((Some(name), level)) => {
                    self.loggers.insert(name.to_string(), level);
                }
                Ok((None, level)) => {
                    self.root_level = level;
                }
                Err(err) => println!("Ignoring invalid logging spec: {err}"),
            }
        }
        self
    }

    pub fn root_level(&mut self, root_level: LevelFilter) -> &mut Self {
        self.root_level = root_level;
        self
    }

    pub fn build(&mut self) -> Loggers {
        Loggers { loggers: std::mem::take(&mut self.loggers).into_iter().collect(), root_level: self.root_level }
    }
}

fn parse_spec(spec: &str) -> Result<(Option<&str>, LevelFilter), LogError> {
    let mut parts = spec.split('=').map(str::trim);
    match (parts.next(), parts.next(), parts.next()) {
        // A single level defines the root level, a single name enables everything for that module
        (Some(part), None, None) => Ok(part.parse().map(|level| (None, level)).unwrap_or((Some(part), LevelFilter::max()))),
        (Some(name), Some(""), None) => Ok((Some(name), LevelFilter::max())),
        (Some(name), Some(level), None) => {
            level.parse().map(|level| (Some(name), level)).map_err(|_| LogError::ParseLoggerSpecError(spec.to_string()))
        }
        _ => Err(LogError::ParseLoggerSpecError(spec.to_string())),
    }
}
