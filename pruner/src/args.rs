use clap::{Arg, ArgAction, ArgGroup, Command, arg};
use serde::Deserialize;
use std::{ffi::OsString, fs};
use tangle_consensus::pipeline::pruning_processor::processor::PruneRequest;
use tangle_consensus_core::{
    MilestoneIndex,
    config::pruning::PruningConfig,
    errors::config::{ConfigError, ConfigResult},
};
use tangle_utils::bytes::ByteSize;
use toml::from_str;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Args {
    // NOTE: property names match config file fields
    pub appdir: Option<String>,
    pub logdir: Option<String>,
    #[serde(rename = "nologfiles")]
    pub no_log_files: bool,
    #[serde(rename = "loglevel")]
    pub log_level: String,
    pub index: Option<MilestoneIndex>,
    pub depth: Option<MilestoneIndex>,
    pub target_size: Option<ByteSize>,
    pub sync_tolerance: MilestoneIndex,
    pub pruning: PruningConfig,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            appdir: None,
            logdir: None,
            no_log_files: false,
            log_level: "INFO".into(),
            index: None,
            depth: None,
            target_size: None,
            sync_tolerance: 0,
            pruning: Default::default(),
        }
    }
}

impl Args {
    /// The explicit prune request, or `None` if the configured retention policy should run
    pub fn prune_request(&self) -> ConfigResult<Option<PruneRequest>> {
        match (self.index, self.depth, self.target_size) {
            (None, None, None) => Ok(None),
            (Some(index), None, None) => Ok(Some(PruneRequest::TargetIndex(index))),
            (None, Some(depth), None) => Ok(Some(PruneRequest::Depth(depth))),
            (None, None, Some(size)) => Ok(Some(PruneRequest::TargetSize(Some(size.into())))),
            _ => Err(ConfigError::MultiplePruneRequests),
        }
    }
}

pub fn cli() -> Command {
    Command::new("tangle-pruner")
        .about(format!("{} v{}", env!("CARGO_PKG_DESCRIPTION"), env!("CARGO_PKG_VERSION")))
        .version(env!("CARGO_PKG_VERSION"))
        .arg(arg!(-C --configfile <CONFIG_FILE> "Path of config file."))
        .arg(arg!(-b --appdir <DATA_DIR> "Directory of the node databases."))
        .arg(arg!(--logdir <LOG_DIR> "Directory to log output."))
        .arg(arg!(--nologfiles "Disable logging to files."))
        .arg(
            Arg::new("log_level")
                .short('d')
                .long("loglevel")
                .value_name("LEVEL")
                .default_value("info")
                .require_equals(true)
                .help("Logging level for all subsystems {off, error, warn, info, debug, trace}\n-- You may also specify <subsystem>=<level>,<subsystem2>=<level>,... to set the log level for individual subsystems.".to_string()),
        )
        .arg(
            Arg::new("index")
                .long("index")
                .value_name("INDEX")
                .require_equals(true)
                .value_parser(clap::value_parser!(MilestoneIndex))
                .help("Prune up to and including this milestone index."),
        )
        .arg(
            Arg::new("depth")
                .long("depth")
                .value_name("DEPTH")
                .require_equals(true)
                .value_parser(clap::value_parser!(MilestoneIndex))
                .help("Keep this many milestones below the confirmed milestone."),
        )
        .arg(
            Arg::new("target-size")
                .long("target-size")
                .value_name("SIZE")
                .require_equals(true)
                .value_parser(clap::value_parser!(ByteSize))
                .help("Prune until the databases fit into this size, e.g. 30GB or 512MiB."),
        )
        .group(ArgGroup::new("request").args(["index", "depth", "target-size"]).multiple(false))
        .arg(
            Arg::new("prune-receipts")
                .long("prune-receipts")
                .action(ArgAction::SetTrue)
                .help("Also delete the receipts of pruned milestones."),
        )
}

pub fn parse_args() -> Args {
    match Args::parse(std::env::args_os()) {
        Ok(args) => args,
        Err(err) => {
            println!("{err}");
            std::process::exit(1);
        }
    }
}

impl Args {
    pub fn parse<I, T>(itr: I) -> Result<Args, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let m: clap::ArgMatches = cli().try_get_matches_from(itr)?;
        let mut defaults: Args = Default::default();

        if let Some(config_file) = m.get_one::<String>("configfile") {
            let config_str = fs::read_to_string(config_file)?;
            defaults = from_str(&config_str).map_err(|toml_error| {
                clap::Error::raw(
                    clap::error::ErrorKind::ValueValidation,
                    format!("failed parsing config file, reason: {}", toml_error.message()),
                )
            })?;
        }

        let mut pruning = defaults.pruning;
        pruning.prune_receipts = arg_match_unwrap_or::<bool>(&m, "prune-receipts", false) || pruning.prune_receipts;

        let args = Args {
            appdir: m.get_one::<String>("appdir").cloned().or(defaults.appdir),
            logdir: m.get_one::<String>("logdir").cloned().or(defaults.logdir),
            no_log_files: arg_match_unwrap_or::<bool>(&m, "nologfiles", defaults.no_log_files),
            log_level: arg_match_unwrap_or::<String>(&m, "log_level", defaults.log_level),
            index: m.get_one::<MilestoneIndex>("index").cloned().or(defaults.index),
            depth: m.get_one::<MilestoneIndex>("depth").cloned().or(defaults.depth),
            target_size: m.get_one::<ByteSize>("target-size").cloned().or(defaults.target_size),
            sync_tolerance: defaults.sync_tolerance,
            pruning,
        };

        Ok(args)
    }
}

use clap::parser::ValueSource::DefaultValue;

fn arg_match_unwrap_or<T: Clone + Send + Sync + 'static>(m: &clap::ArgMatches, arg_id: &str, default: T) -> T {
    m.get_one::<T>(arg_id).cloned().filter(|_| m.value_source(arg_id) != Some(DefaultValue)).unwrap_or(default)
}
