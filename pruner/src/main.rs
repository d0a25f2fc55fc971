use std::{process::exit, sync::Arc};
use tangle_core::{info, signals::Signals, warn};
use tangle_pruner_lib::{
    args::parse_args,
    daemon::{Runtime, create_core},
};

pub fn main() {
    let args = parse_args();

    let runtime = match Runtime::from_args(&args) {
        Ok(runtime) => runtime,
        Err(err) => {
            println!("{}", err);
            exit(1);
        }
    };

    let core = match create_core(&runtime, &args) {
        Ok(core) => core,
        Err(err) => {
            println!("{}", err);
            exit(1);
        }
    };

    // Bind the keyboard signal to the core
    if let Err(err) = Arc::new(Signals::new(&core)).init() {
        warn!("Unable to install the signal handler: {}", err);
    }

    core.run();
    info!("Pruner has stopped...");
}
