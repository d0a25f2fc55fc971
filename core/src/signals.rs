use crate::{info, warn};
use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};

pub trait Shutdown {
    fn shutdown(self: &Arc<Self>);
}

/// Routes ctrl-c and termination signals to a [`Shutdown`] target. A third signal halts the process.
pub struct Signals<T: 'static + Shutdown + Send + Sync> {
    target: Weak<T>,
    iterations: AtomicU64,
}

impl<T: 'static + Shutdown + Send + Sync> Signals<T> {
    pub fn new(target: &Arc<T>) -> Signals<T> {
        Signals { target: Arc::downgrade(target), iterations: AtomicU64::new(0) }
    }

    pub fn init(self: &Arc<Self>) -> Result<(), ctrlc::Error> {
        let signals = self.clone();
        ctrlc::set_handler(move || {
            let iterations = signals.iterations.fetch_add(1, Ordering::SeqCst);
            if iterations > 1 {
                warn!("^SIGNAL - halting");
                std::process::exit(1);
            }

            info!("^SIGNAL - shutting down... (CTRL+C again to halt)");
            if let Some(target) = signals.target.upgrade() {
                target.shutdown();
            }
        })
    }
}
