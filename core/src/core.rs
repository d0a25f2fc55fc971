use crate::service::Service;
use crate::signals::Shutdown;
use crate::{info, trace};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Core {
    pub keep_running: AtomicBool,
    services: Mutex<Vec<Arc<dyn Service>>>,
}

impl Default for Core {
    fn default() -> Self {
        Core { keep_running: AtomicBool::new(true), services: Mutex::new(Vec::new()) }
    }
}

impl Core {
    pub fn new() -> Core {
        Self::default()
    }

    pub fn bind<T>(&self, service: Arc<T>)
    where
        T: Service + 'static,
    {
        self.services.lock().push(service);
    }

    pub fn find(&self, ident: &'static str) -> Option<Arc<dyn Service>> {
        self.services.lock().iter().find(|s| (*s).clone().ident() == ident).cloned()
    }

    /// Starts all bound services and blocks until every worker thread has exited
    pub fn run(self: &Arc<Core>) {
        let services = self.services.lock().clone();
        let workers = services.into_iter().flat_map(|service| service.start(self.clone())).collect::<Vec<_>>();
        trace!("core is starting {} workers", workers.len());

        for worker in workers {
            if let Err(err) = worker.join() {
                info!("thread join failure: {:?}", err);
            }
        }

        // Drop all services and cleanup
        self.services.lock().clear();

        trace!("... core is shut down");
    }

    pub fn shutdown(self: &Arc<Core>) {
        if self.keep_running.swap(false, Ordering::SeqCst) {
            trace!("signaling core shutdown...");
            let services = self.services.lock().clone();
            for service in services.into_iter().rev() {
                let ident = service.clone().ident();
                trace!("shutting down: {}", ident);
                service.stop();
            }
            trace!("core is shutting down...");
        }
    }
}

impl Shutdown for Core {
    fn shutdown(self: &Arc<Self>) {
        self.shutdown();
    }
}
