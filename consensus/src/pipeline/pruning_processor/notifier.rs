use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::RwLock;
use tangle_consensus_core::notify::PruningNotification;

pub type PruningListener = Box<dyn Fn(&PruningNotification) + Send + Sync>;

/// Delivers pruning notifications synchronously, first to the registered listeners and then to the
/// channel subscribers, each in registration order. Subscribers whose receiver was dropped are removed.
#[derive(Default)]
pub struct PruningNotifier {
    listeners: RwLock<Vec<PruningListener>>,
    subscribers: RwLock<Vec<Sender<PruningNotification>>>,
}

impl PruningNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_listener<F>(&self, listener: F)
    where
        F: Fn(&PruningNotification) + Send + Sync + 'static,
    {
        self.listeners.write().push(Box::new(listener));
    }

    pub fn subscribe(&self) -> Receiver<PruningNotification> {
        let (sender, receiver) = unbounded();
        self.subscribers.write().push(sender);
        receiver
    }

    pub fn notify(&self, notification: PruningNotification) {
        for listener in self.listeners.read().iter() {
            listener(&notification);
        }
        self.subscribers.write().retain(|subscriber| subscriber.send(notification.clone()).is_ok());
    }
}
