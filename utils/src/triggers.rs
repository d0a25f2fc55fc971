pub use triggered::{Listener, Trigger};

/// Wrapper containing a single Trigger instance
#[derive(Debug, Clone)]
pub struct SingleTrigger {
    pub trigger: Trigger,
    pub listener: Listener,
}

impl SingleTrigger {
    pub fn new() -> SingleTrigger {
        let (trigger, listener) = triggered::trigger();
        SingleTrigger { trigger, listener }
    }

    /// Fires the trigger. All current and future listener clones observe it.
    pub fn fire(&self) {
        self.trigger.trigger();
    }

    pub fn is_fired(&self) -> bool {
        self.listener.is_triggered()
    }
}

impl Default for SingleTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_trigger_clones_share_state() {
        let shutdown = SingleTrigger::new();
        let listener = shutdown.listener.clone();
        assert!(!listener.is_triggered());
        shutdown.fire();
        assert!(listener.is_triggered());
        assert!(shutdown.is_fired());
    }
}
