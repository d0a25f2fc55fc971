use crate::core::Core;
use std::{sync::Arc, thread::JoinHandle};

/// A long running component bound to [`Core`]. `start` spawns the service workers and
/// `stop` signals them to exit; [`Core::run`] joins the returned handles.
pub trait Service: Send + Sync {
    fn ident(self: Arc<Self>) -> &'static str;
    fn start(self: Arc<Self>, core: Arc<Core>) -> Vec<JoinHandle<()>>;
    fn stop(self: Arc<Self>);
}
