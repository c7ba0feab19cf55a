use std::sync::Arc;

use crate::config::{Config, Layout};
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::daemon::Daemon;

/// Builder for a [`Daemon`].
pub struct DaemonBuilder {
    layout: Layout,
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl DaemonBuilder {
    /// Daemon over `layout` with default [`Config`] and no subscribers.
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            cfg: Config::default(),
            subscribers: Vec::new(),
        }
    }

    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Event subscribers (e.g. [`LogWriter`](crate::LogWriter)).
    ///
    /// Each gets its own bounded queue and worker.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Creates the bus and starts delivering events to the subscribers.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Daemon {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        Daemon::new_internal(self.cfg, self.layout, bus, subs)
    }
}
