//! Alias-keyed tables of local input queues and local output endpoints.

use crate::channel::queue::ChannelQueue;
use crate::channel::route_register::OutputEndpoint;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Channel alias to local queue. At most one queue ever exists per alias.
pub struct InputChannels {
    queue_capacity: usize,
    queues: DashMap<String, Arc<ChannelQueue>>,
}

impl InputChannels {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            queues: DashMap::new(),
        }
    }

    /// Creates the queue for `alias`. Returns `None` when one is already registered.
    pub fn register(&self, alias: &str) -> Option<Arc<ChannelQueue>> {
        match self.queues.entry(alias.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let queue = Arc::new(ChannelQueue::new(alias, self.queue_capacity));
                slot.insert(queue.clone());
                Some(queue)
            }
        }
    }

    pub fn get(&self, alias: &str) -> Option<Arc<ChannelQueue>> {
        self.queues.get(alias).map(|queue| queue.value().clone())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.queues.contains_key(alias)
    }

    /// Registered aliases in sorted order.
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.queues.iter().map(|e| e.key().clone()).collect();
        aliases.sort();
        aliases
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

/// Channel alias to the local endpoint that publishes on it.
#[derive(Default)]
pub struct OutputChannels {
    endpoints: DashMap<String, Arc<dyn OutputEndpoint>>,
}

impl OutputChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `endpoint` under its alias. Returns `false` when the alias is taken.
    pub fn register(&self, endpoint: Arc<dyn OutputEndpoint>) -> bool {
        match self.endpoints.entry(endpoint.alias().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(endpoint);
                true
            }
        }
    }

    pub fn get(&self, alias: &str) -> Option<Arc<dyn OutputEndpoint>> {
        self.endpoints.get(alias).map(|endpoint| endpoint.value().clone())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.endpoints.contains_key(alias)
    }

    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.endpoints.iter().map(|e| e.key().clone()).collect();
        aliases.sort();
        aliases
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{InputChannels, OutputChannels};
    use crate::channel::route_register::OutputEndpoint;
    use std::sync::Arc;

    struct NamedEndpoint(&'static str);

    impl OutputEndpoint for NamedEndpoint {
        fn alias(&self) -> &str {
            self.0
        }

        fn on_connect(&self, _address: &str) {}
    }

    #[test]
    fn input_register_is_idempotent_per_alias() {
        let inputs = InputChannels::new(4);

        let first = inputs.register("prices");
        let second = inputs.register("prices");

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(inputs.len(), 1);
        assert!(Arc::ptr_eq(&first.unwrap(), &inputs.get("prices").unwrap()));
    }

    #[test]
    fn aliases_are_sorted() {
        let inputs = InputChannels::new(4);
        inputs.register("zeta");
        inputs.register("alpha");

        assert_eq!(inputs.aliases(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn output_register_keeps_first_endpoint() {
        let outputs = OutputChannels::new();

        assert!(outputs.register(Arc::new(NamedEndpoint("updates"))));
        assert!(!outputs.register(Arc::new(NamedEndpoint("updates"))));
        assert!(outputs.contains("updates"));
        assert_eq!(outputs.len(), 1);
    }
}
