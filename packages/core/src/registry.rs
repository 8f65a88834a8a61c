//! Instance registry.
//!
//! Owned by `main`: built once at startup from configuration and drained
//! at shutdown. Consumers receive the coordinator or trigger explicitly
//! instead of looking it up from ambient state.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::coordinator::RefreshCoordinator;
use crate::trigger::ManualRefresh;

/// One configured provider: its coordinator and force-refresh action.
pub struct RatesInstance {
    pub coordinator: Arc<RefreshCoordinator>,
    pub trigger: ManualRefresh,
}

impl RatesInstance {
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        let trigger = ManualRefresh::new(Arc::clone(&coordinator));
        Self { coordinator, trigger }
    }

    pub fn instance_id(&self) -> &str {
        self.coordinator.instance_id()
    }
}

#[derive(Default)]
pub struct InstanceRegistry {
    instances: BTreeMap<String, Arc<RatesInstance>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance, replacing any previous one with the same id.
    pub fn insert(&mut self, instance: RatesInstance) -> Arc<RatesInstance> {
        let instance = Arc::new(instance);
        if self
            .instances
            .insert(instance.instance_id().to_string(), Arc::clone(&instance))
            .is_some()
        {
            tracing::warn!("Replaced existing instance {}", instance.instance_id());
        }
        instance
    }

    pub fn get(&self, instance_id: &str) -> Option<Arc<RatesInstance>> {
        self.instances.get(instance_id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RatesInstance>> {
        self.instances.values()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Remove every instance, handing them back for teardown.
    pub fn drain(&mut self) -> Vec<Arc<RatesInstance>> {
        std::mem::take(&mut self.instances).into_values().collect()
    }
}
