//! Instances keyed by id, with exactly one active at a time.

use super::WorkflowInstance;
use crate::errors::WorkflowError;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

/// Holds workflow instances for one screen.
///
/// Whenever the registry is non-empty exactly one instance is active.
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    instances: BTreeMap<Uuid, WorkflowInstance>,
    active: Option<Uuid>,
}

impl WorkflowRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance and returns its id. The first instance becomes active.
    pub fn insert(&mut self, instance: WorkflowInstance) -> Uuid {
        let id = instance.id();
        info!(workflow = %instance.name(), %id, "Workflow registered");
        self.instances.insert(id, instance);
        if self.active.is_none() {
            self.active = Some(id);
        }
        id
    }

    /// Makes `id` the active instance.
    pub fn activate(&mut self, id: Uuid) -> Result<(), WorkflowError> {
        if !self.instances.contains_key(&id) {
            return Err(WorkflowError::WorkflowNotFound(id.to_string()));
        }
        self.active = Some(id);
        Ok(())
    }

    /// Returns the active instance id.
    #[must_use]
    pub fn active_id(&self) -> Option<Uuid> {
        self.active
    }

    /// Returns the active instance.
    #[must_use]
    pub fn active(&self) -> Option<&WorkflowInstance> {
        self.active.and_then(|id| self.instances.get(&id))
    }

    /// Returns the active instance mutably.
    pub fn active_mut(&mut self) -> Option<&mut WorkflowInstance> {
        self.active.and_then(|id| self.instances.get_mut(&id))
    }

    /// Returns an instance by id.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&WorkflowInstance> {
        self.instances.get(&id)
    }

    /// Returns an instance by id, mutably.
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut WorkflowInstance> {
        self.instances.get_mut(&id)
    }

    /// Removes an instance, cancelling its running tasks.
    ///
    /// If the active instance is removed, the remaining instance with the
    /// smallest id becomes active.
    pub fn remove(&mut self, id: Uuid) -> Option<WorkflowInstance> {
        let mut instance = self.instances.remove(&id)?;
        instance.cancel_all_tasks("workflow removed");
        if self.active == Some(id) {
            self.active = self.instances.keys().next().copied();
        }
        Some(instance)
    }

    /// Returns the number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if no instance is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Returns all instance ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.instances.keys().copied()
    }
}
