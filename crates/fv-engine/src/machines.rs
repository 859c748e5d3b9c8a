//! # Machine Registry
//!
//! Owns the machine records. Deleting a machine cascades into the
//! `DeadlineRegistry`.

use std::sync::Arc;

use fv_core::error::{AppError, Result};
use fv_core::models::{Machine, MachineDraft, MachineUpdate};
use fv_core::traits::FleetStore;
use uuid::Uuid;

use crate::deadlines::DeadlineRegistry;
use crate::sync::{self, LocalView};

const ENTITY: &str = "machine";

pub struct MachineRegistry {
    store: Arc<dyn FleetStore>,
    view: LocalView<Machine>,
}

impl MachineRegistry {
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self { store, view: LocalView::new() }
    }

    /// Replaces the local view with the store's current contents.
    pub async fn load(&mut self) -> Result<()> {
        let machines = self.store.list_machines().await.map_err(AppError::store)?;
        tracing::debug!(count = machines.len(), "machines loaded");
        self.view.replace_all(machines);
        Ok(())
    }

    /// Machines in insertion order.
    pub fn list(&self) -> &[Machine] {
        self.view.as_slice()
    }

    pub fn get(&self, id: Uuid) -> Option<&Machine> {
        self.view.get(id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.view.contains(id)
    }

    pub async fn add(&mut self, draft: MachineDraft) -> Result<Machine> {
        let draft = draft.validate()?;
        let store = Arc::clone(&self.store);
        let machine = sync::confirmed_insert(&mut self.view, ENTITY, async move {
            store.insert_machine(draft).await
        })
        .await?;
        tracing::info!(id = %machine.id, name = %machine.name, "machine added");
        Ok(machine)
    }

    pub async fn update(&mut self, id: Uuid, update: &MachineUpdate) -> Result<Machine> {
        let current = self
            .view
            .get(id)
            .ok_or_else(|| AppError::NotFound(ENTITY, id.to_string()))?;
        let staged = update.apply_to(current)?;

        let store = Arc::clone(&self.store);
        let write = staged.clone();
        let machine = sync::optimistic_update(&mut self.view, ENTITY, staged, async move {
            store.update_machine(write).await
        })
        .await?;
        tracing::info!(id = %machine.id, "machine updated");
        Ok(machine)
    }

    /// Deletes the machine and every deadline it owns. Nothing is removed
    /// locally until the store confirms. Returns how many deadlines went
    /// with it.
    pub async fn delete(&mut self, id: Uuid, deadlines: &mut DeadlineRegistry) -> Result<usize> {
        if !self.view.contains(id) {
            return Err(AppError::NotFound(ENTITY, id.to_string()));
        }

        let store = Arc::clone(&self.store);
        sync::confirmed_delete(&mut self.view, ENTITY, id, async move {
            store.delete_machine(id).await
        })
        .await?;
        let cascaded = deadlines.forget_machine(id);

        tracing::info!(%id, cascaded, "machine deleted");
        Ok(cascaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_core::traits::MockFleetStore;

    fn machine(name: &str) -> Machine {
        Machine {
            id: Uuid::now_v7(),
            name: name.into(),
            machine_type: "Heavy".into(),
            brand: None,
            model: "420F".into(),
            plate_number: None,
            status: "Operational".into(),
        }
    }

    #[tokio::test]
    async fn test_update_failure_keeps_previous_fields() {
        let existing = machine("CAT Backhoe Loader");
        let listed = existing.clone();

        let mut store = MockFleetStore::new();
        store.expect_list_machines().returning(move || Ok(vec![listed.clone()]));
        store
            .expect_update_machine()
            .returning(|_| Err(anyhow::anyhow!("store unavailable")));

        let mut registry = MachineRegistry::new(Arc::new(store));
        registry.load().await.unwrap();

        let update = MachineUpdate { status: Some("Under Maintenance".into()), ..Default::default() };
        let err = registry.update(existing.id, &update).await.unwrap_err();

        assert!(matches!(err, AppError::Store(_)));
        assert_eq!(registry.get(existing.id), Some(&existing));
    }

    #[tokio::test]
    async fn test_update_unknown_machine_is_not_found() {
        let mut store = MockFleetStore::new();
        store.expect_update_machine().never();

        let mut registry = MachineRegistry::new(Arc::new(store));
        let err = registry
            .update(Uuid::now_v7(), &MachineUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("machine", _)));
    }

    #[tokio::test]
    async fn test_add_rejects_blank_name_before_store_call() {
        let mut store = MockFleetStore::new();
        store.expect_insert_machine().never();

        let mut registry = MachineRegistry::new(Arc::new(store));
        let draft = MachineDraft {
            name: String::new(),
            machine_type: "Heavy".into(),
            model: "420F".into(),
            status: "Operational".into(),
            ..Default::default()
        };
        let err = registry.add(draft).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_machine() {
        let existing = machine("Manitou Telehandler");
        let listed = existing.clone();

        let mut store = MockFleetStore::new();
        store.expect_list_machines().returning(move || Ok(vec![listed.clone()]));
        store
            .expect_delete_machine()
            .returning(|_| Err(anyhow::anyhow!("foreign key check failed")));

        let store: Arc<dyn FleetStore> = Arc::new(store);
        let mut registry = MachineRegistry::new(Arc::clone(&store));
        let mut deadlines = DeadlineRegistry::new(store);
        registry.load().await.unwrap();

        let err = registry.delete(existing.id, &mut deadlines).await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert!(registry.contains(existing.id));
    }
}
