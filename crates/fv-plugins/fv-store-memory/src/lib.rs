//! # fv-store-memory
//!
//! In-process implementation of `FleetStore`.
//! Behaves like the relational store: ids assigned on insert, foreign keys
//! checked, machine deletion cascades, referenced types cannot be deleted.
//! Joined types come back in the list shape. Failures can be injected per
//! operation to exercise the engine's rollback paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context};
use async_trait::async_trait;
use fv_core::models::{
    Deadline, DeadlineRow, DeadlineType, JoinedTypeName, Machine, MachineDraft, NewDeadline, TypeJoin,
};
use fv_core::traits::FleetStore;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListMachines,
    InsertMachine,
    UpdateMachine,
    DeleteMachine,
    ListDeadlineTypes,
    InsertDeadlineType,
    DeleteDeadlineType,
    CountDeadlinesOfType,
    SelectDeadlines,
    InsertDeadline,
    UpdateDeadline,
    DeleteDeadline,
}

#[derive(Default)]
struct Tables {
    machines: Vec<Machine>,
    deadline_types: Vec<DeadlineType>,
    deadlines: Vec<Deadline>,
}

#[derive(Default)]
pub struct MemoryFleetStore {
    tables: RwLock<Tables>,
    offline: AtomicBool,
    failing: RwLock<HashSet<StoreOp>>,
}

impl MemoryFleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes `op` fail until `recover` is called for it.
    pub async fn fail(&self, op: StoreOp) {
        self.failing.write().await.insert(op);
    }

    pub async fn recover(&self, op: StoreOp) {
        self.failing.write().await.remove(&op);
    }

    /// Total deadline rows, orphans included. Used to check cascades.
    pub async fn deadline_count(&self) -> usize {
        self.tables.read().await.deadlines.len()
    }

    async fn check(&self, op: StoreOp) -> anyhow::Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("store unreachable");
        }
        if self.failing.read().await.contains(&op) {
            tracing::debug!(?op, "injecting store failure");
            bail!("injected failure for {op:?}");
        }
        Ok(())
    }
}

#[async_trait]
impl FleetStore for MemoryFleetStore {
    async fn list_machines(&self) -> anyhow::Result<Vec<Machine>> {
        self.check(StoreOp::ListMachines).await?;
        Ok(self.tables.read().await.machines.clone())
    }

    async fn insert_machine(&self, draft: MachineDraft) -> anyhow::Result<Machine> {
        self.check(StoreOp::InsertMachine).await?;
        let machine = draft.into_machine(Uuid::now_v7());
        self.tables.write().await.machines.push(machine.clone());
        Ok(machine)
    }

    async fn update_machine(&self, machine: Machine) -> anyhow::Result<Option<Machine>> {
        self.check(StoreOp::UpdateMachine).await?;
        let mut tables = self.tables.write().await;
        let Some(slot) = tables.machines.iter_mut().find(|m| m.id == machine.id) else {
            return Ok(None);
        };
        *slot = machine.clone();
        Ok(Some(machine))
    }

    async fn delete_machine(&self, id: Uuid) -> anyhow::Result<bool> {
        self.check(StoreOp::DeleteMachine).await?;
        let mut tables = self.tables.write().await;
        let before = tables.machines.len();
        tables.machines.retain(|m| m.id != id);
        if tables.machines.len() == before {
            return Ok(false);
        }
        tables.deadlines.retain(|d| d.machine_id != id);
        Ok(true)
    }

    async fn list_deadline_types(&self) -> anyhow::Result<Vec<DeadlineType>> {
        self.check(StoreOp::ListDeadlineTypes).await?;
        Ok(self.tables.read().await.deadline_types.clone())
    }

    async fn insert_deadline_type(&self, name: String) -> anyhow::Result<DeadlineType> {
        self.check(StoreOp::InsertDeadlineType).await?;
        let created = DeadlineType { id: Uuid::now_v7(), name };
        self.tables.write().await.deadline_types.push(created.clone());
        Ok(created)
    }

    async fn delete_deadline_type(&self, id: Uuid) -> anyhow::Result<bool> {
        self.check(StoreOp::DeleteDeadlineType).await?;
        let mut tables = self.tables.write().await;
        if tables.deadlines.iter().any(|d| d.type_id == id) {
            bail!("deadline type {id} is still referenced");
        }
        let before = tables.deadline_types.len();
        tables.deadline_types.retain(|t| t.id != id);
        Ok(tables.deadline_types.len() != before)
    }

    async fn count_deadlines_of_type(&self, type_id: Uuid) -> anyhow::Result<u64> {
        self.check(StoreOp::CountDeadlinesOfType).await?;
        let tables = self.tables.read().await;
        let count = tables.deadlines.iter().filter(|d| d.type_id == type_id).count();
        u64::try_from(count).context("deadline count overflow")
    }

    async fn select_deadlines(&self, machine_id: Option<Uuid>) -> anyhow::Result<Vec<DeadlineRow>> {
        self.check(StoreOp::SelectDeadlines).await?;
        let tables = self.tables.read().await;
        let rows = tables
            .deadlines
            .iter()
            .filter(|d| machine_id.map_or(true, |id| d.machine_id == id))
            .map(|d| {
                let joined: Vec<JoinedTypeName> = tables
                    .deadline_types
                    .iter()
                    .filter(|t| t.id == d.type_id)
                    .map(|t| JoinedTypeName { name: t.name.clone() })
                    .collect();
                DeadlineRow {
                    id: d.id,
                    machine_id: d.machine_id,
                    type_id: d.type_id,
                    last_performed: d.last_performed,
                    frequency_days: d.frequency_days,
                    deadline_types: (!joined.is_empty()).then_some(TypeJoin::Many(joined)),
                }
            })
            .collect();
        Ok(rows)
    }

    async fn insert_deadline(&self, deadline: NewDeadline) -> anyhow::Result<Deadline> {
        self.check(StoreOp::InsertDeadline).await?;
        let mut tables = self.tables.write().await;
        if !tables.machines.iter().any(|m| m.id == deadline.machine_id) {
            bail!("foreign key violation: machine {} does not exist", deadline.machine_id);
        }
        if !tables.deadline_types.iter().any(|t| t.id == deadline.type_id) {
            bail!("foreign key violation: deadline type {} does not exist", deadline.type_id);
        }
        let created = Deadline {
            id: Uuid::now_v7(),
            machine_id: deadline.machine_id,
            type_id: deadline.type_id,
            last_performed: deadline.last_performed,
            frequency_days: deadline.frequency_days,
        };
        tables.deadlines.push(created.clone());
        Ok(created)
    }

    async fn update_deadline(&self, deadline: Deadline) -> anyhow::Result<Option<Deadline>> {
        self.check(StoreOp::UpdateDeadline).await?;
        let mut tables = self.tables.write().await;
        let Some(slot) = tables.deadlines.iter_mut().find(|d| d.id == deadline.id) else {
            return Ok(None);
        };
        *slot = deadline.clone();
        Ok(Some(deadline))
    }

    async fn delete_deadline(&self, id: Uuid) -> anyhow::Result<bool> {
        self.check(StoreOp::DeleteDeadline).await?;
        let mut tables = self.tables.write().await;
        let before = tables.deadlines.len();
        tables.deadlines.retain(|d| d.id != id);
        Ok(tables.deadlines.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn draft(name: &str) -> MachineDraft {
        MachineDraft {
            name: name.into(),
            machine_type: "Concrete".into(),
            model: "HTM 604".into(),
            status: "Operational".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_delete_machine_cascades() {
        let store = MemoryFleetStore::new();
        let machine = store.insert_machine(draft("Liebherr Concrete Mixer")).await.unwrap();
        let kind = store.insert_deadline_type("Gas Certificate".into()).await.unwrap();
        store
            .insert_deadline(NewDeadline {
                machine_id: machine.id,
                type_id: kind.id,
                last_performed: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                frequency_days: 365,
            })
            .await
            .unwrap();

        assert!(store.delete_machine(machine.id).await.unwrap());
        assert_eq!(store.deadline_count().await, 0);
        assert!(!store.delete_machine(machine.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_deadline_checks_foreign_keys() {
        let store = MemoryFleetStore::new();
        let result = store
            .insert_deadline(NewDeadline {
                machine_id: Uuid::now_v7(),
                type_id: Uuid::now_v7(),
                last_performed: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                frequency_days: 30,
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.deadline_count().await, 0);
    }

    #[tokio::test]
    async fn test_injected_failure_and_recovery() {
        let store = MemoryFleetStore::new();
        store.fail(StoreOp::InsertMachine).await;
        assert!(store.insert_machine(draft("A")).await.is_err());
        store.recover(StoreOp::InsertMachine).await;
        assert!(store.insert_machine(draft("A")).await.is_ok());

        store.set_offline(true);
        assert!(store.list_machines().await.is_err());
    }
}
