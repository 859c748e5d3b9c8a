//! # Deadline Registry
//!
//! Owns deadlines and the deadline-type reference data, and enforces that
//! every deadline points at an existing machine and an existing type.
//!
//! Read path contract: the store's `deadlines` → `deadline_types` join may
//! hand back the type as one object, a list, or nothing at all.
//! `normalize_row` collapses every shape into one optional name per
//! deadline; an unresolved type renders as the "Unknown" placeholder.

use std::sync::Arc;

use fv_core::error::{AppError, Result};
use fv_core::models::{
    DeadlineDraft, DeadlineEntry, DeadlineRow, DeadlineType, DeadlineUpdate, TypeJoin,
};
use fv_core::traits::FleetStore;
use uuid::Uuid;

use crate::machines::MachineRegistry;
use crate::sync::{self, LocalView};

const ENTITY: &str = "deadline";
const TYPE_ENTITY: &str = "deadline type";

pub struct DeadlineRegistry {
    store: Arc<dyn FleetStore>,
    types: LocalView<DeadlineType>,
    deadlines: LocalView<DeadlineEntry>,
}

/// Turns one joined row into a deadline with at most one type name.
pub fn normalize_row(row: DeadlineRow) -> DeadlineEntry {
    let type_name = match &row.deadline_types {
        None => None,
        Some(TypeJoin::One(joined)) => Some(joined.name.clone()),
        Some(TypeJoin::Many(joined)) => {
            if joined.len() > 1 {
                tracing::debug!(id = %row.id, matches = joined.len(), "join returned several types; using the first");
            }
            joined.first().map(|t| t.name.clone())
        }
    }
    .map(|name| name.trim().to_string())
    .filter(|name| !name.is_empty());

    DeadlineEntry { deadline: row.deadline(), type_name }
}

impl DeadlineRegistry {
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self { store, types: LocalView::new(), deadlines: LocalView::new() }
    }

    // ── Deadline types ──────────────────────────────────────────────────────

    pub async fn load_types(&mut self) -> Result<()> {
        let types = self.store.list_deadline_types().await.map_err(AppError::store)?;
        tracing::debug!(count = types.len(), "deadline types loaded");
        self.types.replace_all(types);
        Ok(())
    }

    pub fn types(&self) -> &[DeadlineType] {
        self.types.as_slice()
    }

    pub async fn add_type(&mut self, name: &str) -> Result<DeadlineType> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("deadline type name is required"));
        }
        if self.types.iter().any(|t| t.name.eq_ignore_ascii_case(&name)) {
            return Err(AppError::Conflict(format!("deadline type {name:?} already exists")));
        }

        let store = Arc::clone(&self.store);
        let created = sync::confirmed_insert(&mut self.types, TYPE_ENTITY, async move {
            store.insert_deadline_type(name).await
        })
        .await?;
        tracing::info!(id = %created.id, name = %created.name, "deadline type added");
        Ok(created)
    }

    /// Refuses to delete a type that deadlines still reference.
    pub async fn delete_type(&mut self, id: Uuid) -> Result<()> {
        if !self.types.contains(id) {
            return Err(AppError::NotFound(TYPE_ENTITY, id.to_string()));
        }
        let in_use = self.store.count_deadlines_of_type(id).await.map_err(AppError::store)?;
        if in_use > 0 {
            return Err(AppError::Conflict(format!(
                "deadline type {id} is referenced by {in_use} deadline(s)"
            )));
        }

        let store = Arc::clone(&self.store);
        sync::confirmed_delete(&mut self.types, TYPE_ENTITY, id, async move {
            store.delete_deadline_type(id).await
        })
        .await?;
        tracing::info!(%id, "deadline type deleted");
        Ok(())
    }

    // ── Deadlines ───────────────────────────────────────────────────────────

    /// Fetches a machine's deadlines through the type join and refreshes the
    /// local copy. On failure the local copy is left alone.
    pub async fn list_for_machine(&mut self, machine_id: Uuid) -> Result<Vec<DeadlineEntry>> {
        let rows = self
            .store
            .select_deadlines(Some(machine_id))
            .await
            .map_err(AppError::store)?;
        let fresh: LocalView<DeadlineEntry> = rows
            .into_iter()
            .filter(|row| row.machine_id == machine_id)
            .map(normalize_row)
            .collect();

        self.deadlines.retain(|e| e.deadline.machine_id != machine_id);
        for entry in fresh.iter() {
            self.deadlines.upsert(entry.clone());
        }
        tracing::debug!(%machine_id, count = fresh.len(), "deadlines listed");
        Ok(fresh.as_slice().to_vec())
    }

    /// Fetches the whole fleet's deadlines and replaces the local copy.
    pub async fn list_all(&mut self) -> Result<Vec<DeadlineEntry>> {
        let rows = self.store.select_deadlines(None).await.map_err(AppError::store)?;
        self.deadlines.replace_all(rows.into_iter().map(normalize_row));
        Ok(self.deadlines.as_slice().to_vec())
    }

    /// The local copy for one machine, without a store round-trip.
    pub fn cached_for_machine(&self, machine_id: Uuid) -> Vec<&DeadlineEntry> {
        self.deadlines
            .iter()
            .filter(|e| e.deadline.machine_id == machine_id)
            .collect()
    }

    pub fn get(&self, id: Uuid) -> Option<&DeadlineEntry> {
        self.deadlines.get(id)
    }

    /// Validates the input, resolves both foreign keys, then inserts.
    pub async fn add(&mut self, machines: &MachineRegistry, draft: &DeadlineDraft) -> Result<DeadlineEntry> {
        let new = draft.validate()?;
        if !machines.contains(new.machine_id) {
            return Err(AppError::Reference("machine", new.machine_id.to_string()));
        }
        let type_name = self
            .types
            .get(new.type_id)
            .map(|t| t.name.clone())
            .ok_or_else(|| AppError::Reference(TYPE_ENTITY, new.type_id.to_string()))?;

        let store = Arc::clone(&self.store);
        let entry = sync::confirmed_insert(&mut self.deadlines, ENTITY, async move {
            let deadline = store.insert_deadline(new).await?;
            Ok::<_, anyhow::Error>(DeadlineEntry { deadline, type_name: Some(type_name) })
        })
        .await?;
        tracing::info!(
            id = %entry.deadline.id,
            machine_id = %entry.deadline.machine_id,
            frequency_days = entry.deadline.frequency_days,
            "deadline added"
        );
        Ok(entry)
    }

    pub async fn update(&mut self, id: Uuid, update: &DeadlineUpdate) -> Result<DeadlineEntry> {
        let current = self
            .deadlines
            .get(id)
            .ok_or_else(|| AppError::NotFound(ENTITY, id.to_string()))?;
        let staged = DeadlineEntry {
            deadline: update.apply_to(&current.deadline)?,
            type_name: current.type_name.clone(),
        };

        let store = Arc::clone(&self.store);
        let write = staged.deadline.clone();
        let type_name = staged.type_name.clone();
        let entry = sync::optimistic_update(&mut self.deadlines, ENTITY, staged, async move {
            let confirmed = store.update_deadline(write).await?;
            Ok::<_, anyhow::Error>(confirmed.map(|deadline| DeadlineEntry { deadline, type_name }))
        })
        .await?;
        tracing::info!(%id, last_performed = %entry.deadline.last_performed, "deadline updated");
        Ok(entry)
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<()> {
        if !self.deadlines.contains(id) {
            return Err(AppError::NotFound(ENTITY, id.to_string()));
        }
        let store = Arc::clone(&self.store);
        sync::confirmed_delete(&mut self.deadlines, ENTITY, id, async move {
            store.delete_deadline(id).await
        })
        .await?;
        tracing::info!(%id, "deadline deleted");
        Ok(())
    }

    /// Drops every local deadline owned by `machine_id`. Called once the
    /// store has already cascaded the machine's deletion.
    pub(crate) fn forget_machine(&mut self, machine_id: Uuid) -> usize {
        self.deadlines.retain(|e| e.deadline.machine_id != machine_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fv_core::models::{JoinedTypeName, Machine};
    use fv_core::traits::MockFleetStore;

    fn row(machine_id: Uuid, join: Option<TypeJoin>) -> DeadlineRow {
        DeadlineRow {
            id: Uuid::now_v7(),
            machine_id,
            type_id: Uuid::now_v7(),
            last_performed: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            frequency_days: 180,
            deadline_types: join,
        }
    }

    fn named(name: &str) -> JoinedTypeName {
        JoinedTypeName { name: name.into() }
    }

    #[test]
    fn test_normalize_scalar_and_list_shapes_agree() {
        let machine_id = Uuid::now_v7();
        let scalar = normalize_row(row(machine_id, Some(TypeJoin::One(named("Torque Check")))));
        let list = normalize_row(row(machine_id, Some(TypeJoin::Many(vec![named("Torque Check")]))));
        assert_eq!(scalar.type_name.as_deref(), Some("Torque Check"));
        assert_eq!(list.type_name, scalar.type_name);
    }

    #[test]
    fn test_normalize_missing_type_is_unknown() {
        let machine_id = Uuid::now_v7();
        for join in [None, Some(TypeJoin::Many(vec![])), Some(TypeJoin::One(named("  ")))] {
            let entry = normalize_row(row(machine_id, join));
            assert_eq!(entry.type_name, None);
            assert_eq!(entry.type_label(), "Unknown");
        }
    }

    #[tokio::test]
    async fn test_list_for_machine_does_not_duplicate_rows() {
        let machine_id = Uuid::now_v7();
        let first = row(machine_id, Some(TypeJoin::Many(vec![named("Gas Certificate"), named("Other")])));
        let repeated = first.clone();

        let mut store = MockFleetStore::new();
        store
            .expect_select_deadlines()
            .returning(move |_| Ok(vec![first.clone(), repeated.clone()]));

        let mut registry = DeadlineRegistry::new(Arc::new(store));
        let listed = registry.list_for_machine(machine_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].type_label(), "Gas Certificate");
        assert_eq!(registry.cached_for_machine(machine_id).len(), 1);
    }

    #[tokio::test]
    async fn test_blank_type_name_never_reaches_store() {
        let mut store = MockFleetStore::new();
        store.expect_insert_deadline_type().never();

        let mut registry = DeadlineRegistry::new(Arc::new(store));
        for name in ["", "   ", "\t\n"] {
            let err = registry.add_type(name).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{name:?} gave {err:?}");
        }
        assert!(registry.types().is_empty());
    }

    #[tokio::test]
    async fn test_add_with_unknown_machine_is_reference_error() {
        let type_id = Uuid::now_v7();
        let mut store = MockFleetStore::new();
        store.expect_list_machines().returning(|| Ok(Vec::<Machine>::new()));
        store
            .expect_list_deadline_types()
            .returning(move || Ok(vec![DeadlineType { id: type_id, name: "Oil Change".into() }]));
        store.expect_insert_deadline().never();

        let store: Arc<dyn FleetStore> = Arc::new(store);
        let mut machines = MachineRegistry::new(Arc::clone(&store));
        machines.load().await.unwrap();
        let mut registry = DeadlineRegistry::new(store);
        registry.load_types().await.unwrap();

        let draft = DeadlineDraft {
            machine_id: Uuid::now_v7(),
            type_id,
            date: "2024-01-01".into(),
            frequency_days: 180,
        };
        let err = registry.add(&machines, &draft).await.unwrap_err();
        assert!(matches!(err, AppError::Reference("machine", _)));
        assert!(registry.cached_for_machine(draft.machine_id).is_empty());
    }

    #[tokio::test]
    async fn test_delete_referenced_type_is_rejected() {
        let type_id = Uuid::now_v7();
        let mut store = MockFleetStore::new();
        store
            .expect_list_deadline_types()
            .returning(move || Ok(vec![DeadlineType { id: type_id, name: "Torque Check".into() }]));
        store.expect_count_deadlines_of_type().returning(|_| Ok(2));
        store.expect_delete_deadline_type().never();

        let mut registry = DeadlineRegistry::new(Arc::new(store));
        registry.load_types().await.unwrap();

        let err = registry.delete_type(type_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(registry.types().len(), 1);
    }
}
