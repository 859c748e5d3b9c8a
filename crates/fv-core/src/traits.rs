//! # Core Traits (Ports)
//!
//! Any store plugin must implement `FleetStore` to be used by the engine.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{Deadline, DeadlineRow, DeadlineType, Machine, MachineDraft, NewDeadline};

/// Supplies the current calendar date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Persistence contract over the `machines`, `deadline_types` and
/// `deadlines` tables.
///
/// Identifiers are assigned by the store on insert. Update and delete report
/// a missing row as `None`/`false` rather than an error.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FleetStore: Send + Sync {
    // Machine Operations
    async fn list_machines(&self) -> anyhow::Result<Vec<Machine>>;
    async fn insert_machine(&self, draft: MachineDraft) -> anyhow::Result<Machine>;
    async fn update_machine(&self, machine: Machine) -> anyhow::Result<Option<Machine>>;
    /// Deletes the machine and every deadline it owns in one step.
    async fn delete_machine(&self, id: Uuid) -> anyhow::Result<bool>;

    // Deadline Type Operations
    async fn list_deadline_types(&self) -> anyhow::Result<Vec<DeadlineType>>;
    async fn insert_deadline_type(&self, name: String) -> anyhow::Result<DeadlineType>;
    async fn delete_deadline_type(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn count_deadlines_of_type(&self, type_id: Uuid) -> anyhow::Result<u64>;

    // Deadline Operations
    /// Deadlines joined with their type. `None` selects the whole fleet.
    async fn select_deadlines(&self, machine_id: Option<Uuid>) -> anyhow::Result<Vec<DeadlineRow>>;
    async fn insert_deadline(&self, deadline: NewDeadline) -> anyhow::Result<Deadline>;
    async fn update_deadline(&self, deadline: Deadline) -> anyhow::Result<Option<Deadline>>;
    async fn delete_deadline(&self, id: Uuid) -> anyhow::Result<bool>;
}
