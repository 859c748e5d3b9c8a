//! # FleetService
//!
//! The operations a UI or API shell calls. Each returns a success payload or
//! one `AppError`. Urgency is derived from the clock on every read and
//! never cached.

use std::sync::Arc;

use chrono::NaiveDate;
use fv_core::error::{AppError, Result};
use fv_core::models::{
    DeadlineDraft, DeadlineEntry, DeadlineType, DeadlineUpdate, Machine, MachineDraft, MachineUpdate,
};
use fv_core::schedule::{DeadlineStatus, UrgencyTier};
use fv_core::traits::{Clock, FleetStore};
use serde::Serialize;
use uuid::Uuid;

use crate::deadlines::DeadlineRegistry;
use crate::machines::MachineRegistry;

/// A deadline plus its status as of the moment it was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadlineView {
    #[serde(flatten)]
    pub entry: DeadlineEntry,
    pub status: DeadlineStatus,
}

/// One line of the fleet-wide "upcoming maintenance" report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingItem {
    pub machine_id: Uuid,
    pub machine_name: String,
    #[serde(flatten)]
    pub deadline: DeadlineView,
}

pub struct FleetService {
    machines: MachineRegistry,
    deadlines: DeadlineRegistry,
    clock: Arc<dyn Clock>,
}

impl FleetService {
    /// Builds the service and loads machines, deadline types and deadlines.
    pub async fn open(store: Arc<dyn FleetStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut machines = MachineRegistry::new(Arc::clone(&store));
        let mut deadlines = DeadlineRegistry::new(store);
        machines.load().await?;
        deadlines.load_types().await?;
        deadlines.list_all().await?;

        tracing::info!(
            machines = machines.list().len(),
            deadline_types = deadlines.types().len(),
            "fleet loaded"
        );
        Ok(Self { machines, deadlines, clock })
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // ── Machines ────────────────────────────────────────────────────────────

    pub fn list_machines(&self) -> &[Machine] {
        self.machines.list()
    }

    pub async fn add_machine(&mut self, draft: MachineDraft) -> Result<Machine> {
        self.machines.add(draft).await
    }

    pub async fn update_machine(&mut self, id: Uuid, update: &MachineUpdate) -> Result<Machine> {
        self.machines.update(id, update).await
    }

    /// Removes the machine together with every deadline it owns.
    pub async fn delete_machine(&mut self, id: Uuid) -> Result<()> {
        self.machines.delete(id, &mut self.deadlines).await.map(|_| ())
    }

    /// Most severe tier among the machine's deadlines, from the local copy.
    /// `None` when the machine has no deadlines.
    pub fn machine_health(&self, id: Uuid) -> Result<Option<UrgencyTier>> {
        if !self.machines.contains(id) {
            return Err(AppError::NotFound("machine", id.to_string()));
        }
        let today = self.today();
        let mut worst = None;
        for entry in self.deadlines.cached_for_machine(id) {
            let tier = entry.status(today)?.tier;
            worst = worst.max(Some(tier));
        }
        Ok(worst)
    }

    // ── Deadline types ──────────────────────────────────────────────────────

    pub fn list_deadline_types(&self) -> &[DeadlineType] {
        self.deadlines.types()
    }

    pub async fn add_deadline_type(&mut self, name: &str) -> Result<DeadlineType> {
        self.deadlines.add_type(name).await
    }

    pub async fn delete_deadline_type(&mut self, id: Uuid) -> Result<()> {
        self.deadlines.delete_type(id).await
    }

    // ── Deadlines ───────────────────────────────────────────────────────────

    pub async fn list_deadlines(&mut self, machine_id: Uuid) -> Result<Vec<DeadlineView>> {
        if !self.machines.contains(machine_id) {
            return Err(AppError::NotFound("machine", machine_id.to_string()));
        }
        let today = self.today();
        self.deadlines
            .list_for_machine(machine_id)
            .await?
            .into_iter()
            .map(|entry| view(entry, today))
            .collect()
    }

    pub async fn add_deadline(
        &mut self,
        machine_id: Uuid,
        type_id: Uuid,
        date: &str,
        frequency_days: i64,
    ) -> Result<DeadlineView> {
        let draft = DeadlineDraft { machine_id, type_id, date: date.to_string(), frequency_days };
        let entry = self.deadlines.add(&self.machines, &draft).await?;
        view(entry, self.today())
    }

    pub async fn update_deadline(&mut self, id: Uuid, update: &DeadlineUpdate) -> Result<DeadlineView> {
        let entry = self.deadlines.update(id, update).await?;
        view(entry, self.today())
    }

    /// Re-baselines a deadline: the work was done on `date`.
    pub async fn record_performed(&mut self, id: Uuid, date: &str) -> Result<DeadlineView> {
        let update = DeadlineUpdate { date: Some(date.to_string()), frequency_days: None };
        self.update_deadline(id, &update).await
    }

    pub async fn delete_deadline(&mut self, id: Uuid) -> Result<()> {
        self.deadlines.delete(id).await
    }

    /// Every deadline due within `horizon_days` (overdue included), most
    /// urgent first.
    pub async fn upcoming(&mut self, horizon_days: i64) -> Result<Vec<UpcomingItem>> {
        let today = self.today();
        let entries = self.deadlines.list_all().await?;

        let mut items = Vec::new();
        for entry in entries {
            let Some(machine) = self.machines.get(entry.deadline.machine_id) else {
                tracing::warn!(id = %entry.deadline.id, "deadline owned by an unlisted machine; skipped");
                continue;
            };
            let deadline = view(entry, today)?;
            if deadline.status.days_remaining <= horizon_days {
                items.push(UpcomingItem {
                    machine_id: machine.id,
                    machine_name: machine.name.clone(),
                    deadline,
                });
            }
        }
        items.sort_by(|a, b| {
            a.deadline
                .status
                .days_remaining
                .cmp(&b.deadline.status.days_remaining)
                .then_with(|| a.machine_name.cmp(&b.machine_name))
        });
        Ok(items)
    }
}

fn view(entry: DeadlineEntry, today: NaiveDate) -> Result<DeadlineView> {
    let status = entry.status(today)?;
    Ok(DeadlineView { entry, status })
}
