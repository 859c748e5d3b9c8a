//! # Domain Models
//!
//! These structs represent the core entities of Fleet Vitals.
//! Identifiers are UUID v7, assigned by the store on insert.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::schedule::{self, DeadlineStatus};

/// Display name used when a deadline's type cannot be resolved.
pub const UNKNOWN_TYPE_NAME: &str = "Unknown";

/// A piece of equipment in the fleet. Owns its deadlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: Uuid,
    pub name: String,
    /// Category, e.g. "Heavy", "Concrete", "Telescopic"
    #[serde(rename = "type")]
    pub machine_type: String,
    pub brand: Option<String>,
    pub model: String,
    pub plate_number: Option<String>,
    /// Free-form operational status, e.g. "Operational", "Under Maintenance"
    pub status: String,
}

/// Input for creating a machine. The store assigns the identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub machine_type: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub model: String,
    #[serde(default)]
    pub plate_number: Option<String>,
    pub status: String,
}

impl MachineDraft {
    /// Trims every field and rejects blank required ones.
    pub fn validate(self) -> Result<MachineDraft> {
        Ok(MachineDraft {
            name: required("name", &self.name)?,
            machine_type: required("type", &self.machine_type)?,
            brand: optional(self.brand),
            model: required("model", &self.model)?,
            plate_number: optional(self.plate_number),
            status: required("status", &self.status)?,
        })
    }

    pub fn into_machine(self, id: Uuid) -> Machine {
        Machine {
            id,
            name: self.name,
            machine_type: self.machine_type,
            brand: self.brand,
            model: self.model,
            plate_number: self.plate_number,
            status: self.status,
        }
    }
}

/// Partial edit of a machine. `None` leaves the field untouched;
/// a blank `brand`/`plate_number` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub machine_type: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub plate_number: Option<String>,
    pub status: Option<String>,
}

impl MachineUpdate {
    /// Produces the edited record without touching `current`.
    pub fn apply_to(&self, current: &Machine) -> Result<Machine> {
        let mut next = current.clone();
        if let Some(name) = &self.name {
            next.name = required("name", name)?;
        }
        if let Some(machine_type) = &self.machine_type {
            next.machine_type = required("type", machine_type)?;
        }
        if let Some(model) = &self.model {
            next.model = required("model", model)?;
        }
        if let Some(status) = &self.status {
            next.status = required("status", status)?;
        }
        if let Some(brand) = &self.brand {
            next.brand = optional(Some(brand.clone()));
        }
        if let Some(plate) = &self.plate_number {
            next.plate_number = optional(Some(plate.clone()));
        }
        Ok(next)
    }
}

/// Reference data naming a kind of recurring obligation (e.g. "Oil Change").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineType {
    pub id: Uuid,
    pub name: String,
}

/// A recurring obligation tied to one machine and one deadline type.
/// Due date, days remaining and tier are derived on read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    pub id: Uuid,
    pub machine_id: Uuid,
    pub type_id: Uuid,
    #[serde(rename = "date")]
    pub last_performed: NaiveDate,
    pub frequency_days: u32,
}

impl Deadline {
    pub fn due_date(&self) -> Result<NaiveDate> {
        schedule::compute_due_date(self.last_performed, i64::from(self.frequency_days))
    }

    pub fn status(&self, today: NaiveDate) -> Result<DeadlineStatus> {
        Ok(DeadlineStatus::evaluate(self.due_date()?, today))
    }
}

/// Raw deadline input as it arrives from a form or API call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineDraft {
    pub machine_id: Uuid,
    pub type_id: Uuid,
    /// Calendar date in `YYYY-MM-DD` form
    pub date: String,
    pub frequency_days: i64,
}

impl DeadlineDraft {
    /// Parses the date and checks the frequency. Foreign keys are resolved
    /// by the registry, not here.
    pub fn validate(&self) -> Result<NewDeadline> {
        let last_performed = schedule::parse_calendar_date(&self.date)?;
        let frequency_days = schedule::validate_frequency(self.frequency_days)?;
        // Reject inputs whose due date would fall off the calendar.
        schedule::compute_due_date(last_performed, i64::from(frequency_days))?;
        Ok(NewDeadline {
            machine_id: self.machine_id,
            type_id: self.type_id,
            last_performed,
            frequency_days,
        })
    }
}

/// A validated deadline ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeadline {
    pub machine_id: Uuid,
    pub type_id: Uuid,
    #[serde(rename = "date")]
    pub last_performed: NaiveDate,
    pub frequency_days: u32,
}

/// Partial edit of a deadline, typically a re-baseline after the work was done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineUpdate {
    pub date: Option<String>,
    pub frequency_days: Option<i64>,
}

impl DeadlineUpdate {
    pub fn apply_to(&self, current: &Deadline) -> Result<Deadline> {
        let mut next = current.clone();
        if let Some(date) = &self.date {
            next.last_performed = schedule::parse_calendar_date(date)?;
        }
        if let Some(frequency) = self.frequency_days {
            next.frequency_days = schedule::validate_frequency(frequency)?;
        }
        next.due_date()?;
        Ok(next)
    }
}

/// The joined deadline type as a relational store may return it: either a
/// single embedded object or a collection of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeJoin {
    One(JoinedTypeName),
    Many(Vec<JoinedTypeName>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedTypeName {
    pub name: String,
}

/// A deadline row from the `deadlines` → `deadline_types` join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineRow {
    pub id: Uuid,
    pub machine_id: Uuid,
    pub type_id: Uuid,
    #[serde(rename = "date")]
    pub last_performed: NaiveDate,
    pub frequency_days: u32,
    #[serde(default)]
    pub deadline_types: Option<TypeJoin>,
}

impl DeadlineRow {
    pub fn deadline(&self) -> Deadline {
        Deadline {
            id: self.id,
            machine_id: self.machine_id,
            type_id: self.type_id,
            last_performed: self.last_performed,
            frequency_days: self.frequency_days,
        }
    }
}

/// A deadline joined with its type's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadlineEntry {
    pub deadline: Deadline,
    pub type_name: Option<String>,
}

impl DeadlineEntry {
    /// The type's display name, or the "Unknown" placeholder.
    pub fn type_label(&self) -> &str {
        self.type_name.as_deref().unwrap_or(UNKNOWN_TYPE_NAME)
    }

    pub fn status(&self, today: NaiveDate) -> Result<DeadlineStatus> {
        self.deadline.status(today)
    }

    /// Plain-text digest shown next to a deadline indicator.
    pub fn summary(&self, today: NaiveDate) -> Result<String> {
        let status = self.status(today)?;
        Ok(format!(
            "{}\nLast performed: {}\nFrequency: {} days\nDue: {}\nRemaining: {} days",
            self.type_label().to_uppercase(),
            self.deadline.last_performed,
            self.deadline.frequency_days,
            status.due_date,
            status.days_remaining,
        ))
    }
}

fn required(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
