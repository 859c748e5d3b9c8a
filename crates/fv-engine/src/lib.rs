//! # fv-engine
//!
//! Registries and reconciliation on top of a `FleetStore`, plus the
//! `FleetService` facade a UI or API shell talks to.

pub mod deadlines;
pub mod machines;
pub mod service;
pub mod sync;

pub use deadlines::{normalize_row, DeadlineRegistry};
pub use machines::MachineRegistry;
pub use service::{DeadlineView, FleetService, UpcomingItem};
pub use sync::{Keyed, LocalView};
