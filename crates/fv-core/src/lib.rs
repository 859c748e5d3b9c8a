//! fleet-vitals/crates/fv-core/src/lib.rs
//!
//! The domain model, due-date rules and port definitions for Fleet Vitals.

pub mod clock;
pub mod error;
pub mod models;
pub mod schedule;
pub mod traits;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use error::*;
pub use models::*;
pub use schedule::*;
pub use traits::*;
