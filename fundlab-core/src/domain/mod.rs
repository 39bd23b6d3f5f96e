//! Domain types for fundlab

pub mod entity;
pub mod period;
pub mod snapshot;

pub use entity::{Entity, EntityId, EntityIdError, Market};
pub use period::Period;
pub use snapshot::{FinancialSnapshot, Indicator};
