//! Domain layer: entities and the nested-set codec
//!
//! This layer is independent of external concerns (no I/O, no SQL, no config loading).

pub mod entities;
pub mod error;
pub mod nested_set;
pub mod slug;

pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use nested_set::{Bounds, GapShift, MovePlan};
