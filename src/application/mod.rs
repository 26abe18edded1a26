//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on storage boundary traits.

pub mod error;
pub mod error_ext;
pub mod registry;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::StoreResultExt;
pub use registry::{RootDefinition, RootRegistry};
