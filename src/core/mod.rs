//! Core types for the streamcore execution core.
//!
//! This module contains the foundational pieces that streams and modules are
//! built from:
//! - Content kinds and identifiers
//! - Parameters, parameter structures and configurable views
//! - Memory slots and scoped storage
//! - Error types

pub mod configurable;
pub mod error;
pub mod parameter;
pub mod random;
pub mod slot;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use configurable::Configurable;
pub use error::{ConfigurationError, CoreError, CoreResult, ModuleId};
pub use parameter::{ConfigDocument, Parameter, ParameterStructure, Provenance};
pub use slot::{Slot, SlotArray};
pub use storage::ScopedStorage;
pub use types::{Event, Object, PortDirection, PortId, TimeStamp, TypeTag};
