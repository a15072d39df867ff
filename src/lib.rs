//! # Streamcore - Execution core of a modular stream-processing framework
//!
//! Streamcore provides the building blocks of a processing graph whose nodes
//! ("modules") exchange typed, timestamped data over explicit ports
//! ("streams"), re-evaluated once per discrete step.
//!
//! ## Features
//!
//! - **Typed ports**: every stream carries a content kind; connections between
//!   different kinds fail at wiring time and every read is a checked downcast
//! - **Fan-out ports**: a port over a fixed-capacity slot array accepts one
//!   producer per slot, growing the module's port registry on demand
//! - **Validated parameters**: out-of-range configuration fails construction,
//!   never silently clamped
//! - **Serialization**: streams and modules round-trip through JSON, with
//!   images written to a scoped storage directory
//! - **Reproducible randomization**: seeded synthetic content for fuzzing
//!   chains of modules
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use streamcore::prelude::*;
//!
//! let config = ConfigDocument::new();
//! let mut a = FakeModule::new("a", &config)?;
//! let mut b = FakeModule::new("b", &config)?;
//!
//! // Pair each input of b with the output of a that has the same id
//! connect_matching_ids(&a, &mut b)?;
//!
//! let mut seed = 42;
//! for _ in 0..10 {
//!     a.process_random_input(&mut seed)?;
//!     b.convert_inputs()?;
//!     b.process_frame()?;
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: content kinds, parameters, slots, storage and errors
//! - [`stream`]: the [`Stream`](stream::Stream) port interface and its
//!   concrete kinds
//! - [`module`]: the [`Module`](module::Module) trait and port registries
//! - [`graph`]: wiring helpers and connection records
//! - [`testing`]: a module exposing every content kind, for tests and demos

#![warn(clippy::all)]

pub mod core;
pub mod graph;
pub mod module;
pub mod stream;
pub mod testing;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use streamcore::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{
        Event, Object, PortDirection, PortId, TimeStamp, TypeTag, TIME_STAMP_MIN,
    };

    // Errors
    pub use crate::core::error::{
        ConfigResult, ConfigurationError, ConnectionId, CoreError, CoreResult, ModuleId,
    };

    // Parameters
    pub use crate::core::configurable::Configurable;
    pub use crate::core::parameter::{
        ConfigDocument, Parameter, ParameterStructure, ParameterType, ParameterValue, Provenance,
        Range,
    };

    // Slots and storage
    pub use crate::core::slot::{Slot, SlotArray};
    pub use crate::core::storage::ScopedStorage;

    // Streams
    pub use crate::stream::render::Canvas;
    pub use crate::stream::{
        MultiStreamT, PortDescriptor, Requirement, Scalar, Stream, StreamContent, StreamNum,
        StreamSource, StreamT, PLOT_LENGTH,
    };

    // Modules
    pub use crate::module::{Module, ModuleBase, ModuleDescriptor, PortMap};

    // Wiring
    pub use crate::graph::{connect_matching_ids, connect_ports, Connection, Endpoint};

    // Test support
    pub use crate::testing::{stream_of, FakeModule, FAN_OUT_PORT};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "streamcore");
    }

    #[test]
    fn test_prelude_builds_a_chain() {
        let mut config = ConfigDocument::new();
        config.insert("width".to_string(), serde_json::json!(4));
        config.insert("height".to_string(), serde_json::json!(4));
        let a = FakeModule::new("a", &config).unwrap();
        let mut b = FakeModule::new("b", &config).unwrap();
        let connections = connect_matching_ids(&a, &mut b).unwrap();
        assert_eq!(connections.len(), b.outputs().len());
        assert!(b.convert_inputs().is_ok());
    }
}
