//! Wiring between modules.
//!
//! The core does not own a graph or a scheduler. These helpers connect the
//! input ports of a downstream module to the output ports of an upstream
//! module and return records of what was connected.

pub mod connection;
pub mod wiring;

pub use connection::{Connection, Endpoint};
pub use wiring::{connect_matching_ids, connect_ports};
