//! Connection records produced by wiring.

use crate::core::error::{ConnectionId, ModuleId};
use crate::core::types::{PortDirection, PortId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An endpoint of a connection (module + port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// The module ID.
    pub module_id: ModuleId,
    /// Direction of the port on that module.
    pub direction: PortDirection,
    /// The port id on that module.
    pub port: PortId,
}

impl Endpoint {
    /// Endpoint on an output port.
    pub fn output(module_id: ModuleId, port: PortId) -> Self {
        Self {
            module_id,
            direction: PortDirection::Output,
            port,
        }
    }

    /// Endpoint on an input port.
    pub fn input(module_id: ModuleId, port: PortId) -> Self {
        Self {
            module_id,
            direction: PortDirection::Input,
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.module_id, self.direction, self.port)
    }
}

/// A connection from an output port to an input port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Unique identifier for this connection.
    pub id: ConnectionId,
    /// Source endpoint (output port).
    pub from: Endpoint,
    /// Target endpoint (input port). For fan-out ports this is the id the
    /// binding was registered under, not the id that was asked for.
    pub to: Endpoint,
}

impl Connection {
    /// Create a new connection.
    pub fn new(from: Endpoint, to: Endpoint) -> Self {
        Self {
            id: ConnectionId::new(),
            from,
            to,
        }
    }

    /// Create with a specific ID.
    pub fn with_id(mut self, id: ConnectionId) -> Self {
        self.id = id;
        self
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
