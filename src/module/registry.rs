//! Port registry of a module, one per direction.

use crate::core::error::{ConfigurationError, CoreError, CoreResult};
use crate::core::types::{PortDirection, PortId};
use crate::stream::{Stream, StreamSource};
use std::collections::BTreeMap;

/// Streams of one direction, keyed by port id and iterated in id order.
///
/// Ids are stable once assigned. Fan-out growth only ever appends after the
/// current maximum id.
#[derive(Debug)]
pub struct PortMap {
    direction: PortDirection,
    ports: BTreeMap<PortId, Box<dyn Stream>>,
}

impl PortMap {
    pub fn new(direction: PortDirection) -> Self {
        Self {
            direction,
            ports: BTreeMap::new(),
        }
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    /// Register a stream under an explicit id.
    pub fn add(&mut self, id: PortId, stream: impl Stream + 'static) -> CoreResult<()> {
        self.add_boxed(id, Box::new(stream))
    }

    pub fn add_boxed(&mut self, id: PortId, stream: Box<dyn Stream>) -> CoreResult<()> {
        if self.ports.contains_key(&id) {
            return Err(ConfigurationError::DuplicatePort {
                direction: self.direction,
                id,
            }
            .into());
        }
        self.ports.insert(id, stream);
        Ok(())
    }

    pub fn get(&self, id: PortId) -> CoreResult<&dyn Stream> {
        self.ports
            .get(&id)
            .map(|s| s.as_ref())
            .ok_or(CoreError::NotFound {
                direction: self.direction,
                id,
            })
    }

    pub fn get_mut(&mut self, id: PortId) -> CoreResult<&mut (dyn Stream + 'static)> {
        let direction = self.direction;
        self.ports
            .get_mut(&id)
            .map(|s| s.as_mut())
            .ok_or(CoreError::NotFound { direction, id })
    }

    pub fn contains(&self, id: PortId) -> bool {
        self.ports.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Port ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = PortId> + '_ {
        self.ports.keys().copied()
    }

    /// Streams in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (PortId, &dyn Stream)> {
        self.ports.iter().map(|(id, s)| (*id, s.as_ref()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PortId, &mut Box<dyn Stream>)> {
        self.ports.iter_mut().map(|(id, s)| (*id, s))
    }

    /// Highest id in use.
    pub fn max_id(&self) -> Option<PortId> {
        self.ports.keys().next_back().copied()
    }

    /// Connect the port `id` to `producer` and return the id actually bound.
    ///
    /// For a fan-out port that already holds a connection, a sibling stream
    /// is registered under `max_id + 1` and connected instead.
    pub fn connect(&mut self, id: PortId, producer: &StreamSource) -> CoreResult<PortId> {
        let next_id = self.max_id().map_or(0, |max| max + 1);
        let direction = self.direction;
        let port = self.get_mut(id)?;
        port.check_compatible(producer)?;
        match port.next_binding()? {
            None => {
                port.connect(producer)?;
                Ok(id)
            }
            Some(mut sibling) => {
                sibling.connect(producer)?;
                log::info!(
                    "Fan-out stream {} grows: {} port {} registered (capacity {})",
                    sibling.name(),
                    direction,
                    next_id,
                    port.capacity()
                );
                self.ports.insert(next_id, sibling);
                Ok(next_id)
            }
        }
    }
}
