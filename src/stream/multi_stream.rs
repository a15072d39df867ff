//! Fan-out stream over a fixed-capacity slot array.
//!
//! The first connection binds slot 0 through the stream itself. Every further
//! connection is mediated by the owning port map: it asks for the
//! [`Stream::next_binding`], which materializes a sibling [`StreamT`] on the
//! next unused slot, and registers it after the current maximum port id.

use crate::core::error::{ConfigResult, ConfigurationError, CoreError, CoreResult, ModuleId};
use crate::core::parameter::Provenance;
use crate::core::slot::SlotArray;
use crate::core::storage::ScopedStorage;
use crate::core::types::TypeTag;
use crate::stream::render::Canvas;
use crate::stream::{PortDescriptor, Requirement, Stream, StreamContent, StreamHeader, StreamSource, StreamT};
use serde_json::Value as Json;

/// Port accepting up to `capacity` producers, one per slot.
#[derive(Debug)]
pub struct MultiStreamT<T: StreamContent> {
    inner: StreamT<T>,
    slots: SlotArray<T>,
    next: usize,
}

impl<T: StreamContent> MultiStreamT<T> {
    /// Bind a fan-out port to `slots`. Slot 0 is bound immediately, so the
    /// array must not be empty.
    pub fn new(
        name: impl Into<String>,
        slots: &SlotArray<T>,
        module: ModuleId,
        description: impl Into<String>,
    ) -> ConfigResult<Self> {
        let name = name.into();
        let first = slots.slot(0).ok_or_else(|| ConfigurationError::EmptyBacking {
            stream: name.clone(),
        })?;
        Ok(Self {
            inner: StreamT::new(name, first, module, description),
            slots: slots.clone(),
            next: 0,
        })
    }

    pub fn with_default(mut self, default: T) -> Self {
        self.inner = self.inner.with_default(default);
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.inner = self.inner.with_requirement(requirement);
        self
    }

    /// Number of connections accepted so far.
    pub fn connections(&self) -> usize {
        self.next
    }
}

impl<T: StreamContent> Stream for MultiStreamT<T> {
    fn header(&self) -> &StreamHeader {
        self.inner.header()
    }

    fn header_mut(&mut self) -> &mut StreamHeader {
        self.inner.header_mut()
    }

    fn type_tag(&self) -> TypeTag {
        T::TAG
    }

    fn class_name(&self) -> String {
        format!("MultiStreamT<{}>", T::TAG)
    }

    fn source(&self) -> StreamSource {
        self.inner.source()
    }

    /// Binds slot 0. Later connections must go through the port map.
    fn connect(&mut self, producer: &StreamSource) -> CoreResult<()> {
        if self.next > 0 {
            return Err(CoreError::UnsupportedOperation {
                stream: self.inner.name().to_string(),
                operation: "connect a fan-out port outside its port map",
            });
        }
        self.inner.connect(producer)?;
        self.next = 1;
        Ok(())
    }

    fn disconnect(&mut self) -> CoreResult<()> {
        Err(CoreError::UnsupportedOperation {
            stream: self.inner.name().to_string(),
            operation: "disconnect",
        })
    }

    fn next_binding(&mut self) -> CoreResult<Option<Box<dyn Stream>>> {
        if self.next == 0 {
            return Ok(None);
        }
        let capacity = self.slots.len();
        let slot = self.slots.slot(self.next).ok_or_else(|| CoreError::CapacityExceeded {
            stream: self.inner.name().to_string(),
            capacity,
        })?;
        let mut sibling = StreamT::new(
            self.inner.name(),
            slot,
            self.inner.module(),
            self.inner.description(),
        )
        .with_default(self.inner.default_content().clone());
        if let Some(requirement) = self.inner.requirement() {
            sibling = sibling.with_requirement(requirement.clone());
        }
        self.next += 1;
        Ok(Some(Box::new(sibling)))
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn convert_input(&mut self) -> CoreResult<()> {
        self.inner.convert_input()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn randomize(&mut self, seed: &mut u32) {
        self.inner.randomize(seed);
    }

    fn serialize(&self, storage: Option<&ScopedStorage>) -> CoreResult<Json> {
        self.inner.serialize(storage)
    }

    fn deserialize(&mut self, document: &Json, storage: Option<&ScopedStorage>) -> CoreResult<()> {
        self.inner.deserialize(document, storage)
    }

    fn render_to(&self, canvas: &mut Canvas) {
        self.inner.render_to(canvas);
    }

    fn query(&self, x: i32, y: i32) -> String {
        self.inner.query(x, y)
    }

    fn export(&self) -> PortDescriptor {
        PortDescriptor {
            class: self.class_name(),
            multi: Some(self.slots.len()),
            ..self.inner.export()
        }
    }

    fn value(&self) -> CoreResult<Json> {
        self.inner.value()
    }

    fn default_value(&self) -> CoreResult<Json> {
        self.inner.default_value()
    }

    fn set_value(&mut self, raw: &Json, provenance: Provenance) -> CoreResult<()> {
        self.inner.set_value(raw, provenance)
    }

    fn set_default(&mut self, raw: &Json) -> CoreResult<()> {
        self.inner.set_default(raw)
    }

    fn set_value_to_default(&mut self) {
        self.inner.set_value_to_default()
    }
}
