//! Scalar stream keeping a trailing history for plots.

use crate::core::error::{CoreResult, ModuleId};
use crate::core::parameter::Provenance;
use crate::core::slot::Slot;
use crate::core::storage::ScopedStorage;
use crate::core::types::TypeTag;
use crate::stream::render::{self, Canvas};
use crate::stream::{
    PortDescriptor, Requirement, Scalar, Stream, StreamContent, StreamHeader, StreamSource, StreamT,
};
use serde_json::Value as Json;
use std::cell::Ref;
use std::collections::VecDeque;

/// Default number of values kept in the history.
pub const PLOT_LENGTH: usize = 50;

/// Scalar stream with a bounded history of past values.
///
/// The history is appended to explicitly with [`StreamNum::store`], once per
/// step, and is only used for rendering.
#[derive(Debug)]
pub struct StreamNum<T: Scalar> {
    inner: StreamT<T>,
    history: VecDeque<f64>,
    history_length: usize,
}

impl<T: Scalar> StreamNum<T> {
    pub fn new(
        name: impl Into<String>,
        slot: Slot<T>,
        module: ModuleId,
        description: impl Into<String>,
    ) -> Self {
        Self {
            inner: StreamT::new(name, slot, module, description),
            history: VecDeque::with_capacity(PLOT_LENGTH),
            history_length: PLOT_LENGTH,
        }
    }

    pub fn with_default(mut self, default: T) -> Self {
        self.inner = self.inner.with_default(default);
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.inner = self.inner.with_requirement(requirement);
        self
    }

    /// Keep `length` values in the history (at least one).
    pub fn with_history(mut self, length: usize) -> Self {
        self.history_length = length.max(1);
        self.history = VecDeque::with_capacity(self.history_length);
        self
    }

    pub fn slot(&self) -> &Slot<T> {
        self.inner.slot()
    }

    pub fn content(&self) -> Ref<'_, T> {
        self.inner.content()
    }

    /// Append the current value to the history, dropping the oldest when full.
    pub fn store(&mut self) {
        if self.history.len() == self.history_length {
            self.history.pop_front();
        }
        let value = self.inner.content().to_f64();
        self.history.push_back(value);
    }

    /// Stored values, oldest first.
    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }
}

impl<T: Scalar> Stream for StreamNum<T> {
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
        format!("StreamNum<{}>", T::TAG)
    }

    fn source(&self) -> StreamSource {
        self.inner.source()
    }

    fn connect(&mut self, producer: &StreamSource) -> CoreResult<()> {
        self.inner.connect(producer)
    }

    fn disconnect(&mut self) -> CoreResult<()> {
        self.inner.disconnect()
    }

    /// Unbound scalar inputs are zeroed rather than restored to the default.
    fn convert_input(&mut self) -> CoreResult<()> {
        if !self.inner.is_bound() {
            self.inner.slot().replace(T::zero());
            return Ok(());
        }
        self.inner.convert_input()
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.history.clear();
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
        let values: Vec<f64> = self.history.iter().copied().collect();
        render::plot_series(canvas, &values);
    }

    fn query(&self, x: i32, y: i32) -> String {
        self.inner.query(x, y)
    }

    fn export(&self) -> PortDescriptor {
        PortDescriptor {
            class: self.class_name(),
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

    fn store_history(&mut self) {
        self.store();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::render::RED;

    fn stream(value: f64) -> StreamNum<f64> {
        StreamNum::new("score", Slot::new(value), ModuleId::new(), "score of the detector")
    }

    #[test]
    fn test_history_is_bounded() {
        let mut s = stream(0.0).with_history(3);
        for i in 0..5 {
            s.slot().replace(i as f64);
            s.store_history();
        }
        assert_eq!(s.history().iter().copied().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_default_history_length() {
        let mut s = stream(1.0);
        for _ in 0..(PLOT_LENGTH + 10) {
            s.store();
        }
        assert_eq!(s.history().len(), PLOT_LENGTH);
    }

    #[test]
    fn test_unbound_convert_zeroes() {
        let mut s = stream(0.0).with_default(2.5);
        assert_eq!(*s.content(), 2.5);
        s.convert_input().unwrap();
        assert_eq!(*s.content(), 0.0);
    }

    #[test]
    fn test_bound_convert_copies() {
        let producer = stream(4.0);
        let mut consumer = stream(0.0);
        consumer.connect(&producer.source()).unwrap();
        consumer.convert_input().unwrap();
        assert_eq!(*consumer.content(), 4.0);
    }

    #[test]
    fn test_render_history() {
        let mut s = stream(0.0);
        for v in [1.0, 3.0, 2.0] {
            s.slot().replace(v);
            s.store();
        }
        let mut canvas = Canvas::new(30, 20);
        s.render_to(&mut canvas);
        assert!(canvas.pixels().any(|p| *p == RED));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut s = stream(1.0);
        s.store();
        s.reset();
        assert!(s.history().is_empty());
        assert_eq!(s.export().class, "StreamNum<double>");
    }
}
