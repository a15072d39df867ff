//! Single-slot stream over one content kind.

use crate::core::error::{ConfigurationError, CoreError, CoreResult, ModuleId};
use crate::core::parameter::Provenance;
use crate::core::slot::Slot;
use crate::core::storage::ScopedStorage;
use crate::core::types::{TimeStamp, TypeTag};
use crate::stream::render::Canvas;
use crate::stream::{
    reset_time_stamp, PortDescriptor, Requirement, Stream, StreamContent, StreamHeader, StreamSource,
};
use serde_json::{json, Value as Json};
use std::cell::Ref;

/// Stream bound to one slot of content of kind `T`.
#[derive(Debug)]
pub struct StreamT<T: StreamContent> {
    header: StreamHeader,
    slot: Slot<T>,
    default: T,
}

impl<T: StreamContent> StreamT<T> {
    /// Bind a stream to `slot`. The current slot content becomes the default.
    pub fn new(
        name: impl Into<String>,
        slot: Slot<T>,
        module: ModuleId,
        description: impl Into<String>,
    ) -> Self {
        let default = slot.borrow().clone();
        Self {
            header: StreamHeader::new(name, module, description),
            slot,
            default,
        }
    }

    /// Set the default content and write it to the slot.
    pub fn with_default(mut self, default: T) -> Self {
        self.slot.replace(default.clone());
        self.default = default;
        self
    }

    /// Constrain the content this stream accepts.
    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.header.requirement = Some(requirement);
        self
    }

    /// Slot this stream is bound to.
    pub fn slot(&self) -> &Slot<T> {
        &self.slot
    }

    /// Borrow the current content.
    pub fn content(&self) -> Ref<'_, T> {
        self.slot.borrow()
    }

    /// The default content.
    pub fn default_content(&self) -> &T {
        &self.default
    }

    /// Whether a producer is attached.
    pub(crate) fn is_bound(&self) -> bool {
        self.header.producer.is_some()
    }

    fn checked(&self, value: &T) -> CoreResult<()> {
        let Some(requirement) = &self.header.requirement else {
            return Ok(());
        };
        if requirement.check(value) {
            return Ok(());
        }
        let provided = match (value.as_f64(), value.size()) {
            (Some(v), _) => v.to_string(),
            (None, Some((width, height))) => format!("{}x{}", width, height),
            (None, None) => String::new(),
        };
        Err(ConfigurationError::IncompatibleRequirement {
            stream: self.header.name.clone(),
            required: requirement.to_string(),
            provided,
        }
        .into())
    }

    fn malformed(&self, reason: impl Into<String>) -> CoreError {
        CoreError::Serialization {
            stream: self.header.name.clone(),
            reason: reason.into(),
        }
    }
}

impl<T: StreamContent> Stream for StreamT<T> {
    fn header(&self) -> &StreamHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut StreamHeader {
        &mut self.header
    }

    fn type_tag(&self) -> TypeTag {
        T::TAG
    }

    fn class_name(&self) -> String {
        format!("StreamT<{}>", T::TAG)
    }

    fn source(&self) -> StreamSource {
        StreamSource::new(&self.header, &self.slot)
    }

    fn connect(&mut self, producer: &StreamSource) -> CoreResult<()> {
        if self.is_bound() {
            return Err(CoreError::UnsupportedOperation {
                stream: self.header.name.clone(),
                operation: "reconnect",
            });
        }
        self.check_compatible(producer)?;
        if producer.slot::<T>().is_none() {
            return Err(CoreError::TypeMismatch {
                stream: self.header.name.clone(),
                expected: T::TAG,
                found: producer.type_tag(),
            });
        }
        log::debug!(
            "Connecting stream {} of module {} to {} of module {}",
            self.header.name,
            self.header.module,
            producer.name(),
            producer.module()
        );
        producer.mark_connected();
        self.header.state.connected.set(true);
        self.header.producer = Some(producer.clone());
        Ok(())
    }

    fn disconnect(&mut self) -> CoreResult<()> {
        match self.header.producer.take() {
            Some(producer) => {
                log::debug!("Disconnecting stream {} from {}", self.header.name, producer.name());
                self.header.state.connected.set(false);
                Ok(())
            }
            None => Err(CoreError::NotConnected {
                stream: self.header.name.clone(),
            }),
        }
    }

    fn convert_input(&mut self) -> CoreResult<()> {
        let Some(producer) = &self.header.producer else {
            self.slot.replace(self.default.clone());
            return Ok(());
        };
        if !producer.is_connected() {
            return Err(CoreError::NotConnected {
                stream: producer.name().to_string(),
            });
        }
        let source = producer.slot::<T>().ok_or_else(|| CoreError::TypeMismatch {
            stream: self.header.name.clone(),
            expected: T::TAG,
            found: producer.type_tag(),
        })?;
        self.set_time_stamp(producer.time_stamp());
        if !source.same_cell(&self.slot) {
            self.slot.borrow_mut().convert_from(&source.borrow());
        }
        Ok(())
    }

    fn reset(&mut self) {
        reset_time_stamp(&self.header);
        self.slot.replace(self.default.clone());
    }

    fn randomize(&mut self, seed: &mut u32) {
        self.slot.borrow_mut().randomize(seed);
    }

    fn serialize(&self, storage: Option<&ScopedStorage>) -> CoreResult<Json> {
        let time_stamp = self.time_stamp();
        let value = self.slot.borrow().encode(&self.header.name, time_stamp, storage)?;
        Ok(json!({
            "name": self.header.name,
            "type": T::TAG.name(),
            "description": self.header.description,
            "timestamp": time_stamp,
            "connected": self.is_connected(),
            "value": value,
        }))
    }

    fn deserialize(&mut self, document: &Json, storage: Option<&ScopedStorage>) -> CoreResult<()> {
        let type_name = document
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| self.malformed("missing field 'type'"))?;
        let found = TypeTag::from_name(type_name)
            .ok_or_else(|| self.malformed(format!("unknown type '{}'", type_name)))?;
        if found != T::TAG {
            return Err(CoreError::TypeMismatch {
                stream: self.header.name.clone(),
                expected: T::TAG,
                found,
            });
        }
        if document.get("description").and_then(Json::as_str) != Some(self.header.description.as_str()) {
            log::warn!("Stream {} does not have the same description", self.header.name);
        }
        let time_stamp: TimeStamp = document
            .get("timestamp")
            .and_then(Json::as_u64)
            .ok_or_else(|| self.malformed("missing field 'timestamp'"))?;
        let connected = document
            .get("connected")
            .and_then(Json::as_bool)
            .ok_or_else(|| self.malformed("missing field 'connected'"))?;
        if connected != self.is_connected() {
            return Err(self.malformed("connection state differs from the serialized one"));
        }
        let raw = document
            .get("value")
            .ok_or_else(|| self.malformed("missing field 'value'"))?;
        let value = T::decode(&self.header.name, raw, storage)?;
        self.checked(&value)?;
        self.slot.replace(value);
        self.set_time_stamp(time_stamp);
        Ok(())
    }

    fn render_to(&self, canvas: &mut Canvas) {
        self.slot.borrow().render(canvas);
    }

    fn query(&self, x: i32, y: i32) -> String {
        self.slot.borrow().describe_at(x, y)
    }

    fn export(&self) -> PortDescriptor {
        PortDescriptor {
            id: None,
            name: self.header.name.clone(),
            description: self.header.description.clone(),
            type_tag: T::TAG,
            class: self.class_name(),
            stream: true,
            default: self.default_value().ok(),
            requirement: self.header.requirement.clone(),
            multi: None,
        }
    }

    fn value(&self) -> CoreResult<Json> {
        self.slot.borrow().encode(&self.header.name, self.time_stamp(), None)
    }

    fn default_value(&self) -> CoreResult<Json> {
        self.default.encode(&self.header.name, self.time_stamp(), None)
    }

    fn set_value(&mut self, raw: &Json, provenance: Provenance) -> CoreResult<()> {
        let value = T::decode(&self.header.name, raw, None)?;
        self.checked(&value)?;
        self.slot.replace(value);
        self.header.provenance = provenance;
        Ok(())
    }

    fn set_default(&mut self, raw: &Json) -> CoreResult<()> {
        let value = T::decode(&self.header.name, raw, None)?;
        self.checked(&value)?;
        self.default = value;
        Ok(())
    }

    fn set_value_to_default(&mut self) {
        self.slot.replace(self.default.clone());
        self.header.provenance = Provenance::Default;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Object;
    use image::RgbImage;
    use proptest::prelude::*;

    fn stream<T: StreamContent>(name: &str, value: T) -> StreamT<T> {
        StreamT::new(name, Slot::new(value), ModuleId::new(), format!("{} stream", name))
    }

    #[test]
    fn test_connect_and_convert() {
        let producer = stream("out", 0i32);
        let mut consumer = stream("in", 0i32);
        consumer.connect(&producer.source()).unwrap();
        assert!(consumer.is_connected());
        assert!(producer.is_connected());

        producer.slot().replace(42);
        producer.set_time_stamp(40);
        consumer.convert_input().unwrap();
        assert_eq!(*consumer.content(), 42);
        assert_eq!(consumer.time_stamp(), 40);
        // the producer's slot is only read
        assert_eq!(*producer.content(), 42);
    }

    #[test]
    fn test_type_mismatch_leaves_ports_unbound() {
        let producer = stream("out", 0.0f64);
        let mut consumer = stream("in", 0i32);
        let err = consumer.connect(&producer.source()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TypeMismatch { expected: TypeTag::Integer, found: TypeTag::Double, .. }
        ));
        assert!(!consumer.is_connected());
        assert!(!producer.is_connected());
    }

    #[test]
    fn test_reconnect_is_rejected() {
        let producer = stream("out", false);
        let mut consumer = stream("in", false);
        consumer.connect(&producer.source()).unwrap();
        let err = consumer.connect(&producer.source()).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedOperation { operation: "reconnect", .. }));

        consumer.disconnect().unwrap();
        assert!(!consumer.is_connected());
        assert!(consumer.producer().is_none());
        assert!(matches!(consumer.disconnect(), Err(CoreError::NotConnected { .. })));
        consumer.connect(&producer.source()).unwrap();
    }

    #[test]
    fn test_unbound_convert_restores_default() {
        let mut consumer = stream("in", 0u32).with_default(7);
        consumer.slot().replace(3);
        consumer.convert_input().unwrap();
        assert_eq!(*consumer.content(), 7);
    }

    #[test]
    fn test_convert_requires_connected_producer() {
        let producer = stream("out", 1i32);
        let mut consumer = stream("in", 0i32);
        consumer.connect(&producer.source()).unwrap();
        producer.header().state.connected.set(false);
        let err = consumer.convert_input().unwrap_err();
        assert!(matches!(err, CoreError::NotConnected { ref stream } if stream == "out"));
    }

    #[test]
    fn test_range_requirement_on_connect() {
        let producer = stream("out", 0.0f64).with_requirement(Requirement::Range { min: -10.0, max: 10.0 });
        let mut narrow = stream("in", 0.0f64).with_requirement(Requirement::Range { min: 0.0, max: 1.0 });
        let err = narrow.connect(&producer.source()).unwrap_err();
        assert!(err.is_configuration());
        assert!(!narrow.is_connected());

        let mut wide = stream("in", 0.0f64).with_requirement(Requirement::Range { min: -100.0, max: 100.0 });
        wide.connect(&producer.source()).unwrap();
    }

    #[test]
    fn test_set_value_checks_requirement() {
        let mut s = stream("gain", 1.0f64).with_requirement(Requirement::Range { min: 0.0, max: 2.0 });
        s.set_value(&json!(1.5), Provenance::Runtime).unwrap();
        assert_eq!(s.provenance(), Provenance::Runtime);
        assert!(s.set_value(&json!(3.0), Provenance::Runtime).is_err());
        assert_eq!(*s.content(), 1.5);
        s.set_value_to_default();
        assert_eq!(*s.content(), 1.0);
        assert_eq!(s.provenance(), Provenance::Default);
    }

    #[test]
    fn test_reset() {
        let mut s = stream("count", 0i32).with_default(5);
        s.slot().replace(9);
        s.set_time_stamp(100);
        s.reset();
        assert_eq!(s.time_stamp(), 0);
        assert_eq!(*s.content(), 5);
    }

    #[test]
    fn test_deserialize_checks_header() {
        let s = stream("count", 3i32);
        let doc = s.serialize(None).unwrap();
        assert_eq!(doc["type"], "int");
        assert_eq!(doc["connected"], false);

        let mut other = stream("count", 0.0f32);
        assert!(matches!(other.deserialize(&doc, None), Err(CoreError::TypeMismatch { .. })));

        let mut missing = doc.clone();
        missing.as_object_mut().unwrap().remove("timestamp");
        let mut target = stream("count", 0i32);
        assert!(matches!(target.deserialize(&missing, None), Err(CoreError::Serialization { .. })));

        let mut connected = doc.clone();
        connected["connected"] = json!(true);
        assert!(matches!(target.deserialize(&connected, None), Err(CoreError::Serialization { .. })));
    }

    #[test]
    fn test_objects_round_trip() {
        let mut s = stream("objects", Vec::<Object>::new());
        let mut seed = 11;
        while s.content().is_empty() {
            s.randomize(&mut seed);
        }
        s.set_time_stamp(7);
        let doc = s.serialize(None).unwrap();
        let mut restored = stream("objects", Vec::<Object>::new());
        restored.deserialize(&doc, None).unwrap();
        assert_eq!(*restored.content(), *s.content());
        assert_eq!(restored.time_stamp(), 7);
    }

    #[test]
    fn test_time_stamp_follows_producer_backwards() {
        let producer = stream("out", 0u32);
        let mut consumer = stream("in", 0u32);
        consumer.connect(&producer.source()).unwrap();
        producer.set_time_stamp(10);
        consumer.convert_input().unwrap();
        producer.set_time_stamp(4);
        consumer.convert_input().unwrap();
        assert_eq!(consumer.time_stamp(), 4);

        let doc = stream("in", 0u32).serialize(None).unwrap();
        consumer.disconnect().unwrap();
        consumer.deserialize(&doc, None).unwrap();
        assert_eq!(consumer.time_stamp(), 0);
    }

    #[test]
    fn test_image_convert_rescales_to_consumer() {
        let producer = stream("image", RgbImage::from_pixel(8, 6, image::Rgb([1, 2, 3])));
        let mut consumer = stream("image", RgbImage::new(16, 12));
        consumer.connect(&producer.source()).unwrap();
        consumer.convert_input().unwrap();
        assert_eq!(consumer.content().dimensions(), (16, 12));
        assert_eq!(*consumer.content().get_pixel(0, 0), image::Rgb([1, 2, 3]));
        assert_eq!(producer.content().dimensions(), (8, 6));
    }

    #[test]
    fn test_images_sharing_name_and_time_stamp_keep_their_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();
        let input = stream("image", RgbImage::from_pixel(4, 3, image::Rgb([255, 0, 0])));
        let output = stream("image", RgbImage::from_pixel(4, 3, image::Rgb([0, 0, 255])));
        input.set_time_stamp(5);
        output.set_time_stamp(5);
        let input_doc = input.serialize(Some(&storage)).unwrap();
        let output_doc = output.serialize(Some(&storage)).unwrap();
        assert_ne!(input_doc["value"]["file"], output_doc["value"]["file"]);

        let mut restored = stream("image", RgbImage::new(0, 0));
        restored.deserialize(&input_doc, Some(&storage)).unwrap();
        assert_eq!(*restored.content(), *input.content());
        restored.deserialize(&output_doc, Some(&storage)).unwrap();
        assert_eq!(*restored.content(), *output.content());
    }

    #[test]
    fn test_export() {
        let s = stream("count", 0i32).with_default(4);
        let descriptor = s.export();
        assert_eq!(descriptor.class, "StreamT<int>");
        assert_eq!(descriptor.default, Some(json!(4)));
        assert!(descriptor.stream);
        assert_eq!(descriptor.multi, None);
    }

    fn round_trip<T: StreamContent>(value: T, time_stamp: TimeStamp) {
        let s = stream("x", T::zero());
        s.slot().replace(value);
        s.set_time_stamp(time_stamp);
        let doc = s.serialize(None).unwrap();

        let mut restored = stream("x", T::zero());
        restored.deserialize(&doc, None).unwrap();
        assert_eq!(*restored.content(), *s.content());
        assert_eq!(restored.time_stamp(), time_stamp);
    }

    proptest! {
        #[test]
        fn prop_bool_round_trip(v in any::<bool>(), ts in any::<u32>()) {
            round_trip(v, ts as TimeStamp);
        }

        #[test]
        fn prop_int_round_trip(v in any::<i32>(), ts in any::<u32>()) {
            round_trip(v, ts as TimeStamp);
        }

        #[test]
        fn prop_uint_round_trip(v in any::<u32>(), ts in any::<u32>()) {
            round_trip(v, ts as TimeStamp);
        }

        #[test]
        fn prop_float_round_trip(v in -1.0e6f32..1.0e6f32, ts in any::<u32>()) {
            round_trip(v, ts as TimeStamp);
        }

        #[test]
        fn prop_double_round_trip(v in -1.0e12f64..1.0e12f64, ts in any::<u32>()) {
            round_trip(v, ts as TimeStamp);
        }

        #[test]
        fn prop_randomize_is_reproducible(seed in any::<u32>()) {
            let mut a = stream("a", 0.0f64);
            let mut b = stream("b", 0.0f64);
            let (mut seed_a, mut seed_b) = (seed, seed);
            for _ in 0..5 {
                a.randomize(&mut seed_a);
                b.randomize(&mut seed_b);
                prop_assert_eq!(*a.content(), *b.content());
            }
        }
    }
}
