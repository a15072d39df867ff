//! Test support: a module exposing every content kind.
//!
//! [`FakeModule`] registers one input and one output per content kind under
//! the same port id, both bound to the same slot, so chaining fake modules on
//! matching ids propagates content unchanged. The highest input id is a
//! fan-out port.

use crate::core::error::{ConfigurationError, CoreResult, ModuleId};
use crate::core::parameter::{ConfigDocument, Parameter, Provenance};
use crate::core::slot::{Slot, SlotArray};
use crate::core::types::{Event, Object, PortDirection, PortId, TimeStamp, TypeTag, TIME_STAMP_MIN};
use crate::module::{Module, ModuleBase};
use crate::stream::{MultiStreamT, Requirement, Stream, StreamNum, StreamT};
use image::RgbImage;

/// Port id of the fan-out input.
pub const FAN_OUT_PORT: PortId = 8;

const VALUE_RANGE: Requirement = Requirement::Range {
    min: -1000.0,
    max: 1000.0,
};

/// Module passing every content kind through.
#[derive(Debug)]
pub struct FakeModule {
    base: ModuleBase,
    time_stamp: TimeStamp,
    frames: u64,
}

impl FakeModule {
    /// Build a fake module from a configuration document.
    ///
    /// Besides the standard parameters it reads `fan_out`, the capacity of
    /// the fan-out port, and `offset`, the default of the double stream.
    pub fn new(name: &str, config: &ConfigDocument) -> CoreResult<Self> {
        let mut parameters = ModuleBase::standard_parameters(name)?
            .with(Parameter::uint("fan_out", 4, 1, 16).describe("Number of producers accepted by the fan-out port"))?
            .with(Parameter::double("offset", 0.0, -1000.0, 1000.0).describe("Default value of the score stream"))?;
        parameters.load_document(config, Provenance::File)?;
        let mut base = ModuleBase::new(parameters)?;

        let params = base.parameters();
        let width = params.get_i64("width")? as u32;
        let height = params.get_i64("height")? as u32;
        let fan_out = params.get_u64("fan_out")? as usize;
        let offset = params.get_f64("offset")?;
        let id = base.id();

        let flag = Slot::new(false);
        let count = Slot::new(0i32);
        let index = Slot::new(0u32);
        let ratio = Slot::new(0.0f32);
        let score = Slot::new(offset);
        let image = Slot::new(RgbImage::new(width, height));
        let objects = Slot::new(Vec::<Object>::new());
        let event = Slot::new(Event::default());
        let fan = SlotArray::filled(fan_out, 0i32);

        for direction in [PortDirection::Input, PortDirection::Output] {
            let ports = match direction {
                PortDirection::Input => base.inputs_mut(),
                PortDirection::Output => base.outputs_mut(),
            };
            ports.add(0, StreamT::new("flag", flag.clone(), id, "Boolean flag"))?;
            ports.add(1, StreamNum::new("count", count.clone(), id, "Signed counter"))?;
            ports.add(2, StreamNum::new("index", index.clone(), id, "Unsigned index"))?;
            ports.add(
                3,
                StreamNum::new("ratio", ratio.clone(), id, "Single precision ratio").with_requirement(VALUE_RANGE),
            )?;
            ports.add(
                4,
                StreamNum::new("score", score.clone(), id, "Double precision score").with_requirement(VALUE_RANGE),
            )?;
            ports.add(5, StreamT::new("image", image.clone(), id, "Image at the module resolution"))?;
            ports.add(6, StreamT::new("objects", objects.clone(), id, "Detected objects"))?;
            ports.add(7, StreamT::new("event", event.clone(), id, "Raised event"))?;
        }

        base.inputs_mut()
            .add(FAN_OUT_PORT, MultiStreamT::new("fan", &fan, id, "Counters from several producers")?)?;
        let first = fan.slot(0).ok_or_else(|| ConfigurationError::EmptyBacking {
            stream: "fan".to_string(),
        })?;
        base.outputs_mut()
            .add(FAN_OUT_PORT, StreamT::new("fan", first, id, "First counter of the fan-out port"))?;

        log::debug!("Created fake module {} ({})", name, id);
        Ok(Self {
            base,
            time_stamp: TIME_STAMP_MIN,
            frames: 0,
        })
    }

    /// Number of frames processed since the last reset.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Module for FakeModule {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn class_name(&self) -> &'static str {
        "FakeModule"
    }

    fn description(&self) -> &str {
        "Module exposing every content kind, for tests and demos"
    }

    fn reset(&mut self) -> CoreResult<()> {
        self.time_stamp = TIME_STAMP_MIN;
        self.frames = 0;
        for (_, port) in self.base.inputs_mut().iter_mut() {
            port.reset();
        }
        for (_, port) in self.base.outputs_mut().iter_mut() {
            port.reset();
        }
        Ok(())
    }

    /// Outputs share their slots with the inputs; only time stamps and
    /// histories are updated here.
    fn process_frame(&mut self) -> CoreResult<()> {
        let newest = self
            .inputs()
            .iter()
            .map(|(_, port)| port.time_stamp())
            .max()
            .unwrap_or(TIME_STAMP_MIN);
        self.time_stamp = newest.max(self.time_stamp + 1);
        let time_stamp = self.time_stamp;
        for (_, port) in self.base.outputs_mut().iter_mut() {
            port.set_time_stamp(time_stamp);
            port.store_history();
        }
        self.frames += 1;
        Ok(())
    }
}

/// Build a standalone stream of the given content kind.
pub fn stream_of(tag: TypeTag, name: &str, module: ModuleId) -> Box<dyn Stream> {
    match tag {
        TypeTag::Boolean => Box::new(StreamT::new(name, Slot::new(false), module, "")),
        TypeTag::Integer => Box::new(StreamT::new(name, Slot::new(0i32), module, "")),
        TypeTag::Unsigned => Box::new(StreamT::new(name, Slot::new(0u32), module, "")),
        TypeTag::Float => Box::new(StreamT::new(name, Slot::new(0.0f32), module, "")),
        TypeTag::Double => Box::new(StreamT::new(name, Slot::new(0.0f64), module, "")),
        TypeTag::Image => Box::new(StreamT::new(name, Slot::new(RgbImage::new(0, 0)), module, "")),
        TypeTag::Objects => Box::new(StreamT::new(name, Slot::new(Vec::<Object>::new()), module, "")),
        TypeTag::Event => Box::new(StreamT::new(name, Slot::new(Event::default()), module, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::CoreError;
    use crate::core::storage::ScopedStorage;
    use proptest::prelude::*;
    use serde_json::json;

    fn small_config() -> ConfigDocument {
        let mut config = ConfigDocument::new();
        config.insert("width".to_string(), json!(16));
        config.insert("height".to_string(), json!(12));
        config
    }

    #[test]
    fn test_ports_cover_every_kind() {
        let module = FakeModule::new("fake", &small_config()).unwrap();
        let kinds: Vec<TypeTag> = module.inputs().iter().take(8).map(|(_, s)| s.type_tag()).collect();
        assert_eq!(kinds, TypeTag::all());
        assert_eq!(module.inputs().max_id(), Some(FAN_OUT_PORT));
        assert_eq!(module.inputs().get(FAN_OUT_PORT).unwrap().capacity(), 4);
        assert_eq!(module.outputs().len(), 9);
    }

    #[test]
    fn test_stream_defaults_come_from_parameters() {
        let mut config = small_config();
        config.insert("offset".to_string(), json!(12.5));
        config.insert("fan_out".to_string(), json!(2));
        let module = FakeModule::new("fake", &config).unwrap();
        assert_eq!(module.outputs().get(4).unwrap().value().unwrap(), json!(12.5));
        assert_eq!(module.inputs().get(FAN_OUT_PORT).unwrap().capacity(), 2);
    }

    #[test]
    fn test_invalid_configuration_fails_construction() {
        let mut config = small_config();
        config.insert("fan_out".to_string(), json!(0));
        let err = FakeModule::new("fake", &config).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Configuration(ConfigurationError::OutOfRange { ref parameter, .. }) if parameter == "fan_out"
        ));
    }

    #[test]
    fn test_write_config_filters_defaults() {
        let module = FakeModule::new("fake", &small_config()).unwrap();
        let mut partial = ConfigDocument::new();
        module.write_config(&mut partial, true);
        let names: Vec<&str> = partial.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["width", "height"]);

        let mut full = ConfigDocument::new();
        module.write_config(&mut full, false);
        assert_eq!(full.len(), 6);
    }

    #[test]
    fn test_process_random_input_is_reproducible() {
        let mut a = FakeModule::new("a", &small_config()).unwrap();
        let mut b = FakeModule::new("b", &small_config()).unwrap();
        let (mut seed_a, mut seed_b) = (5, 5);
        for _ in 0..3 {
            a.process_random_input(&mut seed_a).unwrap();
            b.process_random_input(&mut seed_b).unwrap();
        }
        for id in 0..FAN_OUT_PORT {
            if id == 5 {
                continue;
            }
            let left = a.outputs().get(id).unwrap().value().unwrap();
            let right = b.outputs().get(id).unwrap().value().unwrap();
            assert_eq!(left, right, "port {}", id);
        }
        assert_eq!(a.frames(), 3);
        assert_eq!(a.outputs().get(0).unwrap().time_stamp(), 3);
    }

    #[test]
    fn test_reset() {
        let mut module = FakeModule::new("fake", &small_config()).unwrap();
        let mut seed = 1;
        module.process_random_input(&mut seed).unwrap();
        module.reset().unwrap();
        assert_eq!(module.frames(), 0);
        assert_eq!(module.outputs().get(1).unwrap().value().unwrap(), json!(0));
        assert_eq!(module.outputs().get(1).unwrap().time_stamp(), 0);
    }

    #[test]
    fn test_module_round_trip_with_images() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();

        let mut source = FakeModule::new("camera", &small_config()).unwrap();
        let mut seed = 99;
        source.process_random_input(&mut seed).unwrap();
        let document = source.serialize(Some(&storage)).unwrap();
        assert!(storage.path().join("camera").join("image_1.png").is_file());
        assert_ne!(document["inputs"]["5"]["value"]["file"], document["outputs"]["5"]["value"]["file"]);

        let mut target = FakeModule::new("camera", &small_config()).unwrap();
        target.deserialize(&document, Some(&storage)).unwrap();
        let expected = ScopedStorage::new(dir.path().join("expected")).unwrap();
        let actual = ScopedStorage::new(dir.path().join("actual")).unwrap();
        for (id, port) in source.outputs().iter() {
            let restored = target.outputs().get(id).unwrap();
            assert_eq!(
                restored.serialize(Some(&actual)).unwrap(),
                port.serialize(Some(&expected)).unwrap()
            );
        }
    }

    #[test]
    fn test_inline_serialization_fails_for_images() {
        let module = FakeModule::new("camera", &small_config()).unwrap();
        assert!(matches!(module.serialize(None), Err(CoreError::Serialization { .. })));
    }

    #[test]
    fn test_export() {
        let module = FakeModule::new("fake", &small_config()).unwrap();
        let descriptor = module.export();
        assert_eq!(descriptor.class, "FakeModule");
        assert_eq!(descriptor.inputs.len(), 9);
        assert_eq!(descriptor.inputs[8].multi, Some(4));
        assert_eq!(descriptor.inputs[8].id, Some(FAN_OUT_PORT));
        assert_eq!(descriptor.outputs[4].class, "StreamNum<double>");
    }

    fn tags() -> impl Strategy<Value = TypeTag> {
        prop::sample::select(TypeTag::all().to_vec())
    }

    proptest! {
        #[test]
        fn prop_mismatched_kinds_never_connect(a in tags(), b in tags()) {
            prop_assume!(a != b);
            let producer = stream_of(a, "out", ModuleId::new());
            let mut consumer = stream_of(b, "in", ModuleId::new());
            let result = consumer.connect(&producer.source());
            let is_mismatch = matches!(result, Err(CoreError::TypeMismatch { .. }));
            prop_assert!(is_mismatch);
            prop_assert!(!consumer.is_connected());
            prop_assert!(!producer.is_connected());
        }

        #[test]
        fn prop_matching_kinds_connect(a in tags()) {
            let producer = stream_of(a, "out", ModuleId::new());
            let mut consumer = stream_of(a, "in", ModuleId::new());
            prop_assert!(consumer.connect(&producer.source()).is_ok());
            prop_assert!(consumer.convert_input().is_ok());
            prop_assert_eq!(consumer.type_tag(), a);
        }
    }
}
