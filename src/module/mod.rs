//! Modules: graph nodes owning ports and parameters.
//!
//! A module owns two [`PortMap`]s (inputs and outputs) and one
//! [`ParameterStructure`]. The external scheduler drives every module through
//! the same cycle once per step: [`Module::convert_inputs`], then
//! [`Module::process_frame`]. The core never decides in which order modules
//! run.

pub mod registry;

pub use registry::PortMap;

use crate::core::configurable::Configurable;
use crate::core::error::{ConfigResult, CoreError, CoreResult, ModuleId};
use crate::core::parameter::{ConfigDocument, Parameter, ParameterStructure};
use crate::core::storage::ScopedStorage;
use crate::core::types::PortDirection;
use crate::stream::PortDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};

/// State shared by all modules: identity, parameters and ports.
#[derive(Debug)]
pub struct ModuleBase {
    id: ModuleId,
    name: String,
    parameters: ParameterStructure,
    inputs: PortMap,
    outputs: PortMap,
}

impl ModuleBase {
    /// Create the base of a module. The parameters are validated before any
    /// stream is built from them.
    pub fn new(parameters: ParameterStructure) -> CoreResult<Self> {
        Configurable::new(&parameters)?;
        Ok(Self {
            id: ModuleId::new(),
            name: parameters.module_name().to_string(),
            parameters,
            inputs: PortMap::new(PortDirection::Input),
            outputs: PortMap::new(PortDirection::Output),
        })
    }

    /// Parameters every module carries.
    pub fn standard_parameters(name: impl Into<String>) -> ConfigResult<ParameterStructure> {
        ParameterStructure::new(name)
            .with(Parameter::int("width", 640, 1, 6400).describe("Width of the input"))?
            .with(Parameter::int("height", 480, 1, 4800).describe("Height of the input"))?
            .with(Parameter::double("fps", 0.0, 0.0, 1000.0).describe("Frames per second (0 for as fast as possible)"))?
            .with(Parameter::boolean("auto_process", false).describe("Process frames without an external trigger"))
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &ParameterStructure {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterStructure {
        &mut self.parameters
    }

    /// Validated view of the parameters.
    pub fn configurable(&self) -> Configurable<'_> {
        Configurable::validated(&self.parameters)
    }

    pub fn inputs(&self) -> &PortMap {
        &self.inputs
    }

    pub fn inputs_mut(&mut self) -> &mut PortMap {
        &mut self.inputs
    }

    pub fn outputs(&self) -> &PortMap {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut PortMap {
        &mut self.outputs
    }
}

/// Description of a module, for external tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub class: String,
    pub name: String,
    pub id: ModuleId,
    pub description: String,
    pub parameters: Json,
    pub inputs: Vec<PortDescriptor>,
    pub outputs: Vec<PortDescriptor>,
}

/// A graph node.
pub trait Module {
    fn base(&self) -> &ModuleBase;

    fn base_mut(&mut self) -> &mut ModuleBase;

    /// Class name of the module (e.g. "SlitCamera").
    fn class_name(&self) -> &'static str;

    fn description(&self) -> &str;

    /// Return the module to its initial state.
    fn reset(&mut self) -> CoreResult<()>;

    /// Compute the outputs of the current step. All inputs have been
    /// converted by the time this runs.
    fn process_frame(&mut self) -> CoreResult<()>;

    fn id(&self) -> ModuleId {
        self.base().id()
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn inputs(&self) -> &PortMap {
        self.base().inputs()
    }

    fn outputs(&self) -> &PortMap {
        self.base().outputs()
    }

    fn inputs_mut(&mut self) -> &mut PortMap {
        self.base_mut().inputs_mut()
    }

    fn outputs_mut(&mut self) -> &mut PortMap {
        self.base_mut().outputs_mut()
    }

    /// Pull every input from its producer.
    fn convert_inputs(&mut self) -> CoreResult<()> {
        for (_, port) in self.inputs_mut().iter_mut() {
            port.convert_input()?;
        }
        Ok(())
    }

    /// Fill every input with random content, then process the frame.
    fn process_random_input(&mut self, seed: &mut u32) -> CoreResult<()> {
        for (_, port) in self.inputs_mut().iter_mut() {
            port.randomize(seed);
        }
        self.process_frame()
    }

    /// Describe the module and its ports.
    fn export(&self) -> ModuleDescriptor {
        let describe = |ports: &PortMap| -> Vec<PortDescriptor> {
            ports
                .iter()
                .map(|(id, port)| PortDescriptor {
                    id: Some(id),
                    ..port.export()
                })
                .collect()
        };
        ModuleDescriptor {
            class: self.class_name().to_string(),
            name: self.name().to_string(),
            id: self.id(),
            description: self.description().to_string(),
            parameters: self.base().parameters().to_json(),
            inputs: describe(self.inputs()),
            outputs: describe(self.outputs()),
        }
    }

    /// Serialize all ports. Artifacts go to a per-module scope of `storage`.
    fn serialize(&self, storage: Option<&ScopedStorage>) -> CoreResult<Json> {
        let scope = storage.map(|s| s.scope(self.name())).transpose()?;
        let dump = |ports: &PortMap| -> CoreResult<Json> {
            let mut map = Map::new();
            for (id, port) in ports.iter() {
                map.insert(id.to_string(), port.serialize(scope.as_ref())?);
            }
            Ok(Json::Object(map))
        };
        Ok(json!({
            "name": self.name(),
            "class": self.class_name(),
            "inputs": dump(self.inputs())?,
            "outputs": dump(self.outputs())?,
        }))
    }

    /// Restore ports from a document produced by [`Module::serialize`].
    fn deserialize(&mut self, document: &Json, storage: Option<&ScopedStorage>) -> CoreResult<()> {
        let scope = storage.map(|s| s.scope(self.name())).transpose()?;
        let module = self.name().to_string();
        for (key, direction) in [("inputs", PortDirection::Input), ("outputs", PortDirection::Output)] {
            let entries = document
                .get(key)
                .and_then(Json::as_object)
                .ok_or_else(|| CoreError::Serialization {
                    stream: module.clone(),
                    reason: format!("missing field '{}'", key),
                })?;
            let ports = match direction {
                PortDirection::Input => self.inputs_mut(),
                PortDirection::Output => self.outputs_mut(),
            };
            for (id, entry) in entries {
                let id = id.parse().map_err(|_| CoreError::Serialization {
                    stream: module.clone(),
                    reason: format!("invalid port id '{}'", id),
                })?;
                ports.get_mut(id)?.deserialize(entry, scope.as_ref())?;
            }
        }
        Ok(())
    }

    /// Write the module configuration to a document.
    fn write_config(&self, destination: &mut ConfigDocument, non_default_only: bool) {
        self.base().configurable().write_config(destination, non_default_only);
    }
}
