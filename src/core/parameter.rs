//! Parameters and parameter structures.
//!
//! A [`Parameter`] is a single named configurable value with a declared type,
//! a default, an optional valid range and a provenance tag. A
//! [`ParameterStructure`] is the ordered, name-unique set of parameters owned
//! by one module. Values are validated against their ranges as a whole; an
//! out-of-range value is reported, never clamped.

use crate::core::error::{ConfigResult, ConfigurationError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

/// Tolerance used when comparing numeric values against range bounds.
pub const EPSILON: f64 = 1e-5;

/// Configuration document: parameter name to JSON value, in insertion order.
pub type ConfigDocument = IndexMap<String, Json>;

/// Origin of a parameter's current value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Value is the declared default
    #[default]
    Default,
    /// Value was loaded from a configuration file
    File,
    /// Value was set while the application runs
    Runtime,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Default => write!(f, "def"),
            Provenance::File => write!(f, "file"),
            Provenance::Runtime => write!(f, "runtime"),
        }
    }
}

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Bool,
    Int,
    UInt,
    Float,
    Double,
    Text,
}

/// A parameter value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Text(String),
}

/// Valid range of a parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum Range {
    /// Numeric value must be within `[min, max]`
    Numeric { min: f64, max: f64 },
    /// Text value must be one of the options
    OneOf(Vec<String>),
}

// ============================================================================
// Value helpers
// ============================================================================

impl ParameterValue {
    /// Get the declared type matching this value.
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            ParameterValue::Bool(_) => ParameterType::Bool,
            ParameterValue::Int(_) => ParameterType::Int,
            ParameterValue::UInt(_) => ParameterType::UInt,
            ParameterValue::Float(_) => ParameterType::Float,
            ParameterValue::Double(_) => ParameterType::Double,
            ParameterValue::Text(_) => ParameterType::Text,
        }
    }

    /// Numeric view of the value. Booleans map to 0 and 1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ParameterValue::Int(i) => Some(*i as f64),
            ParameterValue::UInt(u) => Some(*u as f64),
            ParameterValue::Float(f) => Some(*f as f64),
            ParameterValue::Double(d) => Some(*d),
            ParameterValue::Text(_) => None,
        }
    }

    /// Convert to a JSON value for configuration documents.
    pub fn to_json(&self) -> Json {
        match self {
            ParameterValue::Bool(b) => Json::from(*b),
            ParameterValue::Int(i) => Json::from(*i),
            ParameterValue::UInt(u) => Json::from(*u),
            ParameterValue::Float(f) => Json::from(*f),
            ParameterValue::Double(d) => Json::from(*d),
            ParameterValue::Text(s) => Json::from(s.clone()),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(b) => write!(f, "{}", b),
            ParameterValue::Int(i) => write!(f, "{}", i),
            ParameterValue::UInt(u) => write!(f, "{}", u),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Double(v) => write!(f, "{}", v),
            ParameterValue::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Range::Numeric { min, max } => write!(f, "[{}:{}]", min, max),
            Range::OneOf(options) => write!(f, "{{{}}}", options.join(",")),
        }
    }
}

impl Range {
    /// Check a value against this range.
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (self, value) {
            (Range::Numeric { min, max }, v) => match v.as_f64() {
                Some(num) => num >= min - EPSILON && num <= max + EPSILON,
                None => false,
            },
            (Range::OneOf(options), ParameterValue::Text(s)) => options.iter().any(|o| o == s),
            (Range::OneOf(_), _) => false,
        }
    }
}

impl ParameterType {
    /// Parse a raw configuration value into a typed parameter value.
    ///
    /// Numbers may also be given as strings, as configuration files often do.
    pub fn parse(&self, parameter: &str, raw: &Json) -> ConfigResult<ParameterValue> {
        let invalid = |reason: String| ConfigurationError::InvalidValue {
            parameter: parameter.to_string(),
            reason,
        };
        let text = raw.as_str().map(str::trim);
        match self {
            ParameterType::Bool => match (raw, text) {
                (Json::Bool(b), _) => Ok(ParameterValue::Bool(*b)),
                (Json::Number(n), _) => Ok(ParameterValue::Bool(n.as_f64() != Some(0.0))),
                (_, Some("true" | "1")) => Ok(ParameterValue::Bool(true)),
                (_, Some("false" | "0")) => Ok(ParameterValue::Bool(false)),
                _ => Err(invalid(format!("expected a boolean, got {}", raw))),
            },
            ParameterType::Int => raw
                .as_i64()
                .or_else(|| text.and_then(|s| s.parse().ok()))
                .map(ParameterValue::Int)
                .ok_or_else(|| invalid(format!("expected an integer, got {}", raw))),
            ParameterType::UInt => raw
                .as_u64()
                .or_else(|| text.and_then(|s| s.parse().ok()))
                .map(ParameterValue::UInt)
                .ok_or_else(|| invalid(format!("expected an unsigned integer, got {}", raw))),
            ParameterType::Float => raw
                .as_f64()
                .or_else(|| text.and_then(|s| s.parse().ok()))
                .map(|v| ParameterValue::Float(v as f32))
                .ok_or_else(|| invalid(format!("expected a number, got {}", raw))),
            ParameterType::Double => raw
                .as_f64()
                .or_else(|| text.and_then(|s| s.parse().ok()))
                .map(ParameterValue::Double)
                .ok_or_else(|| invalid(format!("expected a number, got {}", raw))),
            ParameterType::Text => match raw {
                Json::String(s) => Ok(ParameterValue::Text(s.clone())),
                other => Ok(ParameterValue::Text(other.to_string())),
            },
        }
    }
}

// ============================================================================
// Parameter
// ============================================================================

/// A single named configurable value.
#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    name: String,
    description: String,
    #[serde(rename = "type")]
    param_type: ParameterType,
    value: ParameterValue,
    default: ParameterValue,
    range: Option<Range>,
    provenance: Provenance,
    #[serde(skip)]
    requires_lock: bool,
    #[serde(skip)]
    locked: bool,
    #[serde(skip)]
    hidden: bool,
}

impl Parameter {
    fn with_value(name: impl Into<String>, default: ParameterValue, range: Option<Range>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            param_type: default.parameter_type(),
            value: default.clone(),
            default,
            range,
            provenance: Provenance::Default,
            requires_lock: false,
            locked: false,
            hidden: false,
        }
    }

    /// Create a signed integer parameter with range `[min, max]`.
    pub fn int(name: impl Into<String>, default: i64, min: i64, max: i64) -> Self {
        Self::with_value(
            name,
            ParameterValue::Int(default),
            Some(Range::Numeric {
                min: min as f64,
                max: max as f64,
            }),
        )
    }

    /// Create an unsigned integer parameter with range `[min, max]`.
    pub fn uint(name: impl Into<String>, default: u64, min: u64, max: u64) -> Self {
        Self::with_value(
            name,
            ParameterValue::UInt(default),
            Some(Range::Numeric {
                min: min as f64,
                max: max as f64,
            }),
        )
    }

    /// Create a single precision parameter with range `[min, max]`.
    pub fn float(name: impl Into<String>, default: f32, min: f32, max: f32) -> Self {
        Self::with_value(
            name,
            ParameterValue::Float(default),
            Some(Range::Numeric {
                min: min as f64,
                max: max as f64,
            }),
        )
    }

    /// Create a double precision parameter with range `[min, max]`.
    pub fn double(name: impl Into<String>, default: f64, min: f64, max: f64) -> Self {
        Self::with_value(
            name,
            ParameterValue::Double(default),
            Some(Range::Numeric { min, max }),
        )
    }

    /// Create a boolean parameter.
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::with_value(
            name,
            ParameterValue::Bool(default),
            Some(Range::Numeric { min: 0.0, max: 1.0 }),
        )
    }

    /// Create a free text parameter.
    pub fn text(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::with_value(name, ParameterValue::Text(default.into()), None)
    }

    /// Create a text parameter restricted to a set of options.
    pub fn choice(
        name: impl Into<String>,
        default: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let options = options.into_iter().map(Into::into).collect();
        Self::with_value(
            name,
            ParameterValue::Text(default.into()),
            Some(Range::OneOf(options)),
        )
    }

    /// Set the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the parameter as one that must not change after initialization.
    pub fn require_lock(mut self) -> Self {
        self.requires_lock = true;
        self
    }

    /// Mark the parameter as hidden from exports (e.g. passwords).
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.param_type
    }

    pub fn value(&self) -> &ParameterValue {
        &self.value
    }

    pub fn default_value(&self) -> &ParameterValue {
        &self.default
    }

    pub fn range(&self) -> Option<&Range> {
        self.range.as_ref()
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Lock the parameter if it was declared with [`Parameter::require_lock`].
    pub fn lock_if_required(&mut self) {
        if self.requires_lock {
            self.locked = true;
        }
    }

    /// Set the value from a raw configuration value.
    ///
    /// The value is type checked here; the range is checked by the owning
    /// structure.
    pub fn set_value(&mut self, raw: &Json, provenance: Provenance) -> ConfigResult<()> {
        if self.locked {
            return Err(ConfigurationError::LockedParameter {
                name: self.name.clone(),
            });
        }
        self.value = self.param_type.parse(&self.name, raw)?;
        self.provenance = provenance;
        Ok(())
    }

    /// Replace the default value.
    pub fn set_default(&mut self, raw: &Json) -> ConfigResult<()> {
        self.default = self.param_type.parse(&self.name, raw)?;
        Ok(())
    }

    /// Reset the value to the default.
    pub fn set_value_to_default(&mut self) -> ConfigResult<()> {
        if self.locked {
            return Err(ConfigurationError::LockedParameter {
                name: self.name.clone(),
            });
        }
        self.value = self.default.clone();
        self.provenance = Provenance::Default;
        Ok(())
    }

    /// Whether the current value satisfies the range.
    pub fn check_range(&self) -> bool {
        self.range.as_ref().map_or(true, |r| r.contains(&self.value))
    }

    /// Build the out-of-range error for this parameter.
    pub fn range_error(&self) -> ConfigurationError {
        ConfigurationError::OutOfRange {
            parameter: self.name.clone(),
            value: self.value.to_string(),
            range: self
                .range
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_default(),
        }
    }

    /// Generate sample values over the range, for parameter sweeps.
    ///
    /// Integer and boolean ranges small enough to fit in `samples` are
    /// enumerated; larger ones and real ranges are sampled evenly.
    pub fn generate_values(&self, samples: usize) -> Vec<ParameterValue> {
        let samples = samples.max(1);
        let (min, max) = match &self.range {
            Some(Range::Numeric { min, max }) => (*min, *max),
            Some(Range::OneOf(options)) => {
                return options.iter().cloned().map(ParameterValue::Text).collect()
            }
            None => return vec![self.value.clone()],
        };
        let step = if samples <= 1 {
            0.0
        } else {
            (max - min) / (samples - 1) as f64
        };
        match self.param_type {
            ParameterType::Int | ParameterType::UInt | ParameterType::Bool => {
                let points: Vec<f64> = if max - min + 1.0 <= samples as f64 {
                    (min as i64..=max as i64).map(|i| i as f64).collect()
                } else {
                    (0..samples).map(|i| (min + i as f64 * step).trunc()).collect()
                };
                points
                    .into_iter()
                    .map(|p| match self.param_type {
                        ParameterType::Int => ParameterValue::Int(p as i64),
                        ParameterType::UInt => ParameterValue::UInt(p as u64),
                        _ => ParameterValue::Bool(p != 0.0),
                    })
                    .collect()
            }
            ParameterType::Float => (0..samples)
                .map(|i| ParameterValue::Float((min + i as f64 * step) as f32))
                .collect(),
            ParameterType::Double => (0..samples)
                .map(|i| ParameterValue::Double(min + i as f64 * step))
                .collect(),
            ParameterType::Text => vec![self.value.clone()],
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(range) = &self.range {
            write!(f, " {}", range)?;
        }
        write!(f, " ({})", self.provenance)
    }
}

// ============================================================================
// ParameterStructure
// ============================================================================

/// Ordered, name-unique collection of parameters owned by one module.
#[derive(Debug)]
pub struct ParameterStructure {
    module: String,
    parameters: IndexMap<String, Parameter>,
}

impl ParameterStructure {
    /// Create an empty structure for the named module.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            parameters: IndexMap::new(),
        }
    }

    /// Add a parameter, builder style.
    pub fn with(mut self, parameter: Parameter) -> ConfigResult<Self> {
        self.add(parameter)?;
        Ok(self)
    }

    /// Add a parameter. Its value is reset to the default, which must be in range.
    pub fn add(&mut self, mut parameter: Parameter) -> ConfigResult<()> {
        if self.parameters.contains_key(parameter.name()) {
            return Err(ConfigurationError::DuplicateParameter {
                module: self.module.clone(),
                name: parameter.name().to_string(),
            });
        }
        parameter.set_value_to_default()?;
        if !parameter.check_range() {
            return Err(parameter.range_error());
        }
        self.parameters.insert(parameter.name().to_string(), parameter);
        Ok(())
    }

    /// Name of the owning module.
    pub fn module_name(&self) -> &str {
        &self.module
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Iterate parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    /// Check if a parameter exists.
    pub fn contains(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Get a parameter by name.
    pub fn get(&self, name: &str) -> ConfigResult<&Parameter> {
        self.parameters
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownParameter {
                module: self.module.clone(),
                name: name.to_string(),
            })
    }

    fn get_mut(&mut self, name: &str) -> ConfigResult<&mut Parameter> {
        let module = &self.module;
        self.parameters
            .get_mut(name)
            .ok_or_else(|| ConfigurationError::UnknownParameter {
                module: module.clone(),
                name: name.to_string(),
            })
    }

    /// Set one value at runtime. An invalid value is rejected and the previous
    /// value kept.
    pub fn set_value(&mut self, name: &str, raw: &Json, provenance: Provenance) -> ConfigResult<()> {
        let parameter = self.get_mut(name)?;
        let previous = (parameter.value.clone(), parameter.provenance);
        parameter.set_value(raw, provenance)?;
        if !parameter.check_range() {
            let error = parameter.range_error();
            parameter.value = previous.0;
            parameter.provenance = previous.1;
            return Err(error);
        }
        Ok(())
    }

    /// Bulk load raw values, then validate the whole structure.
    ///
    /// Unknown names are logged and skipped, as are locked parameters. On any
    /// error every value and provenance is restored to its state before the
    /// load.
    pub fn load<'a, I>(&mut self, values: I, provenance: Provenance) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a Json)>,
    {
        let snapshot: Vec<(ParameterValue, Provenance)> = self
            .parameters
            .values()
            .map(|p| (p.value.clone(), p.provenance))
            .collect();
        let result = self.apply(values, provenance).and_then(|()| self.check_range_and_throw());
        if result.is_err() {
            for (parameter, (value, provenance)) in self.parameters.values_mut().zip(snapshot) {
                parameter.value = value;
                parameter.provenance = provenance;
            }
        }
        result
    }

    fn apply<'a, I>(&mut self, values: I, provenance: Provenance) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a Json)>,
    {
        for (name, raw) in values {
            match self.parameters.get_mut(name) {
                Some(parameter) if parameter.is_locked() => {
                    log::debug!("Skipping locked parameter {} in module {}", name, self.module);
                }
                Some(parameter) => {
                    parameter.set_value(raw, provenance)?;
                    log::debug!("Loaded parameter {} in module {}", parameter, self.module);
                }
                None => log::warn!("Unknown parameter in configuration: {} in module {}", name, self.module),
            }
        }
        Ok(())
    }

    /// Load all entries of a configuration document.
    pub fn load_document(&mut self, document: &ConfigDocument, provenance: Provenance) -> ConfigResult<()> {
        self.load(document.iter().map(|(k, v)| (k.as_str(), v)), provenance)
    }

    /// Validate every value against its range.
    ///
    /// A single violation is reported as [`ConfigurationError::OutOfRange`];
    /// several are grouped in [`ConfigurationError::InvalidParameters`].
    pub fn check_range_and_throw(&self) -> ConfigResult<()> {
        let mut errors: Vec<ConfigurationError> = self
            .parameters
            .values()
            .filter(|p| !p.check_range())
            .map(Parameter::range_error)
            .collect();
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigurationError::InvalidParameters(errors)),
        }
    }

    /// Write parameters to a configuration document, in insertion order.
    ///
    /// With `non_default_only`, parameters still holding their default
    /// provenance are skipped.
    pub fn write(&self, destination: &mut ConfigDocument, non_default_only: bool) {
        for parameter in self.parameters.values() {
            if non_default_only && parameter.provenance() == Provenance::Default {
                continue;
            }
            destination.insert(parameter.name().to_string(), parameter.value().to_json());
        }
    }

    /// Reset every unlocked parameter to its default.
    pub fn set_value_to_default(&mut self) {
        for parameter in self.parameters.values_mut() {
            if !parameter.is_locked() {
                parameter.value = parameter.default.clone();
                parameter.provenance = Provenance::Default;
            }
        }
    }

    /// Lock all parameters declared as requiring a lock.
    pub fn lock_if_required(&mut self) {
        for parameter in self.parameters.values_mut() {
            parameter.lock_if_required();
        }
    }

    /// Describe the visible parameters as JSON, for exports.
    pub fn to_json(&self) -> Json {
        Json::Array(
            self.parameters
                .values()
                .filter(|p| !p.is_hidden())
                .filter_map(|p| serde_json::to_value(p).ok())
                .collect(),
        )
    }

    // ========================================================================
    // Typed getters
    // ========================================================================

    fn typed<T>(&self, name: &str, expected: &str, f: impl Fn(&ParameterValue) -> Option<T>) -> ConfigResult<T> {
        let parameter = self.get(name)?;
        f(parameter.value()).ok_or_else(|| ConfigurationError::InvalidValue {
            parameter: name.to_string(),
            reason: format!("expected {}, got {:?}", expected, parameter.parameter_type()),
        })
    }

    pub fn get_i64(&self, name: &str) -> ConfigResult<i64> {
        self.typed(name, "an integer", |v| match v {
            ParameterValue::Int(i) => Some(*i),
            ParameterValue::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        })
    }

    pub fn get_u64(&self, name: &str) -> ConfigResult<u64> {
        self.typed(name, "an unsigned integer", |v| match v {
            ParameterValue::UInt(u) => Some(*u),
            ParameterValue::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        })
    }

    pub fn get_f64(&self, name: &str) -> ConfigResult<f64> {
        self.typed(name, "a number", |v| match v {
            ParameterValue::Text(_) | ParameterValue::Bool(_) => None,
            other => other.as_f64(),
        })
    }

    pub fn get_bool(&self, name: &str) -> ConfigResult<bool> {
        self.typed(name, "a boolean", |v| match v {
            ParameterValue::Bool(b) => Some(*b),
            _ => None,
        })
    }

    pub fn get_str(&self, name: &str) -> ConfigResult<&str> {
        let parameter = self.get(name)?;
        match parameter.value() {
            ParameterValue::Text(s) => Ok(s.as_str()),
            _ => Err(ConfigurationError::InvalidValue {
                parameter: name.to_string(),
                reason: format!("expected text, got {:?}", parameter.parameter_type()),
            }),
        }
    }
}
