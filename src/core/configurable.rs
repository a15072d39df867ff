//! Configurable objects.
//!
//! A [`Configurable`] pairs an owner with a [`ParameterStructure`] it borrows.
//! Constructing one validates the structure, so a module that builds its
//! streams after obtaining a `Configurable` never consumes an out-of-range
//! value as a stream default.

use crate::core::error::ConfigResult;
use crate::core::parameter::{ConfigDocument, ParameterStructure};

/// Borrowed, validated view of a parameter structure.
///
/// Deliberately neither `Clone` nor `Copy`.
#[derive(Debug)]
pub struct Configurable<'a> {
    parameters: &'a ParameterStructure,
}

impl<'a> Configurable<'a> {
    /// Validate the structure and wrap it.
    pub fn new(parameters: &'a ParameterStructure) -> ConfigResult<Self> {
        parameters.check_range_and_throw()?;
        Ok(Self { parameters })
    }

    /// Wrap a structure whose validation already ran at construction time.
    pub(crate) fn validated(parameters: &'a ParameterStructure) -> Self {
        Self { parameters }
    }

    /// Write the configuration to a document.
    pub fn write_config(&self, destination: &mut ConfigDocument, non_default_only: bool) {
        self.parameters.write(destination, non_default_only);
    }

    /// Get the underlying parameters.
    pub fn parameters(&self) -> &'a ParameterStructure {
        self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ConfigurationError;
    use crate::core::parameter::{Parameter, Provenance};
    use serde_json::json;

    #[test]
    fn test_construction_validates() {
        let mut params = ParameterStructure::new("m")
            .with(Parameter::double("gain", 1.0, 0.0, 2.0))
            .unwrap();
        let value = json!(3.0);
        assert!(params.load([("gain", &value)], Provenance::File).is_err());

        let err = Configurable::new(&params).unwrap_err();
        assert!(matches!(err, ConfigurationError::OutOfRange { ref parameter, .. } if parameter == "gain"));
    }

    #[test]
    fn test_write_config() {
        let mut params = ParameterStructure::new("m")
            .with(Parameter::double("gain", 1.0, 0.0, 2.0))
            .and_then(|p| p.with(Parameter::boolean("feature", false)))
            .unwrap();
        params
            .set_value("feature", &json!(true), Provenance::Runtime)
            .unwrap();

        let configurable = Configurable::new(&params).unwrap();
        let mut doc = ConfigDocument::new();
        configurable.write_config(&mut doc, true);
        assert_eq!(doc.len(), 1);
        assert!(doc.contains_key("feature"));
        assert_eq!(configurable.parameters().len(), 2);
    }
}
