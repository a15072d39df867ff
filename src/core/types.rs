//! Core value types shared by streams, modules and parameters.
//!
//! The content type system is a closed set of kinds identified by a [`TypeTag`].
//! Each concrete stream carries the tag of its content as a compile-time
//! descriptor, so type checks between erased streams compare tags before any
//! typed read is attempted.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time stamp of a stream's content, in milliseconds since the start of the run.
pub type TimeStamp = u64;

/// Initial time stamp of every stream.
pub const TIME_STAMP_MIN: TimeStamp = 0;

/// Integer identifier of a port inside one module's input or output registry.
pub type PortId = u32;

/// Direction of a port (input or output).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// Tag identifying the concrete content type of a stream.
///
/// Two streams may only be connected when their tags are equal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TypeTag {
    #[serde(rename = "bool")]
    Boolean,
    #[serde(rename = "int")]
    Integer,
    #[serde(rename = "uint")]
    Unsigned,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "double")]
    Double,
    Image,
    Objects,
    Event,
}

impl TypeTag {
    /// Name used in serialized documents and exports.
    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::Boolean => "bool",
            TypeTag::Integer => "int",
            TypeTag::Unsigned => "uint",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::Image => "Image",
            TypeTag::Objects => "Objects",
            TypeTag::Event => "Event",
        }
    }

    /// Parse a tag from its serialized name.
    pub fn from_name(name: &str) -> Option<TypeTag> {
        TypeTag::all().iter().copied().find(|tag| tag.name() == name)
    }

    /// Whether content of this kind can be embedded in a JSON document.
    pub fn is_inline(&self) -> bool {
        !matches!(self, TypeTag::Image)
    }

    /// Whether this kind is a scalar number (usable by `StreamNum`).
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            TypeTag::Boolean
                | TypeTag::Integer
                | TypeTag::Unsigned
                | TypeTag::Float
                | TypeTag::Double
        )
    }

    /// All content kinds, in declaration order.
    pub fn all() -> &'static [TypeTag] {
        &[
            TypeTag::Boolean,
            TypeTag::Integer,
            TypeTag::Unsigned,
            TypeTag::Float,
            TypeTag::Double,
            TypeTag::Image,
            TypeTag::Objects,
            TypeTag::Event,
        ]
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A located object, as produced by detectors and trackers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Object {
    /// Tracking identifier (-1 when untracked)
    pub id: i64,
    /// Class label (e.g. "face", "person")
    pub label: String,
    /// Left coordinate in pixels
    pub x: f32,
    /// Top coordinate in pixels
    pub y: f32,
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
    /// Named features attached to the object
    pub features: IndexMap<String, f32>,
}

impl Object {
    /// Create an untracked object with the given bounding box.
    pub fn new(label: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            id: -1,
            label: label.into(),
            x,
            y,
            width,
            height,
            features: IndexMap::new(),
        }
    }

    /// Add a named feature.
    pub fn with_feature(mut self, name: impl Into<String>, value: f32) -> Self {
        self.features.insert(name.into(), value);
        self
    }

    /// Check if the point lies inside the bounding box.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }
}

/// An event raised by a module, optionally attached to an object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event label (e.g. "motion", "intrusion")
    pub label: String,
    /// Whether the event was raised during the current step
    pub raised: bool,
    /// Object that triggered the event
    pub object: Option<Object>,
}

impl Event {
    /// Raise an event with the given label.
    pub fn raise(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            raised: true,
            object: None,
        }
    }

    /// Attach the object that triggered the event.
    pub fn with_object(mut self, object: Object) -> Self {
        self.object = Some(object);
        self
    }

    /// Clear the event.
    pub fn clear(&mut self) {
        self.raised = false;
        self.label.clear();
        self.object = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tag_names_round_trip() {
        for tag in TypeTag::all() {
            assert_eq!(TypeTag::from_name(tag.name()), Some(*tag));
            let json = serde_json::to_value(tag).unwrap();
            assert_eq!(json, serde_json::Value::String(tag.name().to_string()));
        }
        assert_eq!(TypeTag::from_name("matrix"), None);
    }

    #[test]
    fn test_type_tag_kinds() {
        assert!(TypeTag::Double.is_scalar());
        assert!(!TypeTag::Objects.is_scalar());
        assert!(!TypeTag::Image.is_inline());
        assert!(TypeTag::Event.is_inline());
    }

    #[test]
    fn test_object_contains() {
        let obj = Object::new("face", 10.0, 20.0, 5.0, 5.0).with_feature("area", 25.0);
        assert!(obj.contains(12.0, 22.0));
        assert!(!obj.contains(0.0, 0.0));
        assert_eq!(obj.features.get("area"), Some(&25.0));
    }

    #[test]
    fn test_event_clear() {
        let mut evt = Event::raise("motion").with_object(Object::default());
        assert!(evt.raised);
        evt.clear();
        assert_eq!(evt, Event::default());
    }
}
