//! Streams: typed, timestamped ports bound to module-owned slots.
//!
//! A [`Stream`] is the type-erased port interface that modules register in
//! their port maps. Concrete streams ([`StreamT`], [`StreamNum`],
//! [`MultiStreamT`]) know their content kind; the erased interface only
//! exposes a [`TypeTag`], and every typed read across a connection is a
//! checked downcast.
//!
//! State machine: a port starts `Unbound` and becomes `Connected` when a
//! producer is attached. Single-slot ports may be disconnected again;
//! fan-out ports may not.

pub mod content;
pub mod multi_stream;
pub mod render;
pub mod stream_num;
pub mod stream_t;

pub use content::{Scalar, StreamContent};
pub use multi_stream::MultiStreamT;
pub use stream_num::{StreamNum, PLOT_LENGTH};
pub use stream_t::StreamT;

use crate::core::error::{ConfigurationError, CoreError, CoreResult, ModuleId};
use crate::core::parameter::{Provenance, EPSILON};
use crate::core::slot::Slot;
use crate::core::storage::ScopedStorage;
use crate::core::types::{PortId, TimeStamp, TypeTag, TIME_STAMP_MIN};
use render::Canvas;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

// ============================================================================
// Requirements
// ============================================================================

/// Constraint on the content shape a stream accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    /// Numeric content must lie in `[min, max]`
    Range { min: f64, max: f64 },
    /// Image content must have exactly this size
    Size { width: u32, height: u32 },
}

impl Requirement {
    /// Whether a producer declaring `provided` can feed a stream with this requirement.
    ///
    /// A producer range must lie inside the consumer's; sizes must be equal.
    /// Producers without a declared requirement are accepted.
    pub fn accepts(&self, provided: Option<&Requirement>) -> bool {
        match (self, provided) {
            (_, None) => true,
            (Requirement::Range { min, max }, Some(Requirement::Range { min: pmin, max: pmax })) => {
                *pmin >= min - EPSILON && *pmax <= max + EPSILON
            }
            (Requirement::Size { width, height }, Some(Requirement::Size { width: w, height: h })) => {
                width == w && height == h
            }
            _ => false,
        }
    }

    /// Whether a content value satisfies this requirement.
    ///
    /// Empty images are accepted by size requirements.
    pub fn check<T: StreamContent>(&self, content: &T) -> bool {
        match self {
            Requirement::Range { min, max } => content
                .as_f64()
                .map_or(true, |v| v >= min - EPSILON && v <= max + EPSILON),
            Requirement::Size { width, height } => match content.size() {
                Some((0, _)) | Some((_, 0)) | None => true,
                Some(size) => size == (*width, *height),
            },
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Range { min, max } => write!(f, "range [{}:{}]", min, max),
            Requirement::Size { width, height } => write!(f, "size {}x{}", width, height),
        }
    }
}

// ============================================================================
// Shared port state and producer handles
// ============================================================================

/// State shared between a stream and the handles given to its consumers.
#[derive(Debug, Default)]
pub struct PortState {
    time_stamp: Cell<TimeStamp>,
    connected: Cell<bool>,
}

/// Handle to a producer stream, held by the consumers connected to it.
///
/// Carries the producer's content slot behind `dyn Any`; consumers recover
/// the typed slot with a checked downcast on every read.
#[derive(Clone)]
pub struct StreamSource {
    module: ModuleId,
    name: String,
    tag: TypeTag,
    requirement: Option<Requirement>,
    state: Rc<PortState>,
    content: Rc<dyn Any>,
}

impl StreamSource {
    pub(crate) fn new<T: StreamContent>(header: &StreamHeader, slot: &Slot<T>) -> Self {
        Self {
            module: header.module,
            name: header.name.clone(),
            tag: T::TAG,
            requirement: header.requirement.clone(),
            state: Rc::clone(&header.state),
            content: Rc::new(slot.clone()),
        }
    }

    /// Module owning the producer.
    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_tag(&self) -> TypeTag {
        self.tag
    }

    pub fn requirement(&self) -> Option<&Requirement> {
        self.requirement.as_ref()
    }

    pub fn time_stamp(&self) -> TimeStamp {
        self.state.time_stamp.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.get()
    }

    /// Typed view of the producer's slot, if the content kind matches.
    pub fn slot<T: StreamContent>(&self) -> Option<&Slot<T>> {
        self.content.downcast_ref::<Slot<T>>()
    }

    pub(crate) fn mark_connected(&self) {
        self.state.connected.set(true);
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("tag", &self.tag)
            .finish()
    }
}

/// Fields common to every stream.
#[derive(Debug)]
pub struct StreamHeader {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) module: ModuleId,
    pub(crate) requirement: Option<Requirement>,
    pub(crate) state: Rc<PortState>,
    pub(crate) producer: Option<StreamSource>,
    pub(crate) provenance: Provenance,
}

impl StreamHeader {
    pub(crate) fn new(name: impl Into<String>, module: ModuleId, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            module,
            requirement: None,
            state: Rc::new(PortState::default()),
            producer: None,
            provenance: Provenance::Default,
        }
    }
}

// ============================================================================
// Export descriptor
// ============================================================================

/// Description of a port, for external tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Port id within the module (set by the module on export)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<PortId>,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    /// Concrete stream class (e.g. "StreamNum<double>")
    pub class: String,
    /// Always true: streams are exported alongside parameters
    pub stream: bool,
    /// Default value, for inline content kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<Requirement>,
    /// Maximum number of connections, for fan-out ports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi: Option<usize>,
}

// ============================================================================
// Stream trait
// ============================================================================

/// Type-erased port interface.
pub trait Stream: fmt::Debug {
    /// Common fields.
    fn header(&self) -> &StreamHeader;

    fn header_mut(&mut self) -> &mut StreamHeader;

    /// Tag of the content kind.
    fn type_tag(&self) -> TypeTag;

    /// Concrete class name, for exports and logs.
    fn class_name(&self) -> String;

    /// Handle given to consumers connecting to this stream.
    fn source(&self) -> StreamSource;

    /// Attach a producer. Fails on type mismatch or on an incompatible
    /// requirement, leaving both ports unchanged.
    fn connect(&mut self, producer: &StreamSource) -> CoreResult<()>;

    /// Detach the producer.
    fn disconnect(&mut self) -> CoreResult<()>;

    /// Pull the producer's content and time stamp into the local slot.
    fn convert_input(&mut self) -> CoreResult<()>;

    /// Return the time stamp and content to their initial state.
    fn reset(&mut self);

    /// Fill the content with reproducible pseudo-random data.
    fn randomize(&mut self, seed: &mut u32);

    /// Serialize to a document `{name, type, description, timestamp, connected, value}`.
    fn serialize(&self, storage: Option<&ScopedStorage>) -> CoreResult<Json>;

    /// Restore a document produced by [`Stream::serialize`].
    fn deserialize(&mut self, document: &Json, storage: Option<&ScopedStorage>) -> CoreResult<()>;

    /// Debug rendering hook.
    fn render_to(&self, canvas: &mut Canvas);

    /// Describe the content at a canvas position.
    fn query(&self, x: i32, y: i32) -> String;

    /// Describe the port for external tooling.
    fn export(&self) -> PortDescriptor;

    /// Current content as an inline value.
    fn value(&self) -> CoreResult<Json>;

    /// Default content as an inline value.
    fn default_value(&self) -> CoreResult<Json>;

    /// Set the content from an inline value, as a parameter would be set.
    fn set_value(&mut self, raw: &Json, provenance: Provenance) -> CoreResult<()>;

    /// Replace the default content.
    fn set_default(&mut self, raw: &Json) -> CoreResult<()>;

    /// Reset the content to the default.
    fn set_value_to_default(&mut self);

    /// Prepare the binding for the next connection, for fan-out ports.
    ///
    /// Returns `None` when the connection binds this stream itself, or a new
    /// sibling stream that the port map registers and connects.
    fn next_binding(&mut self) -> CoreResult<Option<Box<dyn Stream>>> {
        Ok(None)
    }

    /// Maximum number of connections.
    fn capacity(&self) -> usize {
        1
    }

    /// Append the current value to the history, for streams that keep one.
    fn store_history(&mut self) {}

    fn name(&self) -> &str {
        &self.header().name
    }

    fn description(&self) -> &str {
        &self.header().description
    }

    /// Owning module (non-owning back reference).
    fn module(&self) -> ModuleId {
        self.header().module
    }

    fn requirement(&self) -> Option<&Requirement> {
        self.header().requirement.as_ref()
    }

    fn provenance(&self) -> Provenance {
        self.header().provenance
    }

    fn time_stamp(&self) -> TimeStamp {
        self.header().state.time_stamp.get()
    }

    /// Set the time stamp. Time stamps are expected to be non-decreasing.
    fn set_time_stamp(&self, time_stamp: TimeStamp) {
        let header = self.header();
        let previous = header.state.time_stamp.get();
        if time_stamp < previous {
            log::warn!(
                "Time stamp of stream {} goes backwards: {} < {}",
                header.name,
                time_stamp,
                previous
            );
        }
        header.state.time_stamp.set(time_stamp);
    }

    fn is_connected(&self) -> bool {
        self.header().state.connected.get()
    }

    /// Producer this stream is connected to, if any.
    fn producer(&self) -> Option<&StreamSource> {
        self.header().producer.as_ref()
    }

    /// Check that `producer` can feed this stream.
    fn check_compatible(&self, producer: &StreamSource) -> CoreResult<()> {
        if producer.type_tag() != self.type_tag() {
            return Err(CoreError::TypeMismatch {
                stream: self.name().to_string(),
                expected: self.type_tag(),
                found: producer.type_tag(),
            });
        }
        if let Some(required) = self.requirement() {
            if !required.accepts(producer.requirement()) {
                return Err(ConfigurationError::IncompatibleRequirement {
                    stream: self.name().to_string(),
                    required: required.to_string(),
                    provided: producer
                        .requirement()
                        .map(|r| r.to_string())
                        .unwrap_or_default(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Reset the shared time stamp of a stream.
pub(crate) fn reset_time_stamp(header: &StreamHeader) {
    header.state.time_stamp.set(TIME_STAMP_MIN);
}
