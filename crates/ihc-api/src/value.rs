// ── Resource values and controller state ──
//
// The typed payloads a controller hands out. Values are immutable once
// received; the engine only ever reads them.

use std::fmt;

use strum::IntoStaticStr;

/// Address of a data point on the controller.
pub type ResourceId = i32;

/// Typed payload of a single resource.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    FloatingPoint(f64),
    /// Timer resources report elapsed/remaining time in milliseconds.
    Timer { milliseconds: i64 },
    /// Weekday number as reported by the controller.
    Weekday(i32),
    Date { year: i32, month: u32, day: u32 },
    Time { hours: u32, minutes: u32, seconds: u32 },
    /// Enumerated resource; only the symbolic name is kept.
    Enum { name: String },
}

impl Value {
    /// Variant name used in logs and conversion errors.
    pub fn variant_name(&self) -> &'static str {
        self.into()
    }
}

/// A value received from (or sent to) one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceValue {
    pub resource_id: ResourceId,
    pub value: Value,
}

impl ResourceValue {
    pub fn new(resource_id: ResourceId, value: Value) -> Self {
        Self { resource_id, value }
    }
}

// ── ControllerState ──────────────────────────────────────────────

const STATE_INITIALIZE: &str = "text.ctrl.state.initialize";
const STATE_READY: &str = "text.ctrl.state.ready";

/// Lifecycle state the controller reports about itself.
///
/// Only `Initialize` and `Ready` carry meaning for reconnection; every
/// other state is kept verbatim so transitions can still be logged and
/// diffed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Initialize,
    Ready,
    Other(String),
}

impl ControllerState {
    /// Parse the controller's wire identifier.
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            STATE_INITIALIZE => Self::Initialize,
            STATE_READY => Self::Ready,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The controller's wire identifier for this state.
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Initialize => STATE_INITIALIZE,
            Self::Ready => STATE_READY,
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}
