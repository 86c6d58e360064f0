#![forbid(unsafe_code)]

//! Message types exchanged between installation processes.

use mural_core::{
    ApplicationType, GesturePayload, GestureState, Point, Rect, TouchId, TouchPhase, Vector,
    WindowId,
};
use serde::{Deserialize, Serialize};

/// Version written into every envelope.
pub const PROTOCOL_VERSION: u16 = 1;

/// Outer frame of every datagram.
///
/// `sender` is a per-process random id; a process ignores envelopes carrying
/// its own id so broadcasts never echo back into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u16,
    pub sender: u64,
    pub message: WireMessage,
}

impl Envelope {
    #[must_use]
    pub fn new(sender: u64, message: WireMessage) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            sender,
            message,
        }
    }
}

/// Every message kind on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireMessage {
    Touch(TouchMessage),
    Coordination(CoordinationMessage),
    Sync(SyncMessage),
    Control(ControlMessage),
}

impl WireMessage {
    /// Short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Touch(_) => "touch",
            Self::Coordination(_) => "coordination",
            Self::Sync(_) => "sync",
            Self::Control(_) => "control",
        }
    }
}

/// A touch forwarded to the process hosting `target`.
///
/// `position` is in sensor resolution so that receivers rescale it against
/// their own display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchMessage {
    pub touch_id: TouchId,
    pub position: Point,
    pub phase: TouchPhase,
    pub target: WindowId,
}

/// Gesture activity of `source`, applied by every process to its pairing
/// table and mirrored by windows paired to `source`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinationMessage {
    pub source: WindowId,
    /// Group the source belonged to when it interacted. `None` when the
    /// source was ungrouped, in which case it represents its own group.
    #[serde(default)]
    pub group: Option<WindowId>,
    pub gesture: GestureState,
    pub payload: Payload,
    #[serde(default)]
    pub animated: bool,
}

impl CoordinationMessage {
    /// Group the interaction applies to.
    #[must_use]
    pub fn current_group(&self) -> WindowId {
        self.group.unwrap_or(self.source)
    }
}

/// Current viewport of a group representative, sent after merge/ungroup so
/// that every member converges on one position without pairing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub source: WindowId,
    pub payload: Payload,
}

/// Table-wide operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Clear `pair` on every window paired to `window`.
    Unpair { window: WindowId },
    /// Dissolve `group` and regroup its members with their nearest group.
    Ungroup { group: WindowId },
    /// Split the screen half around `window` away from `group`.
    Split {
        window: WindowId,
        #[serde(default)]
        group: Option<WindowId>,
    },
    /// Pull `window`, its screen neighbor, and `group` together under `window`.
    Merge {
        window: WindowId,
        #[serde(default)]
        group: Option<WindowId>,
    },
    /// Clear every entry.
    Reset,
    /// `window` switches to `application`, taking its group along.
    Launch {
        window: WindowId,
        application: ApplicationType,
        #[serde(default)]
        group: Option<WindowId>,
    },
}

/// Position data carried by coordination and sync messages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Point { position: Point },
    Delta { delta: Vector },
    Pinch { scale: f64, delta: Vector, center: Point },
    Viewport { rect: Rect },
}

impl From<GesturePayload> for Payload {
    fn from(payload: GesturePayload) -> Self {
        match payload {
            GesturePayload::Tap { position } => Self::Point { position },
            GesturePayload::Pan { delta } => Self::Delta { delta },
            GesturePayload::Pinch {
                scale,
                delta,
                center,
            } => Self::Pinch {
                scale,
                delta,
                center,
            },
        }
    }
}

impl Payload {
    /// Whether every number in the payload is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        let point = |p: &Point| p.x.is_finite() && p.y.is_finite();
        let vector = |v: &Vector| v.dx.is_finite() && v.dy.is_finite();
        match self {
            Self::Point { position } => point(position),
            Self::Delta { delta } => vector(delta),
            Self::Pinch {
                scale,
                delta,
                center,
            } => scale.is_finite() && vector(delta) && point(center),
            Self::Viewport { rect } => [rect.x, rect.y, rect.width, rect.height]
                .iter()
                .all(|n| n.is_finite()),
        }
    }
}
