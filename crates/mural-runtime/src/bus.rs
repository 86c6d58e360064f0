#![forbid(unsafe_code)]

//! Typed publish/subscribe fan-out of view events.
//!
//! Views (renderers, content layers, tests) subscribe once and receive every
//! event published afterwards. Subscribers that dropped their receiver are
//! pruned on the next publish.

use std::sync::mpsc;

use mural_core::{DispatchedGesture, GestureState, WindowId};
use mural_wire::Payload;

use crate::coordinator::Change;

/// Everything a window's views may react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// A local recognizer of `window` produced an update.
    Gesture {
        window: WindowId,
        gesture: DispatchedGesture,
    },
    /// `window` is paired to `source` and should replay its activity.
    Mirror {
        window: WindowId,
        source: WindowId,
        gesture: GestureState,
        payload: Payload,
        animated: bool,
    },
    /// `window` should jump to the position its group representative sent.
    Resync {
        window: WindowId,
        source: WindowId,
        payload: Payload,
    },
    /// `window` represents a group that needs its position; answer with
    /// `Node::broadcast_sync`.
    SyncRequested { window: WindowId },
    /// The pairing table changed.
    TopologyChanged { changes: Vec<Change> },
    /// Every window was reset.
    Reset,
}

impl ViewEvent {
    /// The local window the event addresses, if it addresses one.
    #[must_use]
    pub fn window(&self) -> Option<WindowId> {
        match self {
            Self::Gesture { window, .. }
            | Self::Mirror { window, .. }
            | Self::Resync { window, .. }
            | Self::SyncRequested { window } => Some(*window),
            Self::TopologyChanged { .. } | Self::Reset => None,
        }
    }
}

/// Fan-out channel with a closed event type.
#[derive(Debug)]
pub struct Bus<E: Clone> {
    subscribers: Vec<mpsc::Sender<E>>,
}

impl<E: Clone> Default for Bus<E> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<E: Clone> Bus<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event published from now on.
    pub fn subscribe(&mut self) -> mpsc::Receiver<E> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub fn publish(&mut self, event: E) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
