#![forbid(unsafe_code)]

//! Core: touches, sensor transport, gesture recognition, and window layout.
//!
//! # Role in Mural
//! `mural-core` is the input layer of one installation window. It turns raw
//! sensor samples into normalized touches, claims them for views, and runs
//! the tap, pan, and pinch recognizers that produce semantic gesture events.
//!
//! # Primary responsibilities
//! - **Transport**: decode sensor samples and rescale them to display space.
//! - **Gestures**: recognizer state machines with friction momentum.
//! - **Dispatch**: per-window touch ownership and fan-out to recognizers.
//! - **Layout**: window ids, screens, and closeness between windows.
//!
//! # How it fits in the system
//! The runtime (`mural-runtime`) owns one [`dispatch::GestureDispatch`] per
//! local window, routes touches between windows and processes, and feeds the
//! resulting [`gesture::GestureEvent`]s into the pairing coordinator. Nothing
//! here performs I/O or reads the clock: every time-dependent operation takes
//! an explicit `Instant`.

pub mod dispatch;
pub mod geometry;
pub mod gesture;
pub mod touch;
pub mod transport;
pub mod window;

pub use dispatch::{DispatchedGesture, GestureDispatch, RecognizerId, ViewId};
pub use geometry::{Point, Rect, Vector};
pub use gesture::{
    GestureConfig, GestureEvent, GestureKind, GesturePayload, GestureRecognizer, GestureState,
    Recognizer,
};
pub use touch::{Touch, TouchId, TouchPhase, TouchProperties};
pub use window::{ApplicationType, MAX_WINDOWS, ScreenLayout, WindowId};
