#![forbid(unsafe_code)]

//! One installation process: its windows, its copy of the pairing table,
//! and the loop that feeds both.
//!
//! # Message flow
//!
//! ```text
//!  sensor datagram ─► TouchTransport ─► TouchRouter ─┬─► local GestureDispatch ─► gesture
//!                                                    └─► forward to peer (touch message)
//!  gesture ─► bus (Gesture) ─► coordination message ─► Coordinator + broadcast
//!  inbound datagram ─► touch | coordination | sync | control
//! ```
//!
//! Everything runs on the loop thread. Background subscriptions only turn
//! sockets and timers into [`NodeMsg`]s, and every time-dependent step takes
//! the `now` the loop passes in.
//!
//! A touch that goes silent for `timeouts.touch_silence_ms` (a lost `up`
//! datagram, a sensor that dropped a finger) is released with a synthetic
//! `up` before the next message is handled.

use std::collections::BTreeMap;
use std::net::UdpSocket;
use std::ops::ControlFlow;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use mural_core::dispatch::ViewId;
use mural_core::transport::TouchTransport;
use mural_core::{
    DispatchedGesture, GestureDispatch, GestureKind, GestureState, Point, Rect, Recognizer,
    Touch, TouchId, TouchPhase, WindowId,
};
use mural_wire::{
    ControlMessage, CoordinationMessage, Envelope, Payload, SyncMessage, TouchMessage,
    WireMessage, decode,
};
use tracing::{debug, info, trace};

use crate::bus::{Bus, ViewEvent};
use crate::config::{ConfigError, InstallationConfig, SurfaceGesture};
use crate::coordinator::{Coordinator, Outcome};
use crate::net::Outbound;
use crate::router::{Route, TouchRouter};
use crate::subscription::{Every, SubId, Subscription, SubscriptionManager, UdpListen};

const MOMENTUM_SUB: SubId = 0x4d4f_4d45;
const HOUSEKEEPING_SUB: SubId = 0x4b45_4550;
const INBOUND_SUB: SubId = 0x4e45_5400;
const SENSOR_SUB: SubId = 0x5345_4e53;

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_millis(100);
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Messages processed by the node loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeMsg {
    /// Raw datagram from the screen's touch sensor.
    Sensor(Vec<u8>),
    /// Raw datagram from the coordination socket.
    Inbound(Vec<u8>),
    /// Drive recognizer momentum.
    MomentumTick,
    /// Check inactivity deadlines.
    Housekeeping,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inactivity {
    Unpair,
    Ungroup,
}

/// Last sample of a touch this node routed.
#[derive(Debug, Clone, Copy)]
struct LiveTouch {
    route: Route,
    position: Point,
    seen: Instant,
}

#[derive(Debug)]
struct WindowSession {
    dispatch: GestureDispatch,
    surface: ViewId,
    deadline: Option<(Inactivity, Instant)>,
}

/// A Mural process hosting one or more windows of one screen.
pub struct Node<O: Outbound> {
    config: InstallationConfig,
    sender: u64,
    transport: TouchTransport,
    router: TouchRouter,
    sessions: BTreeMap<WindowId, WindowSession>,
    live: AHashMap<TouchId, LiveTouch>,
    coordinator: Coordinator,
    bus: Bus<ViewEvent>,
    outbound: O,
    reset_deadline: Option<Instant>,
}

impl<O: Outbound> Node<O> {
    /// Build a node hosting `window_indices` of `screen`.
    ///
    /// The config must validate and every window must exist in its layout.
    pub fn new(
        config: InstallationConfig,
        screen: u32,
        window_indices: &[u32],
        outbound: O,
    ) -> Result<Self, ConfigError> {
        let mut errors = config.validate();
        let layout = config.screen_layout();
        if window_indices.is_empty() {
            errors.push("at least one window index is required".into());
        }
        let mut windows = Vec::new();
        for &index in window_indices {
            match layout.window_id(screen, index) {
                Some(id) if !windows.contains(&id) => windows.push(id),
                Some(_) => {}
                None => errors.push(format!(
                    "window {index} on screen {screen} is outside the {}x{} layout",
                    layout.screens, layout.windows_per_screen
                )),
            }
        }
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        let (width, height) = (config.layout.screen_width, config.layout.screen_height);
        let gesture = config.gesture_config();
        let mut router = TouchRouter::new(layout, screen, width);
        let mut sessions = BTreeMap::new();
        for &window in &windows {
            let frame = layout.frame_of(window, width, height);
            router.register_window(window, frame);
            let mut dispatch = GestureDispatch::new();
            let surface = dispatch.register_view(frame);
            dispatch.add_recognizer(surface, Recognizer::tap(gesture));
            dispatch.add_recognizer(
                surface,
                match config.gesture.surface {
                    SurfaceGesture::Pinch => Recognizer::pinch(gesture),
                    SurfaceGesture::Pan => Recognizer::pan(gesture),
                },
            );
            sessions.insert(
                window,
                WindowSession {
                    dispatch,
                    surface,
                    deadline: None,
                },
            );
        }

        let sender =
            std::hash::BuildHasher::hash_one(&ahash::RandomState::new(), std::process::id());
        info!(
            screen,
            windows = ?windows.iter().map(|w| w.0).collect::<Vec<_>>(),
            sender,
            "node ready"
        );
        Ok(Self {
            transport: TouchTransport::new(config.resolution()),
            coordinator: Coordinator::new(layout),
            config,
            sender,
            router,
            sessions,
            live: AHashMap::new(),
            bus: Bus::new(),
            outbound,
            reset_deadline: None,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Random id stamped on every envelope this node sends.
    #[must_use]
    pub fn sender_id(&self) -> u64 {
        self.sender
    }

    /// Windows hosted by this node.
    pub fn windows(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.sessions.keys().copied()
    }

    #[must_use]
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn outbound(&self) -> &O {
        &self.outbound
    }

    pub fn outbound_mut(&mut self) -> &mut O {
        &mut self.outbound
    }

    /// Receive every view event published from now on.
    pub fn subscribe(&mut self) -> mpsc::Receiver<ViewEvent> {
        self.bus.subscribe()
    }

    /// True while any local recognizer decays momentum.
    #[must_use]
    pub fn in_momentum(&self) -> bool {
        self.sessions.values().any(|s| s.dispatch.in_momentum())
    }

    /// Touches routed by this node that have not been released.
    #[must_use]
    pub fn live_touches(&self) -> usize {
        self.live.len()
    }

    /// Earliest pending inactivity or silent-touch deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let silence = self.config.timeouts.touch_silence();
        self.sessions
            .values()
            .filter_map(|s| s.deadline.map(|(_, at)| at))
            .chain(self.reset_deadline)
            .chain(self.live.values().filter_map(|t| t.seen.checked_add(silence)))
            .min()
    }

    // -----------------------------------------------------------------------
    // Loop
    // -----------------------------------------------------------------------

    /// Process one message.
    pub fn update(&mut self, msg: NodeMsg, now: Instant) -> ControlFlow<()> {
        self.release_silent(now);
        match msg {
            NodeMsg::Sensor(bytes) => {
                for touch in self.transport.ingest(&bytes) {
                    self.local_touch(&touch, now);
                }
            }
            NodeMsg::Inbound(bytes) => self.inbound(&bytes, now),
            NodeMsg::MomentumTick => self.tick(now),
            NodeMsg::Housekeeping => self.expire(now),
            NodeMsg::Shutdown => {
                info!("node shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Subscriptions the node needs right now. The momentum ticker only runs
    /// while a recognizer decays, the housekeeping tick only while a deadline
    /// is pending.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Box<dyn Subscription<NodeMsg>>> {
        let mut subs: Vec<Box<dyn Subscription<NodeMsg>>> = Vec::new();
        if self.in_momentum() {
            let interval = self.config.gesture_config().refresh_interval;
            subs.push(Box::new(Every::new(MOMENTUM_SUB, interval, || NodeMsg::MomentumTick)));
        }
        if self.next_deadline().is_some() {
            subs.push(Box::new(Every::new(
                HOUSEKEEPING_SUB,
                HOUSEKEEPING_INTERVAL,
                || NodeMsg::Housekeeping,
            )));
        }
        subs
    }

    /// Run until a [`NodeMsg::Shutdown`] arrives.
    ///
    /// `permanent` declares the subscriptions that live for the whole run,
    /// such as [`socket_listeners`] and signal handling.
    pub fn run<F>(mut self, permanent: F)
    where
        F: Fn() -> Vec<Box<dyn Subscription<NodeMsg>>>,
    {
        let mut manager = SubscriptionManager::new();
        loop {
            let mut subs = permanent();
            subs.extend(self.subscriptions());
            manager.reconcile(subs);

            let Some(first) = manager.recv_timeout(IDLE_WAIT) else {
                continue;
            };
            let batch = std::iter::once(first).chain(manager.drain_messages());
            let mut flow = ControlFlow::Continue(());
            for msg in batch {
                flow = self.update(msg, Instant::now());
                if flow.is_break() {
                    break;
                }
            }
            if flow.is_break() {
                break;
            }
        }
        manager.stop_all();
    }

    // -----------------------------------------------------------------------
    // Consumer operations
    // -----------------------------------------------------------------------

    /// Apply a control operation locally and broadcast it.
    pub fn control(&mut self, control: ControlMessage, now: Instant) {
        self.apply_control(control, now);
        self.send(WireMessage::Control(control), None);
    }

    /// Announce that `window` moved its content programmatically.
    ///
    /// Returns `false` without sending when `window` is not hosted here, the
    /// rect is not finite, or `phase` is `possible`.
    pub fn broadcast_viewport(
        &mut self,
        window: WindowId,
        rect: Rect,
        phase: GestureState,
        animated: bool,
        now: Instant,
    ) -> bool {
        let payload = Payload::Viewport { rect };
        if !self.sessions.contains_key(&window)
            || phase == GestureState::Possible
            || !payload.is_finite()
        {
            return false;
        }
        let message = CoordinationMessage {
            source: window,
            group: self.coordinator.group_of(window),
            gesture: phase,
            payload,
            animated,
        };
        self.coordinate(&message, now);
        self.send(WireMessage::Coordination(message), None);
        true
    }

    /// Send the position of group representative `window` to its group.
    pub fn broadcast_sync(&mut self, window: WindowId, payload: Payload) -> bool {
        if !self.sessions.contains_key(&window) || !payload.is_finite() {
            return false;
        }
        let message = SyncMessage {
            source: window,
            payload,
        };
        self.resync(message);
        self.send(WireMessage::Sync(message), None);
        true
    }

    /// Abort every gesture in progress on `window`.
    pub fn invalidate(&mut self, window: WindowId, now: Instant) {
        let Some(session) = self.sessions.get_mut(&window) else {
            return;
        };
        let gestures = session.dispatch.invalidate_view(session.surface);
        for gesture in gestures {
            self.local_gesture(window, gesture, now);
        }
    }

    // -----------------------------------------------------------------------
    // Touches and gestures
    // -----------------------------------------------------------------------

    fn local_touch(&mut self, touch: &Touch, now: Instant) {
        let Some(route) = self.router.route(touch) else {
            trace!(touch = touch.id.0, phase = ?touch.phase, "dropping unrouted touch");
            return;
        };
        self.track(touch, route, now);
        match route {
            Route::Local(window) => self.deliver(window, touch, now),
            Route::Remote(peer) => self.forward(touch, peer),
        }
    }

    fn forward(&mut self, touch: &Touch, peer: WindowId) {
        let message = TouchMessage {
            touch_id: touch.id,
            position: self.transport.to_sensor(touch.position),
            phase: touch.phase,
            target: peer,
        };
        self.send(WireMessage::Touch(message), Some(peer));
    }

    fn track(&mut self, touch: &Touch, route: Route, now: Instant) {
        if touch.phase == TouchPhase::Up {
            self.live.remove(&touch.id);
        } else {
            self.live.insert(
                touch.id,
                LiveTouch {
                    route,
                    position: touch.position,
                    seen: now,
                },
            );
        }
    }

    /// Release every touch silent for longer than the configured bound as if
    /// it had lifted where it was last seen.
    fn release_silent(&mut self, now: Instant) {
        let silence = self.config.timeouts.touch_silence();
        let mut silent: Vec<(TouchId, LiveTouch)> = self
            .live
            .iter()
            .filter(|(_, t)| now.saturating_duration_since(t.seen) >= silence)
            .map(|(id, t)| (*id, *t))
            .collect();
        if silent.is_empty() {
            return;
        }
        silent.sort_by_key(|(id, _)| *id);
        for (id, touch) in silent {
            self.live.remove(&id);
            self.router.release(id);
            self.transport.forget(id);
            debug!(touch = id.0, route = ?touch.route, "releasing silent touch");
            let up = Touch::new(id, touch.position, TouchPhase::Up);
            match touch.route {
                Route::Local(window) => self.deliver(window, &up, now),
                Route::Remote(peer) => self.forward(&up, peer),
            }
        }
    }

    fn deliver(&mut self, window: WindowId, touch: &Touch, now: Instant) {
        let Some(session) = self.sessions.get_mut(&window) else {
            return;
        };
        let gestures = session.dispatch.handle(touch, now);
        for gesture in gestures {
            self.local_gesture(window, gesture, now);
        }
    }

    fn tick(&mut self, now: Instant) {
        let windows: Vec<WindowId> = self.sessions.keys().copied().collect();
        for window in windows {
            let Some(session) = self.sessions.get_mut(&window) else {
                continue;
            };
            let gestures = session.dispatch.tick(now);
            for gesture in gestures {
                self.local_gesture(window, gesture, now);
            }
        }
    }

    fn local_gesture(&mut self, window: WindowId, gesture: DispatchedGesture, now: Instant) {
        self.bus.publish(ViewEvent::Gesture { window, gesture });
        if gesture.kind == GestureKind::Tap {
            return;
        }
        let state = gesture.event.state;
        if let Some(session) = self.sessions.get_mut(&window) {
            session.deadline = if state.is_active() {
                None
            } else {
                now.checked_add(self.config.timeouts.unpair_after())
                    .map(|at| (Inactivity::Unpair, at))
            };
        }
        let message = CoordinationMessage {
            source: window,
            group: self.coordinator.group_of(window),
            // Momentum settling reports `possible`, which never travels.
            gesture: match state {
                GestureState::Possible => GestureState::Ended,
                other => other,
            },
            payload: gesture.event.payload.into(),
            animated: false,
        };
        self.coordinate(&message, now);
        self.send(WireMessage::Coordination(message), None);
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    fn inbound(&mut self, bytes: &[u8], now: Instant) {
        let envelope = match decode(bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                trace!(error = %err, len = bytes.len(), "dropping malformed datagram");
                return;
            }
        };
        if envelope.sender == self.sender {
            return;
        }
        trace!(kind = envelope.message.kind(), sender = envelope.sender, "inbound");
        match envelope.message {
            WireMessage::Touch(message) => {
                let touch = self
                    .transport
                    .from_wire(message.touch_id, message.position, message.phase);
                if let Some(window) = self.router.claim_forwarded(&touch, message.target) {
                    self.track(&touch, Route::Local(window), now);
                    self.deliver(window, &touch, now);
                }
            }
            WireMessage::Coordination(message) => self.coordinate(&message, now),
            WireMessage::Sync(message) => self.resync(message),
            WireMessage::Control(control) => self.apply_control(control, now),
        }
    }

    /// Apply activity of `message.source` to the table and mirror it on
    /// local windows paired to the source.
    fn coordinate(&mut self, message: &CoordinationMessage, now: Instant) {
        let outcome = self
            .coordinator
            .interact(message.source, message.group, message.gesture);
        self.publish_outcome(outcome);
        let followers: Vec<WindowId> = self
            .coordinator
            .paired_to(message.source)
            .filter(|w| self.sessions.contains_key(w))
            .collect();
        for window in followers {
            self.bus.publish(ViewEvent::Mirror {
                window,
                source: message.source,
                gesture: message.gesture,
                payload: message.payload,
                animated: message.animated,
            });
        }
        if message.gesture != GestureState::Failed {
            self.arm_reset(now);
        }
    }

    fn resync(&mut self, message: SyncMessage) {
        let group = self.coordinator.group_of(message.source).unwrap_or(message.source);
        let members: Vec<WindowId> = self
            .sessions
            .keys()
            .copied()
            .filter(|w| *w != message.source && self.coordinator.group_of(*w) == Some(group))
            .collect();
        for window in members {
            self.bus.publish(ViewEvent::Resync {
                window,
                source: message.source,
                payload: message.payload,
            });
        }
    }

    fn apply_control(&mut self, control: ControlMessage, now: Instant) {
        let outcome = self.coordinator.apply(&control);
        match control {
            ControlMessage::Reset => {
                self.reset_deadline = None;
                self.router.clear();
                self.transport.clear();
                self.live.clear();
                for session in self.sessions.values_mut() {
                    session.dispatch.reset();
                    session.deadline = None;
                }
                self.bus.publish(ViewEvent::Reset);
            }
            ControlMessage::Ungroup { .. } => self.arm_reset(now),
            _ => {}
        }
        self.publish_outcome(outcome);
    }

    fn publish_outcome(&mut self, outcome: Outcome) {
        if !outcome.changes.is_empty() {
            self.bus.publish(ViewEvent::TopologyChanged {
                changes: outcome.changes,
            });
        }
        for window in outcome.resync {
            if self.sessions.contains_key(&window) {
                self.bus.publish(ViewEvent::SyncRequested { window });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inactivity chain
    // -----------------------------------------------------------------------

    fn arm_reset(&mut self, now: Instant) {
        self.reset_deadline = now.checked_add(self.config.timeouts.reset_after());
    }

    fn expire(&mut self, now: Instant) {
        let due: Vec<(WindowId, Inactivity)> = self
            .sessions
            .iter()
            .filter_map(|(window, s)| match s.deadline {
                Some((step, at)) if at <= now => Some((*window, step)),
                _ => None,
            })
            .collect();
        for (window, step) in due {
            let next = match step {
                Inactivity::Unpair => now
                    .checked_add(self.config.timeouts.ungroup_after())
                    .map(|at| (Inactivity::Ungroup, at)),
                Inactivity::Ungroup => None,
            };
            if let Some(session) = self.sessions.get_mut(&window) {
                session.deadline = next;
            }
            debug!(window = window.0, ?step, "inactivity deadline reached");
            match step {
                Inactivity::Unpair => self.control(ControlMessage::Unpair { window }, now),
                Inactivity::Ungroup => {
                    if self.coordinator.group_of(window) == Some(window) {
                        self.control(ControlMessage::Ungroup { group: window }, now);
                    }
                }
            }
        }
        if self.reset_deadline.is_some_and(|at| at <= now) {
            debug!("installation idle, resetting");
            self.control(ControlMessage::Reset, now);
        }
    }

    fn send(&mut self, message: WireMessage, peer: Option<WindowId>) {
        let envelope = Envelope::new(self.sender, message);
        self.outbound.send(&envelope, peer);
    }
}

/// Permanent subscriptions reading the coordination and sensor sockets.
pub fn socket_listeners(
    coordination: Arc<UdpSocket>,
    sensor: Arc<UdpSocket>,
) -> impl Fn() -> Vec<Box<dyn Subscription<NodeMsg>>> {
    let inbound: Arc<dyn Fn(Vec<u8>) -> NodeMsg + Send + Sync> = Arc::new(NodeMsg::Inbound);
    let samples: Arc<dyn Fn(Vec<u8>) -> NodeMsg + Send + Sync> = Arc::new(NodeMsg::Sensor);
    move || {
        vec![
            Box::new(UdpListen::new(INBOUND_SUB, coordination.clone(), inbound.clone()))
                as Box<dyn Subscription<NodeMsg>>,
            Box::new(UdpListen::new(SENSOR_SUB, sensor.clone(), samples.clone())),
        ]
    }
}
