#![forbid(unsafe_code)]

//! Runtime: routing, pairing coordination, and the node loop.
//!
//! # Role in Mural
//! `mural-runtime` turns the input layer of `mural-core` into a networked
//! installation process. A [`Node`] owns the windows of one process, routes
//! sensor touches to them or to their peers, keeps the installation-wide
//! pairing table, and publishes [`ViewEvent`]s for whatever renders the
//! windows.
//!
//! # Primary responsibilities
//! - **Config**: [`InstallationConfig`] loaded from TOML or JSON.
//! - **Routing**: [`TouchRouter`] decides which window owns a touch.
//! - **Coordination**: [`Coordinator`] pairs, groups, splits, merges, and
//!   resets windows from serialized messages.
//! - **Loop**: [`Node`] processes [`NodeMsg`]s fed by [`Subscription`]s.
//!
//! # How it fits in the system
//! `mural-node` loads the config, binds sockets through [`net`], and hands
//! control to [`Node::run`]. Tests drive [`Node::update`] directly with an
//! in-memory [`net::RecordingOutbound`] and explicit instants.

pub mod bus;
pub mod config;
pub mod coordinator;
pub mod net;
pub mod node;
pub mod router;
pub mod subscription;

pub use bus::{Bus, ViewEvent};
pub use config::{ConfigError, InstallationConfig};
pub use coordinator::{AppState, Change, Coordinator, Outcome};
pub use net::{Outbound, RecordingOutbound, UdpOutbound};
pub use node::{Node, NodeMsg, socket_listeners};
pub use router::{Route, TouchRouter};
pub use subscription::{Every, StopSignal, SubId, Subscription};
