#![forbid(unsafe_code)]

//! SIGINT and SIGTERM as a node subscription.

use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mural_runtime::{NodeMsg, StopSignal, SubId, Subscription};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::info;

const SIGNAL_SUB: SubId = 0x5349_4753;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Termination signals registered once for the life of the process.
///
/// The node loop re-declares its permanent subscriptions on every pass, so
/// registration lives here and each declared [`Subscription`] only shares it.
#[derive(Clone)]
pub struct ShutdownSignals {
    signals: Arc<Mutex<Signals>>,
}

impl ShutdownSignals {
    /// Register handlers for SIGINT and SIGTERM.
    pub fn new() -> io::Result<Self> {
        let signals = Signals::new([SIGINT, SIGTERM])?;
        Ok(Self {
            signals: Arc::new(Mutex::new(signals)),
        })
    }

    /// A subscription sending [`NodeMsg::Shutdown`] on the first signal.
    #[must_use]
    pub fn subscription(&self) -> Box<dyn Subscription<NodeMsg>> {
        Box::new(self.clone())
    }

    /// First termination signal received since the last call.
    #[must_use]
    pub fn pending(&self) -> Option<i32> {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        signals.pending().find(|s| matches!(*s, SIGINT | SIGTERM))
    }
}

impl Subscription<NodeMsg> for ShutdownSignals {
    fn id(&self) -> SubId {
        SIGNAL_SUB
    }

    fn run(&self, sender: mpsc::Sender<NodeMsg>, stop: StopSignal) {
        loop {
            if let Some(signal) = self.pending() {
                info!(signal, "termination signal received");
                let _ = sender.send(NodeMsg::Shutdown);
                return;
            }
            if stop.wait_timeout(POLL_INTERVAL) {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_subscriptions_share_one_id() {
        let signals = ShutdownSignals::new().unwrap();
        assert_eq!(signals.subscription().id(), SIGNAL_SUB);
        assert_eq!(signals.clone().subscription().id(), SIGNAL_SUB);
    }

    #[test]
    fn nothing_pending_without_a_signal() {
        let signals = ShutdownSignals::new().unwrap();
        assert_eq!(signals.pending(), None);
    }
}
