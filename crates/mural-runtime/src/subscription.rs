#![forbid(unsafe_code)]

//! Background feeds of the node loop.
//!
//! Timers and sockets run on their own threads and hand [`NodeMsg`]s back
//! over one channel. The loop never starts or stops them directly: each pass
//! it declares the feeds it wants, and [`SubscriptionManager::reconcile`]
//! diffs that declaration against what is running by [`SubId`].
//!
//! | feed | declared while | message |
//! |------|----------------|---------|
//! | momentum ticker | a recognizer decays momentum | `MomentumTick` |
//! | housekeeping | a deadline is pending | `Housekeeping` |
//! | coordination socket | always | `Inbound` |
//! | sensor socket | always | `Sensor` |
//!
//! [`NodeMsg`]: crate::NodeMsg

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::{Arc, Condvar, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Identity of a feed. Redeclaring the same id keeps the running thread.
pub type SubId = u64;

/// A source of loop messages running on a background thread.
pub trait Subscription<M: Send + 'static>: Send {
    fn id(&self) -> SubId;

    /// Produce messages until `stop` is raised or the loop hangs up.
    fn run(&self, sender: mpsc::Sender<M>, stop: StopSignal);
}

/// Shared flag a feed polls to know when to exit.
#[derive(Clone, Default)]
pub struct StopSignal {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn raise(&self) {
        let (flag, wake) = &*self.state;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.state.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep up to `duration`, waking early when stopped. Returns whether
    /// the signal was raised.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let (flag, wake) = &*self.state;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = wake
            .wait_timeout_while(guard, duration, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

struct Worker {
    stop: StopSignal,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn join(self) {
        self.stop.raise();
        let _ = self.thread.join();
    }
}

/// Running feeds of one node loop, keyed by id.
pub(crate) struct SubscriptionManager<M: Send + 'static> {
    workers: BTreeMap<SubId, Worker>,
    sender: mpsc::Sender<M>,
    receiver: mpsc::Receiver<M>,
}

impl<M: Send + 'static> SubscriptionManager<M> {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            workers: BTreeMap::new(),
            sender,
            receiver,
        }
    }

    /// Make the running feeds match `declared`. Ids already running are
    /// kept, the first of several feeds sharing an id wins.
    pub(crate) fn reconcile(&mut self, declared: Vec<Box<dyn Subscription<M>>>) {
        let wanted: BTreeSet<SubId> = declared.iter().map(|s| s.id()).collect();
        let retired: Vec<SubId> = self
            .workers
            .keys()
            .filter(|id| !wanted.contains(id))
            .copied()
            .collect();
        for id in retired {
            if let Some(worker) = self.workers.remove(&id) {
                debug!(sub_id = id, "stopping feed");
                worker.join();
            }
        }

        for sub in declared {
            let id = sub.id();
            if self.workers.contains_key(&id) {
                continue;
            }
            debug!(sub_id = id, "starting feed");
            let stop = StopSignal::new();
            let signal = stop.clone();
            let sender = self.sender.clone();
            let thread = thread::spawn(move || sub.run(sender, signal));
            self.workers.insert(id, Worker { stop, thread });
        }
    }

    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Option<M> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Messages already queued, without waiting.
    pub(crate) fn drain_messages(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }

    #[cfg(test)]
    fn running(&self) -> Vec<SubId> {
        self.workers.keys().copied().collect()
    }

    pub(crate) fn stop_all(&mut self) {
        for (_, worker) in std::mem::take(&mut self.workers) {
            worker.join();
        }
    }
}

impl<M: Send + 'static> Drop for SubscriptionManager<M> {
    fn drop(&mut self) {
        for worker in self.workers.values() {
            worker.stop.raise();
        }
    }
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

/// Fixed-rate ticker.
pub struct Every<M: Send + 'static> {
    id: SubId,
    interval: Duration,
    make_msg: Box<dyn Fn() -> M + Send + Sync>,
}

impl<M: Send + 'static> Every<M> {
    pub fn new(
        id: SubId,
        interval: Duration,
        make_msg: impl Fn() -> M + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            interval,
            make_msg: Box::new(make_msg),
        }
    }
}

impl<M: Send + 'static> Subscription<M> for Every<M> {
    fn id(&self) -> SubId {
        self.id
    }

    fn run(&self, sender: mpsc::Sender<M>, stop: StopSignal) {
        while !stop.wait_timeout(self.interval) {
            if sender.send((self.make_msg)()).is_err() {
                return;
            }
        }
    }
}

/// Receives datagrams on a shared socket.
///
/// The socket is polled with a read timeout so that the thread notices the
/// stop signal; the timeout is set when the subscription starts.
pub struct UdpListen<M: Send + 'static> {
    id: SubId,
    socket: Arc<UdpSocket>,
    poll: Duration,
    make_msg: Arc<dyn Fn(Vec<u8>) -> M + Send + Sync>,
}

impl<M: Send + 'static> UdpListen<M> {
    pub fn new(
        id: SubId,
        socket: Arc<UdpSocket>,
        make_msg: Arc<dyn Fn(Vec<u8>) -> M + Send + Sync>,
    ) -> Self {
        Self {
            id,
            socket,
            poll: Duration::from_millis(50),
            make_msg,
        }
    }
}

impl<M: Send + 'static> Subscription<M> for UdpListen<M> {
    fn id(&self) -> SubId {
        self.id
    }

    fn run(&self, sender: mpsc::Sender<M>, stop: StopSignal) {
        if let Err(err) = self.socket.set_read_timeout(Some(self.poll)) {
            warn!(error = %err, "cannot set socket read timeout");
            return;
        }
        let mut buf = vec![0u8; 64 * 1024];
        while !stop.is_stopped() {
            match self.socket.recv_from(&mut buf) {
                Ok((len, _from)) => {
                    if sender.send((self.make_msg)(buf[..len].to_vec())).is_err() {
                        break;
                    }
                }
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(err) => {
                    warn!(error = %err, "socket receive failed");
                    if stop.wait_timeout(self.poll) {
                        break;
                    }
                }
            }
        }
    }
}
