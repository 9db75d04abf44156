// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: In-process fabric for host runs (socketless, one delivery thread per node)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: `tests/host_fabric.rs`
//!
//! Each attached node owns a link (an mpsc channel) drained by a dedicated
//! delivery thread. That thread plays the interrupt context: it invokes the
//! registered receive handler for every packet, asynchronously to the node
//! task. Per-link delivery is FIFO; packets from different senders interleave
//! in whatever order they reach the link. Optional jitter delays each delivery
//! by a seeded random amount to shake up timing.
//!
//! Packets for nodes that were never attached are dropped and counted, the
//! transport never reports it back to the sender.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fabric_wire::Header;
use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{NodeId, Platform, ReceiveCallback};

/// Random per-packet delivery delay bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Jitter {
    /// Shortest delay.
    pub min: Duration,
    /// Longest delay.
    pub max: Duration,
}

/// Host fabric parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FabricConfig {
    /// Delivery jitter; `None` delivers as fast as the thread runs.
    pub jitter: Option<Jitter>,
    /// Seed for the per-link jitter generators.
    pub seed: u64,
}

/// Fabric-wide counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FabricStats {
    /// Packets handed to `transmit`.
    pub transmitted: u64,
    /// Packets dropped for lack of a destination or handler.
    pub lost: u64,
    /// Packets accepted by a link but not yet handled.
    pub in_flight: usize,
}

type HandlerTable = Arc<RwLock<HashMap<u8, ReceiveCallback>>>;

struct Link {
    tx: mpsc::Sender<Vec<u32>>,
    handlers: HandlerTable,
}

struct Shared {
    config: FabricConfig,
    links: Mutex<HashMap<NodeId, Link>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    in_flight: Mutex<usize>,
    idle: Condvar,
    transmitted: AtomicU64,
    lost: AtomicU64,
}

impl Shared {
    fn finish_one(&self) {
        let mut in_flight = self.in_flight.lock();
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.idle.notify_all();
        }
    }
}

/// In-process fabric connecting any number of simulated nodes.
pub struct HostFabric {
    shared: Arc<Shared>,
}

impl Default for HostFabric {
    fn default() -> Self {
        Self::new(FabricConfig::default())
    }
}

impl HostFabric {
    /// Creates a fabric with no nodes attached.
    pub fn new(config: FabricConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                links: Mutex::new(HashMap::new()),
                threads: Mutex::new(Vec::new()),
                in_flight: Mutex::new(0),
                idle: Condvar::new(),
                transmitted: AtomicU64::new(0),
                lost: AtomicU64::new(0),
            }),
        }
    }

    /// Attaches node `id` and starts its delivery thread.
    ///
    /// Attaching an id twice returns another port onto the same link.
    pub fn attach(&self, id: NodeId) -> io::Result<Arc<HostPort>> {
        let mut links = self.shared.links.lock();
        if !links.contains_key(&id) {
            let (tx, rx) = mpsc::channel::<Vec<u32>>();
            let handlers: HandlerTable = Arc::default();
            let rng = self.shared.config.jitter.map(|_| {
                StdRng::seed_from_u64(
                    self.shared.config.seed ^ u64::from(id.raw()).wrapping_mul(0x9e37_79b9_7f4a_7c15),
                )
            });
            let thread = thread::Builder::new().name(format!("fabric-rx-{}", id.raw())).spawn({
                let shared = Arc::clone(&self.shared);
                let handlers = Arc::clone(&handlers);
                move || deliver_loop(id, rx, handlers, shared, rng)
            })?;
            self.shared.threads.lock().push(thread);
            links.insert(id, Link { tx, handlers });
            debug!("fabric: attached {id}");
        }
        Ok(Arc::new(HostPort { id, shared: Arc::clone(&self.shared) }))
    }

    /// Waits until every transmitted packet has been handed to its handler.
    ///
    /// Returns `false` if packets are still in flight after `timeout`.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut in_flight = self.shared.in_flight.lock();
        while *in_flight > 0 {
            if self.shared.idle.wait_until(&mut in_flight, deadline).timed_out() {
                return *in_flight == 0;
            }
        }
        true
    }

    /// Counter snapshot.
    pub fn stats(&self) -> FabricStats {
        FabricStats {
            transmitted: self.shared.transmitted.load(Ordering::Relaxed),
            lost: self.shared.lost.load(Ordering::Relaxed),
            in_flight: *self.shared.in_flight.lock(),
        }
    }

    /// Detaches every node and joins the delivery threads. Idempotent.
    pub fn shutdown(&self) {
        let links = std::mem::take(&mut *self.shared.links.lock());
        drop(links);
        let threads = std::mem::take(&mut *self.shared.threads.lock());
        for thread in threads {
            if thread.join().is_err() {
                warn!("fabric: delivery thread panicked");
            }
        }
    }
}

impl Drop for HostFabric {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn deliver_loop(
    id: NodeId,
    rx: mpsc::Receiver<Vec<u32>>,
    handlers: HandlerTable,
    shared: Arc<Shared>,
    mut rng: Option<StdRng>,
) {
    for words in rx.iter() {
        if let (Some(jitter), Some(rng)) = (shared.config.jitter, rng.as_mut()) {
            let min = jitter.min.as_micros() as u64;
            let max = (jitter.max.as_micros() as u64).max(min);
            thread::sleep(Duration::from_micros(rng.gen_range(min..=max)));
        }
        let class = Header::from_word(words[0]).class;
        let handler = handlers.read().get(&class).cloned();
        match handler {
            Some(handler) => handler(words.as_slice()),
            None => {
                shared.lost.fetch_add(1, Ordering::Relaxed);
                warn!("{id}: no handler for class {class}; dropping packet");
            }
        }
        shared.finish_one();
    }
    trace!("{id}: link closed");
}

/// One node's view of the host fabric.
pub struct HostPort {
    id: NodeId,
    shared: Arc<Shared>,
}

impl Platform for HostPort {
    fn my_node_id(&self) -> NodeId {
        self.id
    }

    fn transmit(&self, words: &[u32]) {
        self.shared.transmitted.fetch_add(1, Ordering::Relaxed);
        let Some(&header) = words.first() else {
            self.shared.lost.fetch_add(1, Ordering::Relaxed);
            warn!("{}: refusing to transmit an empty packet", self.id);
            return;
        };
        let dest = NodeId::new(Header::from_word(header).dest);
        let links = self.shared.links.lock();
        let Some(link) = links.get(&dest) else {
            self.shared.lost.fetch_add(1, Ordering::Relaxed);
            trace!("{}: no node at {dest}; packet lost", self.id);
            return;
        };
        *self.shared.in_flight.lock() += 1;
        if link.tx.send(words.to_vec()).is_err() {
            self.shared.lost.fetch_add(1, Ordering::Relaxed);
            self.shared.finish_one();
        }
    }

    fn register_receive_handler(&self, class: u8, callback: ReceiveCallback) {
        match self.shared.links.lock().get(&self.id) {
            Some(link) => {
                link.handlers.write().insert(class, callback);
            }
            None => warn!("{}: handler registered after fabric shutdown", self.id),
        }
    }
}
