//! The cluster coordinator: peer lifecycle, job planning, task
//! offering, acking, completion, eviction and failure reporting. Driven
//! by a set of channels and backed by a fact store for durable state
//! and a sync store for ephemeral membership/offer plumbing.

mod config;
mod coordinator;
mod events;
mod payload;
mod planning;

pub use config::ClusterConfig;
pub use events::{AckEvent, CompletionEvent, FailureEvent, FailureKind, PlanRequest};
pub use fact_store::TxId;

use coordinator::Shared;
use fact_store::FactStore;
use onyx_types::{Catalog, PeerId, SyncPath, Workflow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use sync_store::{NodeKind, SyncStore};
use tokio::sync::{broadcast, mpsc};

/// A running cluster coordinator: the handle external producers
/// (registration, planning, acks, completions) call into, and
/// consumers (offer/ack/completion/evict/shutdown/failure watchers)
/// subscribe from.
pub struct Cluster {
    shared: Arc<Shared>,

    born_peer_tx: mpsc::Sender<PeerId>,
    planning_tx: mpsc::Sender<PlanRequest>,
    ack_tx: mpsc::Sender<AckEvent>,
    completion_tx: mpsc::Sender<CompletionEvent>,

    offer_mult: broadcast::Sender<TxId>,
    ack_mult: broadcast::Sender<TxId>,
    completion_mult: broadcast::Sender<TxId>,
    evict_mult: broadcast::Sender<PeerId>,
    shutdown_mult: broadcast::Sender<PeerId>,
    failure_mult: broadcast::Sender<FailureEvent>,
}

impl Cluster {
    /// Wires a fresh coordinator around the given stores and spawns its
    /// workers: one per input channel, plus the offer loop.
    pub fn spawn(fact: Arc<dyn FactStore>, sync: Arc<dyn SyncStore>, config: ClusterConfig) -> Cluster {
        let cap = config.channel_capacity;
        let (born_peer_tx, born_peer_rx) = mpsc::channel(cap);
        let (dead_peer_tx, dead_peer_rx) = mpsc::channel(cap);
        let (planning_tx, planning_rx) = mpsc::channel(cap);
        let (ack_tx, ack_rx) = mpsc::channel(cap);
        let (completion_tx, completion_rx) = mpsc::channel(cap);
        let (revoke_tx, revoke_rx) = mpsc::channel(cap);
        let (offer_trigger_tx, offer_trigger_rx) = mpsc::channel(1);

        let (offer_mult, _) = broadcast::channel(cap);
        let (ack_mult, _) = broadcast::channel(cap);
        let (completion_mult, _) = broadcast::channel(cap);
        let (evict_mult, _) = broadcast::channel(cap);
        let (shutdown_mult, _) = broadcast::channel(cap);
        let (failure_mult, _) = broadcast::channel(cap);

        let shared = Arc::new(Shared {
            fact,
            sync,
            config,
            dead_peer_tx,
            revoke_tx,
            offer_trigger_tx,
            pending_revokes: Mutex::new(HashMap::new()),
            task_handles: Mutex::new(Vec::new()),
            offer_mult: offer_mult.clone(),
            ack_mult: ack_mult.clone(),
            completion_mult: completion_mult.clone(),
            evict_mult: evict_mult.clone(),
            shutdown_mult: shutdown_mult.clone(),
            failure_mult: failure_mult.clone(),
        });

        let handles = vec![
            tokio::spawn(coordinator::birth_worker(shared.clone(), born_peer_rx)),
            tokio::spawn(coordinator::death_worker(shared.clone(), dead_peer_rx)),
            tokio::spawn(coordinator::planning_worker(shared.clone(), planning_rx)),
            tokio::spawn(coordinator::ack_worker(shared.clone(), ack_rx)),
            tokio::spawn(coordinator::completion_worker(shared.clone(), completion_rx)),
            tokio::spawn(coordinator::revoke_worker(shared.clone(), revoke_rx)),
            tokio::spawn(coordinator::offer_worker(shared.clone(), offer_trigger_rx)),
        ];
        shared.task_handles.lock().unwrap().extend(handles);

        Cluster {
            shared,
            born_peer_tx,
            planning_tx,
            ack_tx,
            completion_tx,
            offer_mult,
            ack_mult,
            completion_mult,
            evict_mult,
            shutdown_mult,
            failure_mult,
        }
    }

    /// Enqueues `peer` onto `born-peer-ch`, as if its registration
    /// record had just been observed.
    pub async fn born_peer(&self, peer: PeerId) {
        let _ = self.born_peer_tx.send(peer).await;
    }

    /// Enqueues a planning request derived from `{catalog, workflow}`.
    pub async fn submit_job(&self, catalog: Catalog, workflow: Workflow) {
        let _ = self.planning_tx.send(PlanRequest { catalog, workflow }).await;
    }

    /// Enqueues an ack touch observed at `path`.
    pub async fn ack(&self, path: SyncPath) {
        let _ = self.ack_tx.send(AckEvent { path }).await;
    }

    /// Enqueues a completion touch observed at `path`.
    pub async fn complete(&self, path: SyncPath) {
        let _ = self.completion_tx.send(CompletionEvent { path }).await;
    }

    pub fn subscribe_offer(&self) -> broadcast::Receiver<TxId> {
        self.offer_mult.subscribe()
    }

    pub fn subscribe_ack(&self) -> broadcast::Receiver<TxId> {
        self.ack_mult.subscribe()
    }

    pub fn subscribe_completion(&self) -> broadcast::Receiver<TxId> {
        self.completion_mult.subscribe()
    }

    pub fn subscribe_evict(&self) -> broadcast::Receiver<PeerId> {
        self.evict_mult.subscribe()
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<PeerId> {
        self.shutdown_mult.subscribe()
    }

    pub fn subscribe_failure(&self) -> broadcast::Receiver<FailureEvent> {
        self.failure_mult.subscribe()
    }

    /// Stops every worker and watch task. Forceful rather than a
    /// graceful drain, since the in-memory adapters have no in-flight
    /// I/O worth waiting on; a durable-store adapter would instead want
    /// to close the input channels and let workers drain naturally.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.shared.task_handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            handle.abort();
        }
    }
}

/// Performs the wire-level peer registration contract: allocates the
/// peer/pulse/shutdown paths and writes the peer record, without
/// enqueuing `born-peer-ch` (the caller does that once it decides the
/// registration should take effect, mirroring the external contract
/// where registration and the channel send are separate steps).
pub async fn register_peer(sync: &dyn SyncStore) -> PeerId {
    let peer_path = sync.create(NodeKind::Peer);
    let pulse = sync.create(NodeKind::Pulse);
    let shutdown = sync.create(NodeKind::Shutdown);
    sync.write_place(
        &peer_path,
        serde_json::json!({ "pulse": pulse, "shutdown": shutdown }),
    )
    .await;
    PeerId::from(peer_path)
}
