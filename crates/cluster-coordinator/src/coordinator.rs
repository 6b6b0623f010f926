use crate::config::ClusterConfig;
use crate::events::{AckEvent, CompletionEvent, FailureEvent, FailureKind, PlanRequest};
use crate::planning;
use fact_store::FactStore;
use onyx_types::{JobId, PeerId, PeerNodes, PeerStatus, SyncPath};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use sync_store::{ChangeKind, NodeKind, SyncStore};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Shared state reachable from every worker task. Each input channel's
/// worker is a thin loop that calls into one `handle_*` method here.
pub(crate) struct Shared {
    pub(crate) fact: Arc<dyn FactStore>,
    pub(crate) sync: Arc<dyn SyncStore>,
    pub(crate) config: ClusterConfig,

    pub(crate) dead_peer_tx: mpsc::Sender<PeerId>,
    pub(crate) revoke_tx: mpsc::Sender<PeerId>,
    pub(crate) offer_trigger_tx: mpsc::Sender<()>,

    pub(crate) pending_revokes: Mutex<HashMap<PeerId, JoinHandle<()>>>,
    pub(crate) task_handles: Mutex<Vec<JoinHandle<()>>>,

    pub(crate) offer_mult: broadcast::Sender<fact_store::TxId>,
    pub(crate) ack_mult: broadcast::Sender<fact_store::TxId>,
    pub(crate) completion_mult: broadcast::Sender<fact_store::TxId>,
    pub(crate) evict_mult: broadcast::Sender<PeerId>,
    pub(crate) shutdown_mult: broadcast::Sender<PeerId>,
    pub(crate) failure_mult: broadcast::Sender<FailureEvent>,
}

impl Shared {
    async fn emit_failure(&self, kind: FailureKind) {
        let _ = self.failure_mult.send(FailureEvent { kind });
    }

    /// Re-broadcasts `tx` on `offer-mult` and kicks the offer worker,
    /// which coalesces repeated triggers into a single pending pass.
    async fn signal_offer(&self, tx: fact_store::TxId) {
        let _ = self.offer_mult.send(tx);
        let _ = self.offer_trigger_tx.try_send(());
    }

    fn cancel_revoke(&self, peer: &PeerId) {
        if let Some(handle) = self.pending_revokes.lock().unwrap().remove(peer) {
            handle.abort();
        }
    }

    async fn delete_peer_nodes(&self, nodes: &PeerNodes) {
        for path in [&nodes.payload, &nodes.ack, &nodes.status, &nodes.completion] {
            let _ = self.sync.delete(path).await;
        }
    }
}

pub(crate) async fn birth_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<PeerId>) {
    while let Some(peer) = rx.recv().await {
        handle_birth(&shared, peer).await;
    }
}

async fn handle_birth(shared: &Arc<Shared>, peer: PeerId) {
    let record = match shared.sync.read_place(&peer.as_sync_path()).await {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(%peer, ?err, "peer registration record missing at birth");
            shared.emit_failure(FailureKind::PeerBirth).await;
            return;
        }
    };
    let pulse = record.get("pulse").and_then(|v| v.as_str()).map(|s| SyncPath::new(s.to_string()));
    let shutdown = record.get("shutdown").and_then(|v| v.as_str()).map(|s| SyncPath::new(s.to_string()));
    let (pulse, shutdown) = match (pulse, shutdown) {
        (Some(p), Some(s)) => (p, s),
        _ => {
            tracing::warn!(%peer, "peer registration record missing pulse/shutdown paths");
            shared.emit_failure(FailureKind::PeerBirth).await;
            return;
        }
    };

    match shared.fact.mark_peer_born(&peer, pulse.clone(), shutdown).await {
        Err(_) => shared.emit_failure(FailureKind::PeerBirth).await,
        Ok(tx) => {
            let watch_shared = shared.clone();
            let watch_peer = peer.clone();
            let handle = tokio::spawn(async move {
                let mut sub = watch_shared.sync.on_change(&pulse).await;
                while let Some(change) = sub.recv().await {
                    if change.kind == ChangeKind::Deleted {
                        let _ = watch_shared.dead_peer_tx.send(watch_peer.clone()).await;
                        break;
                    }
                }
            });
            shared.task_handles.lock().unwrap().push(handle);
            shared.signal_offer(tx).await;
        }
    }
}

pub(crate) async fn death_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<PeerId>) {
    while let Some(peer) = rx.recv().await {
        handle_death(&shared, peer).await;
    }
}

async fn handle_death(shared: &Arc<Shared>, peer: PeerId) {
    let nodes_before = shared.fact.peer(&peer).await.and_then(|p| p.nodes);
    match shared.fact.mark_peer_dead(&peer).await {
        Err(_) => shared.emit_failure(FailureKind::PeerDeath).await,
        Ok(tx) => {
            shared.cancel_revoke(&peer);
            if let Some(nodes) = nodes_before {
                shared.delete_peer_nodes(&nodes).await;
            }
            let _ = shared.evict_mult.send(peer.clone());
            let _ = shared.shutdown_mult.send(peer.clone());
            shared.signal_offer(tx).await;
        }
    }
}

pub(crate) async fn planning_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<PlanRequest>) {
    while let Some(req) = rx.recv().await {
        handle_planning(&shared, req).await;
    }
}

async fn handle_planning(shared: &Arc<Shared>, req: PlanRequest) {
    let job_id = JobId::new();
    let tasks = planning::plan_tasks(job_id, &req.catalog, &req.workflow);
    match shared.fact.plan_job(job_id, req.catalog, req.workflow, tasks).await {
        Err(err) => tracing::error!(?err, %job_id, "plan_job failed unexpectedly"),
        Ok(tx) => shared.signal_offer(tx).await,
    }
}

pub(crate) async fn ack_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<AckEvent>) {
    while let Some(evt) = rx.recv().await {
        handle_ack(&shared, evt).await;
    }
}

async fn handle_ack(shared: &Arc<Shared>, evt: AckEvent) {
    let peer_for_path = shared
        .fact
        .db()
        .await
        .peers()
        .find(|(_, p)| p.nodes.as_ref().map(|n| &n.ack) == Some(&evt.path))
        .map(|(id, _)| id.clone());

    match shared.fact.ack(&evt.path).await {
        Err(_) => shared.emit_failure(FailureKind::Ack).await,
        Ok(tx) => {
            if let Some(peer) = peer_for_path {
                shared.cancel_revoke(&peer);
            }
            let _ = shared.ack_mult.send(tx);
        }
    }
}

pub(crate) async fn completion_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<CompletionEvent>) {
    while let Some(evt) = rx.recv().await {
        handle_completion(&shared, evt).await;
    }
}

async fn handle_completion(shared: &Arc<Shared>, evt: CompletionEvent) {
    let nodes_before = shared
        .fact
        .db()
        .await
        .peers()
        .find(|(_, p)| p.nodes.as_ref().map(|n| &n.completion) == Some(&evt.path))
        .and_then(|(_, p)| p.nodes.clone());

    match shared.fact.complete(&evt.path).await {
        Err(_) => shared.emit_failure(FailureKind::Complete).await,
        Ok(completion) => {
            if let Some(nodes) = nodes_before {
                shared.delete_peer_nodes(&nodes).await;
            }
            let _ = shared.completion_mult.send(completion.tx);
            shared.signal_offer(completion.tx).await;
        }
    }
}

pub(crate) async fn revoke_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<PeerId>) {
    while let Some(peer) = rx.recv().await {
        handle_revoke(&shared, peer).await;
    }
}

async fn handle_revoke(shared: &Arc<Shared>, peer: PeerId) {
    shared.pending_revokes.lock().unwrap().remove(&peer);

    let record = shared.fact.peer(&peer).await;
    let still_acking = record.as_ref().map(|p| p.status == PeerStatus::Acking).unwrap_or(false);
    if !still_acking {
        return;
    }

    let _ = shared.evict_mult.send(peer.clone());
    let _ = shared.shutdown_mult.send(peer.clone());

    // Treat as peer death: deleting the pulse fires the birth-time watch,
    // which forwards to dead-peer-ch and performs the durable retraction.
    if let Some(record) = record {
        let _ = shared.sync.delete(&record.pulse).await;
    }
}

pub(crate) async fn offer_worker(shared: Arc<Shared>, mut trigger_rx: mpsc::Receiver<()>) {
    while trigger_rx.recv().await.is_some() {
        while try_offer_once(&shared).await {}
    }
}

async fn try_offer_once(shared: &Arc<Shared>) -> bool {
    let Some(task) = shared.fact.next_task().await else {
        return false;
    };
    let Some(peer) = shared.fact.idle_peer().await else {
        return false;
    };
    let Some(job) = shared.fact.db().await.job(&task.job_id).cloned() else {
        return false;
    };

    let nodes = PeerNodes {
        payload: shared.sync.create(NodeKind::Payload),
        ack: shared.sync.create(NodeKind::Ack),
        status: shared.sync.create(NodeKind::Status),
        completion: shared.sync.create(NodeKind::Completion),
    };

    let tx = match shared.fact.mark_offered(&task.id, &peer, nodes.clone()).await {
        Ok(tx) => tx,
        Err(err) => {
            tracing::warn!(?err, %peer, task = %task.id, "mark_offered failed, will retry on next trigger");
            return false;
        }
    };

    let body = crate::payload::offer_payload(&task, &nodes, &job.catalog, &job.workflow, &peer);
    shared.sync.write_place(&nodes.payload, body).await;

    schedule_revoke(shared, peer);

    let _ = shared.offer_mult.send(tx);
    true
}

fn schedule_revoke(shared: &Arc<Shared>, peer: PeerId) {
    let delay = std::time::Duration::from_millis(shared.config.revoke_delay_ms);
    let revoke_shared = shared.clone();
    let moved_peer = peer.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = revoke_shared.revoke_tx.send(moved_peer).await;
    });
    if let Some(prev) = shared.pending_revokes.lock().unwrap().insert(peer, handle) {
        prev.abort();
    }
}
