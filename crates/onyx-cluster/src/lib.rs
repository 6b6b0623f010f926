//! The composition root: the explicit assembly code that wires a
//! process's cluster coordinator and its set of per-job barrier
//! coordinators around concrete store adapters.
//!
//! Nothing here is itself a subsystem — it exists because both
//! [`cluster_coordinator::Cluster`] and [`barrier_coordinator::JobCoordinators`]
//! are deliberately store-agnostic, and *something* has to pick
//! concrete adapters, own their lifetimes, and tear them down together.
//! A process embedding this crate still owns the pieces explicitly out
//! of scope here: the client-facing API that calls [`Node::submit_job`]
//! and friends, the messenger's real wire transport, and the
//! log-entry command handlers that turn a committed tx log into the
//! [`Replica`] snapshots fed to [`Node::observe_replica`].

use checkpoint_store::CheckpointStore;
use cluster_coordinator::{Cluster, ClusterConfig};
use fact_store::FactStore;
use messenger::Messenger;
use onyx_types::{Catalog, JobId, PeerId, Replica, SyncPath, Workflow};
use std::sync::Arc;
use sync_store::SyncStore;

pub use barrier_coordinator::{BarrierConfig, ShutdownReason};
pub use cluster_coordinator::{FailureEvent, FailureKind};

/// One peer's full participation in the cluster: the process-wide
/// [`Cluster`] coordinator plus the set of per-job barrier loops this
/// peer happens to be elected coordinator for.
///
/// A `Node` is the unit this crate hands back to an embedder; peer
/// lifecycle, job planning/offering and barrier/checkpointing are two
/// independently useful subsystems that nonetheless share one process
/// lifetime and one shutdown sequence, which is exactly what `Node`
/// exists to hold together.
pub struct Node {
    self_id: PeerId,
    cluster: Arc<Cluster>,
    job_coordinators: Arc<barrier_coordinator::JobCoordinators>,
}

impl Node {
    /// Constructs and spawns every worker: the cluster coordinator's
    /// input-channel workers plus the (initially empty) set of barrier
    /// loops. No job is coordinated until the first [`Node::observe_replica`]
    /// names this peer as a job's coordinator.
    pub fn spawn(
        self_id: PeerId,
        fact: Arc<dyn FactStore>,
        sync: Arc<dyn SyncStore>,
        checkpoint_store: Arc<dyn CheckpointStore>,
        cluster_config: ClusterConfig,
        barrier_config: BarrierConfig,
    ) -> Self {
        let cluster = Arc::new(Cluster::spawn(fact, sync, cluster_config));
        let job_coordinators = Arc::new(barrier_coordinator::JobCoordinators::new(
            checkpoint_store,
            barrier_config,
        ));
        Self { self_id, cluster, job_coordinators }
    }

    /// Convenience constructor wiring the in-process `Memory*` adapters
    /// from every leaf crate, matching the library's "usable without
    /// any config file or external service present" requirement.
    pub fn spawn_in_memory(self_id: PeerId) -> Self {
        Self::spawn(
            self_id,
            Arc::new(fact_store::MemoryFactStore::new()),
            Arc::new(sync_store::MemorySyncStore::new()),
            Arc::new(checkpoint_store::MemoryCheckpointStore::new()),
            ClusterConfig::default(),
            BarrierConfig::default(),
        )
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.self_id
    }

    /// Enqueues `peer` onto `born-peer-ch`, as if its registration
    /// record had just been observed. See [`cluster_coordinator::register_peer`]
    /// for performing the sync-store side of registration first.
    pub async fn born_peer(&self, peer: PeerId) {
        self.cluster.born_peer(peer).await;
    }

    pub async fn submit_job(&self, catalog: Catalog, workflow: Workflow) {
        self.cluster.submit_job(catalog, workflow).await;
    }

    pub async fn ack(&self, path: SyncPath) {
        self.cluster.ack(path).await;
    }

    pub async fn complete(&self, path: SyncPath) {
        self.cluster.complete(path).await;
    }

    /// The underlying cluster coordinator handle, for callers that need
    /// its broadcast subscriptions (`subscribe_offer`, `subscribe_ack`,
    /// etc.) directly.
    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    /// Reconciles this peer's running barrier loops against a freshly
    /// observed replica snapshot: starts loops for jobs newly elected,
    /// forwards the snapshot to loops already running, and stops loops
    /// for jobs this peer no longer coordinates. `messenger_for` builds
    /// the transport a newly started loop should publish through; the
    /// real wire transport is assembled by the embedder, not this crate.
    pub async fn observe_replica<F>(&self, replica: &Replica, messenger_for: F)
    where
        F: Fn(JobId) -> Arc<dyn Messenger>,
    {
        self.job_coordinators.observe(&self.self_id, replica, messenger_for).await;
    }

    /// Stops every barrier loop this peer coordinates, then stops the
    /// cluster coordinator's workers. Barrier loops are drained first so
    /// a checkpoint write already in flight isn't raced by the fact
    /// store or sync store disappearing out from under it.
    pub async fn shutdown(&self) {
        self.job_coordinators.shutdown().await;
        self.cluster.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messenger::MemoryMessenger;
    use onyx_types::{AllocatedPeer, JobAllocation, TaskName};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn single_input_workflow() -> Workflow {
        let mut w = BTreeMap::new();
        w.entry(TaskName::from("in")).or_insert_with(Default::default).insert(TaskName::from("out"));
        w
    }

    /// Electing this node as a job's coordinator starts a barrier loop;
    /// a later replica where someone else coordinates stops it again.
    #[tokio::test]
    async fn observe_replica_starts_and_stops_barrier_loop() {
        let self_id = PeerId::new("/peer/self");
        let node = Node::spawn_in_memory(self_id.clone());

        let job_id = JobId::new();
        let mut replica = Replica::default();
        replica.jobs.insert(
            job_id,
            JobAllocation {
                job_id,
                allocation_version: 1,
                catalog: Vec::new(),
                workflow: single_input_workflow(),
                peers: vec![AllocatedPeer { peer_id: PeerId::new("/peer/worker"), site: "site-1".into() }],
                completed: false,
            },
        );
        replica.coordinators.insert(job_id, self_id.clone());

        let messenger = Arc::new(MemoryMessenger::new());
        let messenger_for_test = messenger.clone();
        node.observe_replica(&replica, move |_| messenger_for_test.clone() as Arc<dyn Messenger>).await;

        // Give the newly spawned loop a moment to pick up the seeded
        // allocation and offer at least one barrier.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!messenger.all_offered_barriers().is_empty());

        let mut replica_without_self = replica.clone();
        replica_without_self.coordinators.insert(job_id, PeerId::new("/peer/someone-else"));
        node.observe_replica(&replica_without_self, move |_| unreachable!("no new loop should start")).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(messenger.is_stopped(), "losing coordinator status must stop the loop's messenger");

        node.shutdown().await;
    }

    /// A node with no jobs coordinated still supports the plain
    /// register/submit/ack/complete surface through to the cluster
    /// coordinator underneath.
    #[tokio::test]
    async fn node_forwards_cluster_coordinator_surface() {
        let node = Node::spawn_in_memory(PeerId::new("/peer/self"));
        let mut offers = node.cluster().subscribe_offer();

        node.submit_job(Vec::new(), BTreeMap::new()).await;
        tokio::time::timeout(Duration::from_millis(500), offers.recv())
            .await
            .expect("offer-mult event timed out")
            .expect("offer-mult channel closed");

        node.shutdown().await;
    }
}
