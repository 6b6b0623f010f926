//! The fact store: a transactional, time-travel-capable store of
//! durable peer/job/task facts. See §4.2 of the design for the
//! full contract.

mod memory;
mod snapshot;

pub use memory::MemoryFactStore;
pub use snapshot::Snapshot;

use async_trait::async_trait;
use onyx_types::{Catalog, JobId, Peer, PeerId, PeerNodes, SyncPath, Task, Workflow};

/// A monotonically increasing transaction identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(u64);

impl TxId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("peer already registered: {0}")]
    Duplicate(PeerId),
    #[error("peer not found: {0}")]
    NotFound(PeerId),
    #[error("ack failed: {0}")]
    InvalidAck(String),
    #[error("completion failed: {0}")]
    InvalidComplete(String),
}

/// The outcome of a successful `complete` transaction: the tx id, plus
/// the peer and task it completed, which the caller needs to reset
/// sync-store nodes and trigger a fresh offer.
#[derive(Clone, Debug)]
pub struct Completion {
    pub tx: TxId,
    pub peer: PeerId,
    pub task: onyx_types::TaskId,
}

#[async_trait]
pub trait FactStore: Send + Sync + 'static {
    /// A consistent read snapshot as of the most recently committed
    /// transaction.
    async fn db(&self) -> Snapshot;

    /// Like `db()`, but the snapshot also exposes retracted facts
    /// (e.g. peers that have since died).
    async fn history(&self) -> Snapshot;

    /// The view of the store as of a specific transaction.
    async fn as_of(&self, tx: TxId) -> Option<Snapshot>;

    /// Inserts the peer with status idle. Fails `Duplicate` if the peer
    /// path is already present.
    async fn mark_peer_born(
        &self,
        peer: &PeerId,
        pulse: SyncPath,
        shutdown: SyncPath,
    ) -> Result<TxId, Error>;

    /// Retracts the peer. Fails `NotFound` if absent.
    async fn mark_peer_dead(&self, peer: &PeerId) -> Result<TxId, Error>;

    /// Inserts a job and its pre-computed tasks atomically. The caller
    /// generates `job_id` up front (tasks must already carry it) since
    /// task phases and queue names are derived from the workflow before
    /// any transaction is attempted.
    async fn plan_job(
        &self,
        job_id: JobId,
        catalog: Catalog,
        workflow: Workflow,
        tasks: Vec<Task>,
    ) -> Result<TxId, Error>;

    /// The next incomplete, unassigned task in ascending phase order,
    /// or `None` if there is none.
    async fn next_task(&self) -> Option<Task>;

    /// Any peer with status idle, or `None` if there is none.
    async fn idle_peer(&self) -> Option<PeerId>;

    /// Atomically sets the peer's status to `acking`, associates it
    /// with `task`, and stores the four node paths.
    async fn mark_offered(
        &self,
        task: &onyx_types::TaskId,
        peer: &PeerId,
        nodes: PeerNodes,
    ) -> Result<TxId, Error>;

    /// Sets the peer whose `nodes.ack == ack_path` to active. Fails
    /// `InvalidAck` if no such peer exists, the peer is not `acking`,
    /// or its task is already complete.
    async fn ack(&self, ack_path: &SyncPath) -> Result<TxId, Error>;

    /// Marks the peer whose `nodes.completion == completion_path` idle
    /// and its task complete, retracting the peer's node paths. Fails
    /// `InvalidComplete` if no such peer exists, the peer is not
    /// `active`, or its task is already complete.
    async fn complete(&self, completion_path: &SyncPath) -> Result<Completion, Error>;

    /// The peer record as of the current snapshot, if any. A thin
    /// convenience over `db()` used by callers that only need one peer.
    async fn peer(&self, peer: &PeerId) -> Option<Peer> {
        self.db().await.peer(peer).cloned()
    }
}
