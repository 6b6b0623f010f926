//! The messenger: publisher handles that carry barrier and heartbeat
//! messages across a job's input publications. The wire transport
//! itself is out of scope; only this contract is.

mod memory;
mod publication;

pub use memory::MemoryMessenger;
pub use publication::{PeerRole, Publication, ShortIdKey, SrcPeerId};

use async_trait::async_trait;
use onyx_types::{CheckpointCoordinate, Epoch, ReplicaVersion};
use std::sync::Arc;

/// A control message injected at every input publication, carrying the
/// current `(replica-version, epoch)` plus optional checkpoint or
/// recovery coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Barrier {
    pub replica_version: ReplicaVersion,
    pub epoch: Epoch,
    pub checkpointed_epoch: Option<Epoch>,
    pub recover_coordinates: Option<CheckpointCoordinate>,
}

/// A single publication's handle for sending heartbeats and barrier
/// offers.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Polls whether this publication is currently reachable. Does not
    /// itself constitute a barrier offer.
    async fn heartbeat(&self) -> bool;

    /// Attempts to offer `barrier` on this publication. A strictly
    /// positive return is a successful offer; a non-positive return
    /// means "not yet offered, try again next cycle."
    async fn offer(&self, barrier: &Barrier) -> i64;
}

/// Owns the publisher set for a single job's barrier coordinator.
#[async_trait]
pub trait Messenger: Send + Sync + 'static {
    /// Rebuilds the publisher set from a freshly computed list of
    /// publications, replacing whatever set was previously held.
    async fn set_publications(&self, publications: Vec<Publication>) -> Vec<Arc<dyn Publisher>>;

    /// Stops all publishers. Called exactly once, on shutdown.
    async fn stop(&self);
}
