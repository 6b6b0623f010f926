use messenger::Publisher;
use onyx_types::{CheckpointCoordinate, Epoch, JobId, PeerId, ReplicaVersion};
use std::sync::Arc;
use std::time::Instant;

/// The reason a barrier loop was asked to stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A different peer was elected coordinator for this job.
    Rescheduled,
    /// The component was torn down from outside (e.g. job killed).
    Requested,
}

#[derive(Clone, Default)]
pub(crate) struct BarrierOpts {
    pub checkpointed_epoch: Option<Epoch>,
    pub recover_coordinates: Option<CheckpointCoordinate>,
}

/// The per-job state a barrier loop carries between iterations.
pub(crate) struct BarrierState {
    pub job_id: JobId,
    pub peer_id: PeerId,
    pub replica_version: ReplicaVersion,
    pub epoch: Epoch,
    pub zk_version: Option<checkpoint_store::Version>,
    pub last_barrier_time: Instant,
    pub last_heartbeat_time: Instant,
    pub offering: bool,
    pub publishers: Vec<Arc<dyn Publisher>>,
    pub rem_barriers: Vec<Arc<dyn Publisher>>,
    pub barrier_opts: BarrierOpts,
    pub workflow_depth: u32,
}

impl BarrierState {
    pub fn new(job_id: JobId, peer_id: PeerId) -> Self {
        let now = Instant::now();
        Self {
            job_id,
            peer_id,
            replica_version: ReplicaVersion::new(0),
            epoch: Epoch::zero(),
            zk_version: None,
            last_barrier_time: now,
            last_heartbeat_time: now,
            offering: false,
            publishers: Vec::new(),
            rem_barriers: Vec::new(),
            barrier_opts: BarrierOpts::default(),
            workflow_depth: 0,
        }
    }
}
