use crate::{Catalog, JobId, PeerId, TaskName, Workflow};
use std::collections::BTreeMap;

/// One peer's allocation within a job: which co-location site it runs
/// at, used to group barrier publications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocatedPeer {
    pub peer_id: PeerId,
    pub site: String,
}

/// A job's slice of the replica: enough for a barrier coordinator to
/// derive publications and react to reallocation without talking to
/// the fact store directly.
#[derive(Clone, Debug)]
pub struct JobAllocation {
    pub job_id: JobId,
    pub allocation_version: u64,
    pub catalog: Catalog,
    pub workflow: Workflow,
    pub peers: Vec<AllocatedPeer>,
    pub completed: bool,
}

/// The deterministic view of cluster state produced by applying the
/// replicated command log: which peer coordinates each job, each job's
/// current allocation, and the short-id lookup consulted when deriving
/// publications. The log-entry command handlers that produce this view
/// are out of scope; the barrier coordinator only ever reads it.
#[derive(Clone, Debug, Default)]
pub struct Replica {
    pub jobs: BTreeMap<JobId, JobAllocation>,
    pub coordinators: BTreeMap<JobId, PeerId>,
    /// Keyed by `(coordinator peer-id, job-id, task, slot-id)`; slot-id
    /// is always `-1` for the publications this coordinator emits.
    pub message_short_ids: BTreeMap<(PeerId, JobId, TaskName, i64), u64>,
}

impl Replica {
    pub fn job(&self, job_id: &JobId) -> Option<&JobAllocation> {
        self.jobs.get(job_id)
    }

    pub fn coordinator(&self, job_id: &JobId) -> Option<&PeerId> {
        self.coordinators.get(job_id)
    }
}
