use crate::TxId;
use onyx_types::{Job, JobId, Peer, PeerId, Task, TaskId};
use std::collections::HashMap;

/// A consistent, read-only view of the store at a point in its history.
/// `db()`/`as_of()` snapshots only see live peers; `history()` snapshots
/// also see peers that have since been retracted.
#[derive(Clone)]
pub struct Snapshot {
    pub(crate) tx: TxId,
    pub(crate) peers: HashMap<PeerId, Peer>,
    pub(crate) retracted_peers: HashMap<PeerId, Peer>,
    pub(crate) jobs: HashMap<JobId, Job>,
    pub(crate) tasks: HashMap<TaskId, Task>,
    pub(crate) sees_retracted: bool,
}

impl Snapshot {
    pub fn tx(&self) -> TxId {
        self.tx
    }

    pub fn peer(&self, id: &PeerId) -> Option<&Peer> {
        self.peers
            .get(id)
            .or_else(|| (self.sees_retracted).then(|| self.retracted_peers.get(id)).flatten())
    }

    pub fn peers(&self) -> impl Iterator<Item = (&PeerId, &Peer)> {
        self.peers.iter()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = (&JobId, &Job)> {
        self.jobs.iter()
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks_for_job(&self, job_id: &JobId) -> Vec<&Task> {
        self.tasks.values().filter(|t| &t.job_id == job_id).collect()
    }
}
