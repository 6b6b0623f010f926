use crate::{Catalog, Epoch, JobId, ReplicaVersion, TaskId, TaskName, Workflow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub job_id: JobId,
    pub name: TaskName,
    pub phase: u32,
    pub ingress_queues: BTreeSet<String>,
    pub egress_queues: BTreeSet<String>,
    pub complete: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub catalog: Catalog,
    pub workflow: Workflow,
    pub replica_version: ReplicaVersion,
    pub completed: bool,
}

/// Identifies from where a job should resume: written by the barrier
/// coordinator under optimistic concurrency against a store-specific
/// version stamp (carried alongside, not part of the coordinate itself).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointCoordinate {
    pub tenancy_id: String,
    pub job_id: JobId,
    pub replica_version: ReplicaVersion,
    pub epoch: Epoch,
}

impl PartialOrd for CheckpointCoordinate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self.tenancy_id != other.tenancy_id || self.job_id != other.job_id {
            return None;
        }
        Some(
            (self.replica_version, self.epoch).cmp(&(other.replica_version, other.epoch)),
        )
    }
}
